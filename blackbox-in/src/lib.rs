//! Offline decoder for Blackbox flight-data-recorder logs.
//!
//! Mirrors the shape of `giga_segy_in::SegyFile`: a memory-mapped container
//! is opened once, its header is parsed into a [`Schema`]/[`Config`] pair,
//! and [`FlightLog::parse`] walks one selected log's data block, invoking
//! callbacks per frame the way `giga_segy_in` hands back typed headers
//! rather than forcing callers through raw bytes.
extern crate memmap2;

mod header;
mod memory_map;
mod parser;

use memory_map::MappedLog;

pub use blackbox_core::enums::FrameType;
pub use blackbox_core::{BlackboxError, Config, FlightLogStatistics, LogRange, Schema};

/// An in-band event marker (sync beep, logging resumed/ended): a numeric
/// code plus a single payload value, reported outside the main telemetry
/// stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEvent {
    pub offset: usize,
    pub code: u32,
    pub payload: u32,
}

/// One fully decoded or invalidated frame candidate, as handed to
/// [`FlightLog::parse`]'s callback.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub valid: bool,
    pub frame_type: FrameType,
    pub values: Vec<i32>,
    pub offset: usize,
    pub size: usize,
}

/// A memory-mapped container that may hold one or more concatenated logs.
pub struct FlightLog {
    data: MappedLog,
    ranges: Vec<LogRange>,
}

impl FlightLog {
    /// Map `file_name` and scan it for log boundaries. Does not parse any
    /// header; call [`Self::parse`] with a log index to do that.
    ///
    /// ```
    /// use std::io::Write;
    /// let mut file = tempfile::NamedTempFile::new().unwrap();
    /// file.write_all(b"H Product:Blackbox flight data recorder by Nicholas Sherlock\n\
    /// H Data version:2\n\
    /// H Field I name:loopIteration,time\n\
    /// H Field I signed:0,0\n\
    /// H Field I predictor:0,0\n\
    /// H Field I encoding:1,1\n\
    /// H Field P predictor:6,0\n\
    /// H Field P encoding:9,1\n\
    /// Idata").unwrap();
    /// file.flush().unwrap();
    ///
    /// let log = blackbox_in::FlightLog::open(file.path().to_str().unwrap()).unwrap();
    /// assert_eq!(log.log_count(), 1);
    /// ```
    pub fn open(file_name: &str) -> Result<Self, BlackboxError> {
        let data = MappedLog::new(file_name)?;
        let ranges = data.scan_log_ranges();
        Ok(Self { data, ranges })
    }

    /// The number of logs found when the container was opened.
    pub fn log_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn log_range(&self, index: usize) -> Option<LogRange> {
        self.ranges.get(index).copied()
    }

    /// Parse log `index`: header first, then the full data block, invoking
    /// `on_metadata_ready` once, `on_frame` per candidate frame in wire
    /// order, and `on_event` per in-band event marker.
    ///
    /// Returns [`BlackboxError::NoLog`] if `index` is out of range, and any
    /// header-level error ([`BlackboxError::MissingSchema`],
    /// [`BlackboxError::BadHeader`]) without invoking any callback.
    pub fn parse(
        &self,
        index: usize,
        mut on_metadata_ready: impl FnMut(&Schema, &Config),
        mut on_frame: impl FnMut(DecodedFrame),
        mut on_event: impl FnMut(LogEvent),
    ) -> Result<FlightLogStatistics, BlackboxError> {
        let range = self.log_range(index).ok_or(BlackboxError::NoLog {
            requested: index,
            available: self.ranges.len(),
        })?;
        let bytes = &self.data.bytes()[range.begin..range.end];

        let parsed = header::parse_header(bytes)?;
        on_metadata_ready(&parsed.schema, &parsed.config);

        let stats = parser::parse_data_block(
            bytes,
            parsed.data_start,
            &parsed.schema,
            &parsed.config,
            parsed.data_version,
            |valid, frame_type, values, offset, size| {
                on_frame(DecodedFrame {
                    valid,
                    frame_type,
                    values: values.to_vec(),
                    offset: range.begin + offset,
                    size,
                });
            },
            |offset, code, payload| {
                on_event(LogEvent {
                    offset: range.begin + offset,
                    code,
                    payload,
                });
            },
        );
        Ok(stats)
    }
}
