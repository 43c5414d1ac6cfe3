//! Memory-mapped access to a log container, and detection of the log
//! boundaries within it.
//!
//! Plays the same role `giga_segy_in::memory_map::MappedSegY` plays for a
//! SEG-Y file: own the `Mmap` and the backing `File` handle, and expose
//! read-only byte ranges to the rest of the crate. The container here has no
//! fixed-size binary header to validate up front, so the sanity check is
//! replaced by a scan for the repeating ASCII start marker.
use memmap2::{Mmap, MmapOptions};

use blackbox_core::{BlackboxError, LogRange, LOG_START_MARKER, MAX_LOGS_IN_FILE};

/// A read-only memory map of a log container file.
pub struct MappedLog {
    pub(crate) map: Mmap,
    _file: std::fs::File,
}

impl MappedLog {
    /// Map `file_name` read-only for the lifetime of the returned value.
    pub(crate) fn new(file_name: &str) -> Result<Self, BlackboxError> {
        let file = std::fs::File::open(file_name)?;
        let map = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { map, _file: file })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.map
    }

    /// Find every occurrence of the start marker and turn the gaps between
    /// them into half-open `[begin, end)` ranges, the last one ending at EOF.
    /// Stops once [`MAX_LOGS_IN_FILE`] boundaries have been found, matching
    /// the historical decoder's fixed-size boundary table.
    pub(crate) fn scan_log_ranges(&self) -> Vec<LogRange> {
        let marker = LOG_START_MARKER.as_bytes();
        let mut starts = Vec::new();
        let mut from = 0;
        while starts.len() < MAX_LOGS_IN_FILE {
            match find_subslice(&self.map[from..], marker) {
                Some(offset) => {
                    starts.push(from + offset);
                    from = from + offset + marker.len();
                }
                None => break,
            }
        }
        let mut ranges = Vec::with_capacity(starts.len());
        for (i, &begin) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(self.map.len());
            ranges.push(LogRange { begin, end });
        }
        ranges
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
