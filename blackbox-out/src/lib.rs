//! Tick-driven encoder for Blackbox flight-data-recorder logs.
//!
//! Mirrors the shape of `giga_segy_out::SegyFile<S: SegyWriteSettings>`: a
//! session struct generic over a settings trait, built once and then fed
//! data incrementally — traces there, scheduler ticks here. Where the SEG-Y
//! writer stages trace-by-trace onto an open `File`, [`BlackboxWriter`]
//! stages byte-by-byte onto a non-blocking [`Transport`], the cooperative
//! embedded producer's actual write surface.
extern crate blackbox_core;
extern crate fnv;
extern crate num;
extern crate tinyvec;
#[cfg(test)]
extern crate blackbox_in;
#[cfg(test)]
extern crate tempfile;

#[cfg(test)]
mod integration_tests;
pub mod settings;
pub mod utils;
pub mod write_data;
pub mod write_headers;

use std::collections::VecDeque;

use fnv::FnvHashMap;

pub use blackbox_core::{Config, Schema};

use blackbox_core::{GpsHomeState, HistoryRing};
use settings::BlackboxWriteSettings;
use write_data::{decide_gps_emission, encode_gps_frame, encode_home_frame, encode_intraframe, encode_interframe, GpsEmission};
use write_headers::{gps_field_lines, main_field_lines, sysinfo_lines};

/// `Tag8_4S16`/`Data version` selector this crate always emits. The decoder
/// accepts both v1 and v2; this writer only ever produces the more compact
/// nibble-stream v2 layout.
pub const DATA_VERSION: u32 = 2;

/// A non-blocking byte sink. `write_byte` may drop the byte and report
/// `false` if the sink is momentarily full; the writer's chunked tick
/// budget is sized so this never actually happens.
pub trait Transport {
    fn write_byte(&mut self, byte: u8) -> bool;
}

impl Transport for Vec<u8> {
    fn write_byte(&mut self, byte: u8) -> bool {
        self.push(byte);
        true
    }
}

/// One scheduler tick's worth of producer state: everything the encoder's
/// main-frame schema can draw a sample tuple from.
#[derive(Debug, Clone, Default)]
pub struct ProducerSample {
    pub iteration: u32,
    pub time: u32,
    pub rc_command: [i32; 4],
    pub gyro: [i32; 3],
    pub acc_smooth: [i32; 3],
    pub motor: Vec<i32>,
    pub servo: Option<i32>,
    pub gps: Option<GpsSample>,
}

/// One GPS fix, in absolute units (not home-relative — the writer applies
/// the `HomeCoord` predictor itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpsSample {
    pub num_sat: i32,
    pub lat: i32,
    pub lon: i32,
    pub altitude: i32,
    pub speed: i32,
}

enum WriterState {
    Disabled,
    Stopped,
    SendHeader { bytes: Vec<u8>, pos: usize },
    SendFieldInfo { lines: VecDeque<String> },
    SendGpsHeaders { lines: VecDeque<String> },
    SendSysInfo { lines: VecDeque<String> },
    Running,
}

/// The encoder session: `Disabled -> Stopped -> SendHeader -> SendFieldInfo
/// -> SendGpsHeaders? -> SendSysInfo -> Running -> Stopped`, driven entirely
/// by [`Self::tick`]. Generic over `S` so an integrator can swap
/// in its own settings type without this crate needing to know about it.
pub struct BlackboxWriter<S: BlackboxWriteSettings> {
    settings: S,
    schema: Schema,
    state: WriterState,
    history: HistoryRing,
    gps_state: GpsHomeState,
    i_cycle_count: u32,
    stream_pos: usize,
    keyframe_index: FnvHashMap<u32, usize>,
}

impl<S: BlackboxWriteSettings> BlackboxWriter<S> {
    /// Build a writer in the `Disabled` state against an explicit schema.
    pub fn new(settings: S, schema: Schema) -> Self {
        let field_count = schema.main.len();
        Self {
            settings,
            schema,
            state: WriterState::Disabled,
            history: HistoryRing::new(field_count),
            gps_state: GpsHomeState::default(),
            i_cycle_count: 0,
            stream_pos: 0,
            keyframe_index: FnvHashMap::default(),
        }
    }

    /// Build a writer against the canonical field template, trimmed to
    /// `settings.config().get_motor_count()` motors.
    pub fn with_default_schema(settings: S) -> Self {
        let schema = utils::default_schema(settings.config(), settings.has_servo());
        Self::new(settings, schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, WriterState::Running)
    }

    /// `Disabled -> Stopped`: the session is armed but not yet recording.
    pub fn enable(&mut self) {
        if matches!(self.state, WriterState::Disabled) {
            self.state = WriterState::Stopped;
        }
    }

    pub fn disable(&mut self) {
        self.state = WriterState::Disabled;
    }

    /// `Stopped -> SendHeader`: reserve the transport, reset history, and
    /// begin transmitting the header block.
    pub fn start(&mut self) {
        if !matches!(self.state, WriterState::Stopped) {
            return;
        }
        self.history = HistoryRing::new(self.schema.main.len());
        self.gps_state = GpsHomeState::default();
        self.i_cycle_count = 0;
        self.stream_pos = 0;
        self.keyframe_index.clear();
        self.state = WriterState::SendHeader {
            bytes: blackbox_core::LOG_START_MARKER.as_bytes().to_vec(),
            pos: 0,
        };
    }

    /// `Running -> Stopped`. Frames are always fully written within the
    /// tick they are produced, so there is no in-flight frame to flush.
    pub fn finish(&mut self) {
        self.state = WriterState::Stopped;
    }

    /// Drive one scheduler tick: advance the header handshake, or (once
    /// `Running`) encode one sample's worth of frames and write them to
    /// `transport`. A no-op while `Disabled` or `Stopped`.
    pub fn tick(&mut self, transport: &mut impl Transport, producer: &ProducerSample) {
        if matches!(self.state, WriterState::Running) {
            self.tick_running(transport, producer);
            return;
        }
        match &mut self.state {
            WriterState::Disabled | WriterState::Stopped => {}
            WriterState::SendHeader { bytes, pos } => {
                let chunk_end = (*pos + self.settings.chunk_size()).min(bytes.len());
                for &byte in &bytes[*pos..chunk_end] {
                    transport.write_byte(byte);
                }
                *pos = chunk_end;
                if *pos >= bytes.len() {
                    self.state = WriterState::SendFieldInfo {
                        lines: main_field_lines(&self.schema).into(),
                    };
                }
            }
            WriterState::SendFieldInfo { lines } => {
                if let Some(line) = lines.pop_front() {
                    write_line(transport, &line);
                }
                if lines.is_empty() {
                    self.state = if self.schema.gps.is_empty() && self.schema.home.is_empty() {
                        WriterState::SendSysInfo {
                            lines: sysinfo_lines(self.settings.config()).into(),
                        }
                    } else {
                        WriterState::SendGpsHeaders {
                            lines: gps_field_lines(&self.schema).into(),
                        }
                    };
                }
            }
            WriterState::SendGpsHeaders { lines } => {
                if let Some(line) = lines.pop_front() {
                    write_line(transport, &line);
                }
                if lines.is_empty() {
                    self.state = WriterState::SendSysInfo {
                        lines: sysinfo_lines(self.settings.config()).into(),
                    };
                }
            }
            WriterState::SendSysInfo { lines } => {
                if let Some(line) = lines.pop_front() {
                    write_line(transport, &line);
                }
                if lines.is_empty() {
                    self.state = WriterState::Running;
                }
            }
            WriterState::Running => unreachable!("handled above before the match"),
        }
    }

    fn tick_running(&mut self, transport: &mut impl Transport, producer: &ProducerSample) {
        let mut out = Vec::new();
        let values = self.assemble_main_values(producer);
        let i_interval = self.settings.config().get_i_interval();

        if producer.iteration % i_interval == 0 {
            self.keyframe_index.insert(producer.iteration, self.stream_pos);
            encode_intraframe(&self.schema, self.settings.config(), DATA_VERSION, &values, &mut self.history, &mut out);
            self.i_cycle_count = self.i_cycle_count.wrapping_add(1);
        } else if self.settings.config().should_have_frame(producer.iteration) {
            encode_interframe(&self.schema, self.settings.config(), DATA_VERSION, &values, &mut self.history, &mut out);
        }

        if let Some(gps) = producer.gps {
            self.encode_gps_if_due(producer.iteration, i_interval, gps, &mut out);
        }

        self.stream_pos += out.len();
        for byte in out {
            transport.write_byte(byte);
        }
    }

    /// Byte offset of the `I` frame for `iteration` within the telemetry
    /// stream (counted from the first `Running` tick, not the header
    /// block), if one was ever emitted at that iteration. Lets a consumer
    /// with the full recorded stream seek near a known iteration instead of
    /// scanning from the start, the same role `SegyFile`'s trace-index
    /// lookup plays for random access into a survey.
    pub fn keyframe_offset(&self, iteration: u32) -> Option<usize> {
        self.keyframe_index.get(&iteration).copied()
    }

    /// Forget the latched home coordinate. The next GPS fix re-latches home
    /// and an `H` frame is emitted for it, the same way a real flight
    /// controller re-captures home on a fresh arm.
    pub fn reset_home(&mut self) {
        self.gps_state.has_home = false;
    }

    fn encode_gps_if_due(&mut self, iteration: u32, i_interval: u32, gps: GpsSample, out: &mut Vec<u8>) {
        let intracycle_index = iteration % i_interval;
        let gps_changed = gps.num_sat != self.gps_state.last_num_sat
            || gps.lat != self.gps_state.last_lat
            || gps.lon != self.gps_state.last_lon
            || gps.altitude != self.gps_state.last_altitude
            || gps.speed != self.gps_state.last_speed;

        let emission = decide_gps_emission(
            self.settings.config(),
            &self.gps_state,
            self.i_cycle_count,
            intracycle_index,
            gps_changed,
        );

        if matches!(emission, GpsEmission::HomeAndGps) {
            if !self.gps_state.has_home {
                self.gps_state.has_home = true;
                self.gps_state.home_lat = gps.lat;
                self.gps_state.home_lon = gps.lon;
            }
            let home_values = vec![self.gps_state.home_lat, self.gps_state.home_lon];
            encode_home_frame(&self.schema, self.settings.config(), DATA_VERSION, &home_values, out);
        }

        if matches!(emission, GpsEmission::HomeAndGps | GpsEmission::GpsOnly) {
            let gps_values = vec![gps.num_sat, gps.lat, gps.lon, gps.altitude, gps.speed];
            encode_gps_frame(&self.schema, self.settings.config(), DATA_VERSION, &self.gps_state, &gps_values, out);
            self.gps_state.last_num_sat = gps.num_sat;
            self.gps_state.last_lat = gps.lat;
            self.gps_state.last_lon = gps.lon;
            self.gps_state.last_altitude = gps.altitude;
            self.gps_state.last_speed = gps.speed;
        }
    }

    fn assemble_main_values(&self, producer: &ProducerSample) -> Vec<i32> {
        let mut values = vec![producer.iteration as i32, producer.time as i32];
        values.extend_from_slice(&producer.rc_command);
        values.extend_from_slice(&producer.gyro);
        values.extend_from_slice(&producer.acc_smooth);
        let motor_count = self.settings.config().get_motor_count().clamp(1, utils::MAX_MOTORS) as usize;
        values.extend(producer.motor.iter().take(motor_count).copied());
        if self.settings.has_servo() {
            values.push(producer.servo.unwrap_or(0));
        }
        values
    }
}

fn write_line(transport: &mut impl Transport, line: &str) {
    for byte in line.as_bytes() {
        transport.write_byte(*byte);
    }
    transport.write_byte(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use settings::DefaultWriteSettings;

    fn sample(iteration: u32) -> ProducerSample {
        ProducerSample {
            iteration,
            time: iteration * 1000,
            rc_command: [0, 0, 0, 1150],
            gyro: [0, 0, 0],
            acc_smooth: [0, 0, 0],
            motor: vec![1150; 4],
            servo: None,
            gps: None,
        }
    }

    fn drive_past_header(writer: &mut BlackboxWriter<DefaultWriteSettings>, transport: &mut Vec<u8>) {
        writer.enable();
        writer.start();
        while !writer.is_running() {
            writer.tick(transport, &sample(0));
        }
    }

    #[test]
    fn a_fresh_writer_emits_nothing_while_disabled_or_stopped() {
        let mut writer = BlackboxWriter::with_default_schema(DefaultWriteSettings::default());
        let mut transport = Vec::new();
        writer.tick(&mut transport, &sample(0));
        assert!(transport.is_empty());
    }

    #[test]
    fn the_header_handshake_ends_with_the_start_marker_present() {
        let mut writer = BlackboxWriter::with_default_schema(DefaultWriteSettings::default());
        let mut transport = Vec::new();
        drive_past_header(&mut writer, &mut transport);
        let text = String::from_utf8(transport).unwrap();
        assert!(text.starts_with(blackbox_core::LOG_START_MARKER));
        assert!(text.contains("H Field I name:loopIteration"));
        assert!(text.contains("H Data version:2"));
    }

    #[test]
    fn running_emits_an_intraframe_on_the_first_tick_of_a_cycle() {
        let mut writer = BlackboxWriter::with_default_schema(DefaultWriteSettings::default());
        let mut transport = Vec::new();
        drive_past_header(&mut writer, &mut transport);
        transport.clear();
        writer.tick(&mut transport, &sample(0));
        assert_eq!(transport[0], b'I');
    }

    #[test]
    fn running_emits_an_interframe_on_subsequent_ticks() {
        let mut writer = BlackboxWriter::with_default_schema(DefaultWriteSettings::default());
        let mut transport = Vec::new();
        drive_past_header(&mut writer, &mut transport);
        writer.tick(&mut transport, &sample(0));
        transport.clear();
        writer.tick(&mut transport, &sample(1));
        assert_eq!(transport[0], b'P');
    }

    #[test]
    fn keyframe_offset_tracks_where_each_i_frame_landed_in_the_telemetry_stream() {
        let mut writer = BlackboxWriter::with_default_schema(DefaultWriteSettings::default());
        let mut transport = Vec::new();
        drive_past_header(&mut writer, &mut transport);
        assert_eq!(writer.keyframe_offset(0), None);

        writer.tick(&mut transport, &sample(0));
        assert_eq!(writer.keyframe_offset(0), Some(0));

        writer.tick(&mut transport, &sample(1));
        assert_eq!(writer.keyframe_offset(1), None);

        for iteration in 2..32 {
            writer.tick(&mut transport, &sample(iteration));
        }
        writer.tick(&mut transport, &sample(32));
        let second_keyframe = writer.keyframe_offset(32).unwrap();
        assert!(second_keyframe > writer.keyframe_offset(0).unwrap());
    }

    #[test]
    fn finish_returns_the_writer_to_stopped() {
        let mut writer = BlackboxWriter::with_default_schema(DefaultWriteSettings::default());
        let mut transport = Vec::new();
        drive_past_header(&mut writer, &mut transport);
        writer.finish();
        assert!(!writer.is_running());
        let before = transport.len();
        writer.tick(&mut transport, &sample(99));
        assert_eq!(transport.len(), before);
    }
}
