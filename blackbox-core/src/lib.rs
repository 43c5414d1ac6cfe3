// Copyright (C) 2024 by GiGa infosystems
//! Core types shared by the Blackbox flight-data-recorder reader and writer:
//! the schema and predictor layers, the varint/tagged-group codecs, session
//! settings, per-log statistics and the error taxonomy.
//!
//! This crate carries no I/O of its own; `blackbox-in` drives these types
//! against a memory-mapped log, `blackbox-out` drives them against a
//! tick-scheduled transport.
extern crate num;
#[macro_use]
extern crate num_derive;
#[cfg(any(feature = "serde", feature = "to_json"))]
extern crate serde;
#[cfg(feature = "to_json")]
extern crate serde_json;

pub mod enums;
pub mod errors;
pub mod schema;
pub mod settings;
pub mod statistics;
pub mod varint;

pub use enums::{Encoding, FirmwareType, FrameType, Predictor};
pub use errors::BlackboxError;
pub use schema::{FieldDef, GpsHomeState, HistoryRing, LogRange, Schema};
pub use settings::Config;
pub use statistics::FlightLogStatistics;

/// Maximum number of declared fields per frame type, matching the
/// historical `FLIGHT_LOG_MAX_FIELDS`.
pub const MAX_FIELDS: usize = 128;

/// Maximum number of concatenated logs a single container is expected to
/// hold, matching `FLIGHT_LOG_MAX_LOGS_IN_FILE`.
pub const MAX_LOGS_IN_FILE: usize = 31;

/// Field index of the monotone iteration counter, present in every schema.
pub const FIELD_INDEX_ITERATION: usize = 0;

/// Field index of the microsecond timestamp, present in every schema.
pub const FIELD_INDEX_TIME: usize = 1;

/// The fixed ASCII marker that opens every log's header block and delimits
/// concatenated logs within one file.
pub const LOG_START_MARKER: &str = "H Product:Blackbox flight data recorder by Nicholas Sherlock\n";

/// One fully decoded (or about-to-be-encoded) sample: a flat vector of field
/// values in declared schema order.
///
/// ```
/// use blackbox_core::SampleTuple;
/// let t: SampleTuple = vec![0, 1000, 1150, 1150];
/// assert_eq!(t[blackbox_core::FIELD_INDEX_ITERATION], 0);
/// ```
pub type SampleTuple = Vec<i32>;
