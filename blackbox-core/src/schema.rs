//! Schema tables and the predictor layer that reads/writes against them.
//!
//! The byte-range-per-field style of `giga_segy_core::header_structs` is
//! replaced here by name-and-predictor-per-field, since Blackbox fields are
//! declared by the header rather than fixed at a byte offset; the role this
//! module plays — the immutable description the codec walks on every frame —
//! is the same.
use crate::enums::{Encoding, Predictor};
use crate::settings::Config;

/// One field's declared name, signedness, and per-frame-type predictor and
/// encoding. Immutable once the header has been parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub signed: bool,
    pub intra_predictor: Predictor,
    pub intra_encoding: Encoding,
    pub inter_predictor: Predictor,
    pub inter_encoding: Encoding,
}

/// The three schema tables (main, GPS, GPS-home), populated from the header
/// and constant for the rest of the parse or session.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub main: Vec<FieldDef>,
    pub gps: Vec<FieldDef>,
    pub home: Vec<FieldDef>,
    motor0_index: Option<usize>,
}

impl Schema {
    /// Locate `motor[0]` among the main fields and cache its index, used by
    /// the `Motor0` predictor.
    pub fn resolve_motor0_index(&mut self) {
        self.motor0_index = self.main.iter().position(|f| f.name == "motor[0]");
    }

    pub fn motor0_index(&self) -> Option<usize> {
        self.motor0_index
    }
}

/// The three committed-tuple slots predictors read from: two history slots
/// (`prev`, `prev2`) and a scratch slot the producer writes into.
///
/// Implements the "equivalent safe design" from the design notes: a
/// fixed array of three tuple buffers with role indices rotated by plain
/// reassignment rather than the original's raw pointer swaps. A keyframe
/// commit clones once (both `prev` and `prev2` must become the same tuple);
/// an interframe commit is a pure index rotation with no copy.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    slots: [Vec<i32>; 3],
    prev_idx: usize,
    prev2_idx: usize,
    scratch_idx: usize,
}

impl HistoryRing {
    pub fn new(field_count: usize) -> Self {
        Self {
            slots: [
                vec![0; field_count],
                vec![0; field_count],
                vec![0; field_count],
            ],
            prev_idx: 0,
            prev2_idx: 1,
            scratch_idx: 2,
        }
    }

    pub fn prev(&self) -> &[i32] {
        &self.slots[self.prev_idx]
    }

    pub fn prev2(&self) -> &[i32] {
        &self.slots[self.prev2_idx]
    }

    pub fn scratch(&self) -> &[i32] {
        &self.slots[self.scratch_idx]
    }

    pub fn scratch_mut(&mut self) -> &mut Vec<i32> {
        &mut self.slots[self.scratch_idx]
    }

    /// Commit the scratch tuple as a keyframe: `prev` and `prev2` both become
    /// it.
    pub fn commit_intra(&mut self) {
        let freed = self.prev2_idx;
        self.slots[self.prev_idx] = self.slots[self.scratch_idx].clone();
        self.prev2_idx = self.prev_idx;
        self.prev_idx = self.scratch_idx;
        self.scratch_idx = freed;
    }

    /// Commit the scratch tuple as an interframe: `prev2 <- prev`, `prev <-
    /// scratch`. Pure rotation, no copy.
    pub fn commit_inter(&mut self) {
        let freed = self.prev2_idx;
        self.prev2_idx = self.prev_idx;
        self.prev_idx = self.scratch_idx;
        self.scratch_idx = freed;
    }
}

/// The last home coordinate and last full GPS sample emitted, used to decide
/// when to re-emit `H`/`G` frames and to feed the `HomeCoord` predictor.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpsHomeState {
    pub has_home: bool,
    pub home_lat: i32,
    pub home_lon: i32,
    pub last_num_sat: i32,
    pub last_lat: i32,
    pub last_lon: i32,
    pub last_altitude: i32,
    pub last_speed: i32,
}

/// Compute the predicted value for one field, dispatching on its predictor.
///
/// `own_prev`/`own_prev2` are this field's value in the history ring's
/// `prev`/`prev2` slots; `motor0_prev` and `home_coord` supply the
/// cross-field/cross-stream values `Motor0` and `HomeCoord` need.
/// `Increment` is handled at the frame layer (it emits no residual), so it
/// is treated here as `Previous` for callers that still want a baseline.
#[allow(clippy::too_many_arguments)]
pub fn predict_value(
    predictor: Predictor,
    signed: bool,
    own_prev: i32,
    own_prev2: i32,
    motor0_prev: Option<i32>,
    home_coord: Option<i32>,
    config: &Config,
) -> i32 {
    match predictor {
        Predictor::None => 0,
        Predictor::Previous | Predictor::Increment => own_prev,
        Predictor::StraightLine => own_prev.wrapping_mul(2).wrapping_sub(own_prev2),
        Predictor::Average2 => {
            if signed {
                ((own_prev as u32).wrapping_add(own_prev2 as u32)) as i32 / 2
            } else {
                ((own_prev as u32).wrapping_add(own_prev2 as u32) / 2) as i32
            }
        }
        Predictor::MinThrottle => config.get_min_throttle(),
        Predictor::Motor0 => motor0_prev.unwrap_or(0),
        Predictor::HomeCoord => home_coord.unwrap_or(0),
        Predictor::Const1500 => 1500,
        Predictor::VBatRef => config.get_vbat_ref(),
    }
}

/// `value - predicted`, on the field's unsigned bit pattern so the result is
/// independent of whether the field is signed.
pub fn encode_residual(value: i32, predicted: i32) -> i32 {
    value.wrapping_sub(predicted)
}

/// Invert [`encode_residual`].
pub fn decode_value(residual: i32, predicted: i32) -> i32 {
    residual.wrapping_add(predicted)
}

/// A `[begin, end)` byte range identifying one concatenated log within a
/// mapped file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRange {
    pub begin: usize,
    pub end: usize,
}
