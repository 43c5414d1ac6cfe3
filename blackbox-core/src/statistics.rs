//! Per-log statistics, matching the shape of the historical
//! `flightLogStatistics_t` (see `parser.h`): frame/byte counters, a bounded
//! frame-length histogram per frame type, and running per-field extrema.

/// Bound of the encoded-frame-length histogram; lengths at or beyond this are
/// excluded from the histogram but still folded into the aggregate byte
/// totals.
pub const MAX_FRAME_LENGTH: usize = 256;

/// Counters and extrema accumulated while parsing one log.
#[derive(Debug, Clone)]
pub struct FlightLogStatistics {
    pub i_frame_bytes: u64,
    pub p_frame_bytes: u64,
    pub g_frame_bytes: u64,
    pub h_frame_bytes: u64,
    pub total_bytes: u64,

    pub num_i_frames: u64,
    pub num_p_frames: u64,
    pub num_g_frames: u64,
    pub num_h_frames: u64,

    /// Frames that failed to decode.
    pub num_broken_frames: u64,
    /// P frames that were parsed but are unusable because the main stream
    /// was not valid (the preceding I frame was rejected).
    pub num_unusable_p_frames: u64,
    /// Ticks whose frame was never emitted because the sampling fraction
    /// excluded them.
    pub intentionally_absent_frames: u64,

    /// Running `(min, max)` per field index, in declared schema order.
    field_extrema: Vec<Option<(i64, i64)>>,

    i_frame_size_count: [u32; MAX_FRAME_LENGTH],
    p_frame_size_count: [u32; MAX_FRAME_LENGTH],
    g_frame_size_count: [u32; MAX_FRAME_LENGTH],
    h_frame_size_count: [u32; MAX_FRAME_LENGTH],
}

impl FlightLogStatistics {
    /// Create a fresh statistics accumulator sized for `field_count` main
    /// fields.
    pub fn new(field_count: usize) -> Self {
        Self {
            i_frame_bytes: 0,
            p_frame_bytes: 0,
            g_frame_bytes: 0,
            h_frame_bytes: 0,
            total_bytes: 0,
            num_i_frames: 0,
            num_p_frames: 0,
            num_g_frames: 0,
            num_h_frames: 0,
            num_broken_frames: 0,
            num_unusable_p_frames: 0,
            intentionally_absent_frames: 0,
            field_extrema: vec![None; field_count],
            i_frame_size_count: [0; MAX_FRAME_LENGTH],
            p_frame_size_count: [0; MAX_FRAME_LENGTH],
            g_frame_size_count: [0; MAX_FRAME_LENGTH],
            h_frame_size_count: [0; MAX_FRAME_LENGTH],
        }
    }

    fn histogram_mut(&mut self, frame_type: crate::enums::FrameType) -> &mut [u32; MAX_FRAME_LENGTH] {
        use crate::enums::FrameType::*;
        match frame_type {
            Intra => &mut self.i_frame_size_count,
            Inter => &mut self.p_frame_size_count,
            Gps => &mut self.g_frame_size_count,
            GpsHome => &mut self.h_frame_size_count,
        }
    }

    /// Record one successfully parsed frame: bumps the per-type frame and
    /// byte counters, and folds `len` into the bounded histogram.
    pub fn record_frame(&mut self, frame_type: crate::enums::FrameType, len: usize) {
        use crate::enums::FrameType::*;
        match frame_type {
            Intra => {
                self.num_i_frames += 1;
                self.i_frame_bytes += len as u64;
            }
            Inter => {
                self.num_p_frames += 1;
                self.p_frame_bytes += len as u64;
            }
            Gps => {
                self.num_g_frames += 1;
                self.g_frame_bytes += len as u64;
            }
            GpsHome => {
                self.num_h_frames += 1;
                self.h_frame_bytes += len as u64;
            }
        }
        self.total_bytes += len as u64;
        if len < MAX_FRAME_LENGTH {
            self.histogram_mut(frame_type)[len] += 1;
        }
    }

    /// Fold a decoded field value into its running min/max.
    pub fn observe_field(&mut self, field_index: usize, value: i64) {
        if field_index >= self.field_extrema.len() {
            return;
        }
        let slot = &mut self.field_extrema[field_index];
        *slot = Some(match slot {
            Some((lo, hi)) => (value.min(*lo), value.max(*hi)),
            None => (value, value),
        });
    }

    pub fn field_minimum(&self, field_index: usize) -> Option<i64> {
        self.field_extrema.get(field_index).and_then(|e| e.map(|(lo, _)| lo))
    }

    pub fn field_maximum(&self, field_index: usize) -> Option<i64> {
        self.field_extrema.get(field_index).and_then(|e| e.map(|(_, hi)| hi))
    }

    pub fn histogram(&self, frame_type: crate::enums::FrameType) -> &[u32; MAX_FRAME_LENGTH] {
        use crate::enums::FrameType::*;
        match frame_type {
            Intra => &self.i_frame_size_count,
            Inter => &self.p_frame_size_count,
            Gps => &self.g_frame_size_count,
            GpsHome => &self.h_frame_size_count,
        }
    }
}
