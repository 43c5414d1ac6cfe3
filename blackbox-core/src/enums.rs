//! Closed-set ids used by the schema: predictors, encodings, frame types and
//! firmware lineage.
//!
//! As in `giga_segy_core::enums`, these are `#[repr(C)]` enums decoded from a
//! small integer with `num`'s `FromPrimitive`. Unlike that crate's header
//! codes, an out-of-range predictor or encoding id here is always a fatal
//! schema error, so `new` returns a `Result` rather than falling back to an
//! `Invalid` sentinel.
use num::FromPrimitive;
#[cfg(any(feature = "to_json", feature = "serde"))]
use serde::{Deserialize, Serialize};

use crate::errors::BlackboxError;

/// Per-field predictor, selected independently for the intraframe and
/// interframe schema vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(C)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum Predictor {
    None = 0,
    Previous = 1,
    StraightLine = 2,
    Average2 = 3,
    MinThrottle = 4,
    Motor0 = 5,
    Increment = 6,
    HomeCoord = 7,
    Const1500 = 8,
    VBatRef = 9,
}

impl Predictor {
    /// Parse a predictor id as declared in a `Field * predictor` header line.
    pub fn new(source: u8) -> Result<Self, BlackboxError> {
        Self::from_u8(source).ok_or(BlackboxError::UnknownPredictor { code: source })
    }
}

/// Per-field residual encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(C)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum Encoding {
    SignedVb = 0,
    UnsignedVb = 1,
    U8 = 2,
    U16 = 3,
    U32 = 4,
    S8 = 5,
    S16 = 6,
    S32 = 7,
    Tag8_4S16 = 8,
    Null = 9,
    Tag2_3S32 = 10,
    Tag8_8Svb = 11,
}

impl Encoding {
    /// Parse an encoding id as declared in a `Field * encoding` header line.
    pub fn new(source: u8) -> Result<Self, BlackboxError> {
        Self::from_u8(source).ok_or(BlackboxError::UnknownEncoding { code: source })
    }

    /// How many consecutive schema fields this encoding consumes in one shot.
    ///
    /// Group encodings pack several fields behind a single selector; all
    /// other encodings are single-field.
    pub fn group_size(self) -> usize {
        match self {
            Self::Tag8_4S16 => 4,
            Self::Tag2_3S32 => 3,
            // Tag8_8Svb's actual group size is schema-dependent (up to 8);
            // callers that need the true count consult the schema's declared
            // run length instead of this fixed value.
            Self::Tag8_8Svb => 8,
            _ => 1,
        }
    }
}

/// The four frame kinds that can open a data-block record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Intra,
    Inter,
    Gps,
    GpsHome,
}

impl FrameType {
    /// The single ASCII byte that opens a frame of this kind on the wire.
    pub fn marker(self) -> u8 {
        match self {
            Self::Intra => b'I',
            Self::Inter => b'P',
            Self::Gps => b'G',
            Self::GpsHome => b'H',
        }
    }

    /// Recognise a frame-opening marker byte, if `b` is one.
    pub fn from_marker(b: u8) -> Option<Self> {
        match b {
            b'I' => Some(Self::Intra),
            b'P' => Some(Self::Inter),
            b'G' => Some(Self::Gps),
            b'H' => Some(Self::GpsHome),
            _ => None,
        }
    }
}

/// Firmware lineage, which governs how `gyro.scale` is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareType {
    Baseflight,
    Cleanflight,
}

impl FirmwareType {
    /// Parse the free-text `Firmware type` header value.
    ///
    /// Unrecognised values default to `Cleanflight`, the more common lineage
    /// and the one whose `gyro.scale` is already stored without a degrees
    /// normalisation factor.
    pub fn new(source: &str) -> Self {
        if source.eq_ignore_ascii_case("Baseflight") {
            Self::Baseflight
        } else {
            Self::Cleanflight
        }
    }
}

/// The size class a `Tag8_4S16` field is packed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(C)]
pub enum GroupFieldSize {
    Zero = 0,
    Nibble = 1,
    Byte = 2,
    Short = 3,
}
