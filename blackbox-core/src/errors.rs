//! Error taxonomy shared by the reader and writer crates.
//!
//! Mirrors the hand-rolled style of `giga_segy_core::errors`: one flat enum,
//! a manual `Display` with one arm per variant, and `From` impls for the
//! handful of std errors that cross our boundary.

/// Errors produced while decoding or validating a Blackbox log.
#[derive(Debug)]
pub enum BlackboxError {
    /// An unsigned VLQ ran past the maximum of 5 continuation bytes.
    CorruptVarint,
    /// The byte stream ended while a frame body was still being read.
    UnexpectedEof,
    /// A schema line referenced a predictor id outside the closed set.
    UnknownPredictor { code: u8 },
    /// A schema line referenced an encoding id outside the closed set.
    UnknownEncoding { code: u8 },
    /// A data byte was encountered before the header declared a complete schema.
    MissingSchema,
    /// A `H ` header line was malformed: missing `:`, non-ASCII, or unterminated.
    BadHeader { line: String },
    /// A candidate frame failed validation (premature EOF, non-monotonic
    /// iteration/time on an I frame, or a group encoding overran its fields).
    FrameCorrupt { reason: &'static str },
    /// The requested log index exceeds the number of logs found in the container.
    NoLog { requested: usize, available: usize },
    /// A schema declared more fields than a frame type supports.
    TooManyFields { count: usize, max: usize },
    /// Wrapped `std::io::Error` (file IO, memory mapping).
    StdIoError(std::io::Error),
    /// Wrapped `std::array::TryFromSliceError`, surfaced by fixed-width byte reads.
    TryFromSlice(std::array::TryFromSliceError),
}

impl From<std::io::Error> for BlackboxError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}

impl From<std::array::TryFromSliceError> for BlackboxError {
    fn from(e: std::array::TryFromSliceError) -> Self {
        Self::TryFromSlice(e)
    }
}

impl std::fmt::Display for BlackboxError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use self::BlackboxError::*;
        match self {
            CorruptVarint => write!(fmt, "unsigned VLQ exceeded 5 continuation bytes"),
            UnexpectedEof => write!(fmt, "stream ended inside a frame body"),
            UnknownPredictor { code } => write!(fmt, "unknown predictor id {}", code),
            UnknownEncoding { code } => write!(fmt, "unknown encoding id {}", code),
            MissingSchema => write!(fmt, "data byte encountered before a complete schema"),
            BadHeader { line } => write!(fmt, "malformed header line: {:?}", line),
            FrameCorrupt { reason } => write!(fmt, "frame failed validation: {}", reason),
            NoLog {
                requested,
                available,
            } => write!(
                fmt,
                "requested log {} but only {} logs are present",
                requested, available
            ),
            TooManyFields { count, max } => {
                write!(fmt, "schema declares {} fields, max is {}", count, max)
            }
            StdIoError(e) => write!(fmt, "{}", e),
            TryFromSlice(e) => write!(fmt, "{}", e),
        }
    }
}

impl std::error::Error for BlackboxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use self::BlackboxError::*;
        match self {
            StdIoError(e) => e.source(),
            TryFromSlice(e) => e.source(),
            _ => None,
        }
    }
}

impl From<BlackboxError> for String {
    fn from(e: BlackboxError) -> String {
        e.to_string()
    }
}
