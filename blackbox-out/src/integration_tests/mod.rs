//! End-to-end tests that drive [`crate::BlackboxWriter`] against an
//! in-memory transport and feed the result straight into `blackbox-in`,
//! the same "round trip through the real reader" shape
//! `giga_segy_out::integration_tests::survey_roundtrip` uses against
//! `giga_segy_in`.
mod session_roundtrip;
