//! Writer-only settings layered on top of [`Config`], in the same
//! trait-over-settings shape `giga_segy_out`'s `SegyWriteSettings` gives the
//! SEG-Y writer: the session type is generic over anything implementing this
//! trait, so an embedded integrator can swap in its own settings type without
//! this crate needing to know about it.
use blackbox_core::Config;

/// Everything [`crate::BlackboxWriter`] needs besides the schema itself:
/// the shared session [`Config`] plus knobs that only make sense on the
/// write side.
pub trait BlackboxWriteSettings {
    /// Constants shared with the decoder (`I interval`, throttle range, ...).
    fn config(&self) -> &Config;

    /// Maximum bytes written to the transport per `tick()`, so a fixed-size
    /// serial buffer never overflows.
    fn chunk_size(&self) -> usize;

    /// Whether the producer struct carries a tricopter tail servo channel.
    fn has_servo(&self) -> bool;
}

/// The settings this crate ships out of the box: a plain `Config` plus a
/// fixed chunk size, no servo channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultWriteSettings {
    config: Config,
    chunk_size: usize,
    has_servo: bool,
}

impl DefaultWriteSettings {
    pub fn new(config: Config, chunk_size: usize) -> Self {
        Self {
            config,
            chunk_size: chunk_size.max(1),
            has_servo: false,
        }
    }

    pub fn with_servo(mut self, has_servo: bool) -> Self {
        self.has_servo = has_servo;
        self
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}

impl Default for DefaultWriteSettings {
    fn default() -> Self {
        Self::new(Config::default(), 64)
    }
}

impl BlackboxWriteSettings for DefaultWriteSettings {
    fn config(&self) -> &Config {
        &self.config
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn has_servo(&self) -> bool {
        self.has_servo
    }
}
