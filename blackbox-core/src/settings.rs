//! Session-wide constants threaded through both the encoder and the decoder.
//!
//! Replaces the historical C implementation's process globals
//! (`minthrottle`, `numberMotor`, ...) with a single immutable value, the
//! same role `giga_segy_core::SegySettings` plays for SEG-Y writes.
use crate::enums::FirmwareType;

/// Immutable constants carried for the lifetime of one encode session or one
/// decode pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    min_throttle: i32,
    max_throttle: i32,
    rc_rate: u32,
    yaw_rate: u32,
    acc_1g: u16,
    gyro_scale: f32,
    vbat_ref: i32,
    vbat_scale: u32,
    vbat_cell_voltage: u32,
    firmware_type: FirmwareType,
    motor_count: u8,
    i_interval: u32,
    p_interval_num: u32,
    p_interval_denom: u32,
    /// Intracycle count, in multiples of `i_interval` cycles, at which the
    /// GPS home coordinate is re-emitted even without a change. Resolves the
    /// "every 128 keyframe cycles" design note as a configurable cadence.
    gps_home_repeat_cycles: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_throttle: 1150,
            max_throttle: 1850,
            rc_rate: 90,
            yaw_rate: 0,
            acc_1g: 4096,
            gyro_scale: 1.0,
            vbat_ref: 0,
            vbat_scale: 110,
            vbat_cell_voltage: 0,
            firmware_type: FirmwareType::Cleanflight,
            motor_count: 4,
            i_interval: 32,
            p_interval_num: 1,
            p_interval_denom: 1,
            gps_home_repeat_cycles: 128,
        }
    }
}

impl Config {
    pub fn get_min_throttle(&self) -> i32 {
        self.min_throttle
    }

    pub fn set_min_throttle(&mut self, v: i32) {
        self.min_throttle = v;
    }

    pub fn get_max_throttle(&self) -> i32 {
        self.max_throttle
    }

    pub fn set_max_throttle(&mut self, v: i32) {
        self.max_throttle = v;
    }

    pub fn get_rc_rate(&self) -> u32 {
        self.rc_rate
    }

    pub fn set_rc_rate(&mut self, v: u32) {
        self.rc_rate = v;
    }

    pub fn get_yaw_rate(&self) -> u32 {
        self.yaw_rate
    }

    pub fn set_yaw_rate(&mut self, v: u32) {
        self.yaw_rate = v;
    }

    pub fn get_acc_1g(&self) -> u16 {
        self.acc_1g
    }

    pub fn set_acc_1g(&mut self, v: u16) {
        self.acc_1g = v;
    }

    /// The raw gyro scale, already normalised for this session's firmware
    /// lineage (see [`Self::set_gyro_scale_from_bits`]).
    pub fn get_gyro_scale(&self) -> f32 {
        self.gyro_scale
    }

    pub fn set_gyro_scale(&mut self, v: f32) {
        self.gyro_scale = v;
    }

    /// Reconstruct `gyro.scale` from the raw IEEE-754 bit pattern shipped in
    /// the header, normalising degrees/sec firmwares to match Cleanflight's
    /// native units.
    ///
    /// ```
    /// use blackbox_core::settings::Config;
    /// use blackbox_core::enums::FirmwareType;
    ///
    /// let mut cfg = Config::default();
    /// cfg.set_firmware_type(FirmwareType::Baseflight);
    /// cfg.set_gyro_scale_from_bits(1.0f32.to_bits());
    /// assert!((cfg.get_gyro_scale() - (std::f32::consts::PI / 180.0 * 0.000001)).abs() < 1e-12);
    /// ```
    pub fn set_gyro_scale_from_bits(&mut self, bits: u32) {
        let raw = f32::from_bits(bits);
        self.gyro_scale = match self.firmware_type {
            FirmwareType::Baseflight => raw * (std::f32::consts::PI / 180.0 * 0.000_001),
            FirmwareType::Cleanflight => raw,
        };
    }

    pub fn get_vbat_ref(&self) -> i32 {
        self.vbat_ref
    }

    pub fn set_vbat_ref(&mut self, v: i32) {
        self.vbat_ref = v;
    }

    pub fn get_vbat_scale(&self) -> u32 {
        self.vbat_scale
    }

    pub fn set_vbat_scale(&mut self, v: u32) {
        self.vbat_scale = v;
    }

    pub fn get_vbat_cell_voltage(&self) -> u32 {
        self.vbat_cell_voltage
    }

    pub fn set_vbat_cell_voltage(&mut self, v: u32) {
        self.vbat_cell_voltage = v;
    }

    pub fn get_firmware_type(&self) -> FirmwareType {
        self.firmware_type
    }

    pub fn set_firmware_type(&mut self, v: FirmwareType) {
        self.firmware_type = v;
    }

    pub fn get_motor_count(&self) -> u8 {
        self.motor_count
    }

    /// Set the number of motors actually present (1-8). The textual field
    /// templates cover 8 motors; trailing unused ones are trimmed by the
    /// schema/header layer using this count.
    pub fn set_motor_count(&mut self, v: u8) {
        self.motor_count = v.min(8);
    }

    pub fn get_i_interval(&self) -> u32 {
        self.i_interval
    }

    pub fn set_i_interval(&mut self, v: u32) {
        self.i_interval = v.max(1);
    }

    pub fn get_p_interval(&self) -> (u32, u32) {
        (self.p_interval_num, self.p_interval_denom)
    }

    pub fn set_p_interval(&mut self, num: u32, denom: u32) {
        self.p_interval_num = num;
        self.p_interval_denom = denom.max(1);
    }

    pub fn get_gps_home_repeat_cycles(&self) -> u32 {
        self.gps_home_repeat_cycles
    }

    pub fn set_gps_home_repeat_cycles(&mut self, v: u32) {
        self.gps_home_repeat_cycles = v;
    }

    /// Whether iteration `k` should have a frame emitted, given the
    /// `P interval num/denom` sampling fraction.
    ///
    /// ```
    /// use blackbox_core::settings::Config;
    /// let mut cfg = Config::default();
    /// cfg.set_p_interval(1, 2);
    /// let present: Vec<bool> = (0u32..4).map(|k| cfg.should_have_frame(k)).collect();
    /// assert_eq!(present, vec![true, false, true, false]);
    /// ```
    pub fn should_have_frame(&self, k: u32) -> bool {
        let i = self.i_interval;
        let num = self.p_interval_num;
        let denom = self.p_interval_denom;
        (k % i + num - 1) % denom < num
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.get_i_interval(), 32);
        assert_eq!(cfg.get_gps_home_repeat_cycles(), 128);
    }

    #[test]
    fn should_have_frame_is_always_true_for_a_1_1_fraction() {
        let cfg = Config::default();
        assert!((0u32..100).all(|k| cfg.should_have_frame(k)));
    }
}
