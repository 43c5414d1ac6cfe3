//! Converts a [`Schema`]/[`Config`] pair into the `H `-prefixed header lines
//! a session transmits before its first frame, the write-side mirror of
//! `blackbox-in`'s `header.rs` line parser.
//!
//! Plays the same "typed struct to bytes" role `giga_segy_out::write_headers`
//! plays for `TraceHeader`/`BinHeader`, via the same named trait shape
//! (`SegyHeaderToBytes` there, [`BlackboxHeaderToBytes`] here).
use blackbox_core::enums::{Encoding, Predictor};
use blackbox_core::{BlackboxError, Config, FieldDef, Schema, LOG_START_MARKER};
use num::ToPrimitive;

use crate::DATA_VERSION;

pub trait BlackboxHeaderToBytes {
    fn as_bytes(&self) -> Result<Vec<u8>, BlackboxError>;
}

fn csv<T, F>(fields: &[FieldDef], pick: F) -> String
where
    F: Fn(&FieldDef) -> T,
    T: ToString,
{
    fields
        .iter()
        .map(|f| pick(f).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn predictor_id(p: Predictor) -> u8 {
    p.to_u8().expect("Predictor is repr(C) over u8 ids")
}

fn encoding_id(e: Encoding) -> u8 {
    e.to_u8().expect("Encoding is repr(C) over u8 ids")
}

fn field_group_lines(prefix: char, fields: &[FieldDef], use_inter: bool) -> Vec<String> {
    if fields.is_empty() {
        return Vec::new();
    }
    let names = csv(fields, |f| f.name.clone());
    let signed = csv(fields, |f| if f.signed { "1" } else { "0" }.to_string());
    let predictors = csv(fields, |f| {
        predictor_id(if use_inter { f.inter_predictor } else { f.intra_predictor })
    });
    let encodings = csv(fields, |f| {
        encoding_id(if use_inter { f.inter_encoding } else { f.intra_encoding })
    });
    if use_inter {
        vec![
            format!("H Field {} predictor:{}", prefix, predictors),
            format!("H Field {} encoding:{}", prefix, encodings),
        ]
    } else {
        vec![
            format!("H Field {} name:{}", prefix, names),
            format!("H Field {} signed:{}", prefix, signed),
            format!("H Field {} predictor:{}", prefix, predictors),
            format!("H Field {} encoding:{}", prefix, encodings),
        ]
    }
}

/// `Field I`/`Field P` lines for the main schema. Sent during the
/// `SendFieldInfo` state, one line at a time.
pub fn main_field_lines(schema: &Schema) -> Vec<String> {
    let mut lines = field_group_lines('I', &schema.main, false);
    lines.extend(field_group_lines('P', &schema.main, true));
    lines
}

/// `Field G`/`Field H` lines, empty if the session carries no GPS schema.
/// Sent during the conditional `SendGpsHeaders` state, one line at a time.
pub fn gps_field_lines(schema: &Schema) -> Vec<String> {
    let mut lines = field_group_lines('G', &schema.gps, false);
    lines.extend(field_group_lines('H', &schema.home, false));
    lines
}

/// All schema lines: `Field I/P/G/H name/signed/predictor/encoding`.
pub fn field_info_lines(schema: &Schema) -> Vec<String> {
    let mut lines = main_field_lines(schema);
    lines.extend(gps_field_lines(schema));
    lines
}

/// Session-constant lines only: `Data version`, `I interval`, `P interval`,
/// `Firmware type`, and the throttle/battery/gyro constants. Sent during the
/// `SendSysInfo` state, one line at a time.
pub fn sysinfo_lines(config: &Config) -> Vec<String> {
    let (p_num, p_denom) = config.get_p_interval();
    vec![
        format!("H Data version:{}", DATA_VERSION),
        format!("H I interval:{}", config.get_i_interval()),
        format!("H P interval:{}/{}", p_num, p_denom),
        format!(
            "H Firmware type:{}",
            match config.get_firmware_type() {
                blackbox_core::FirmwareType::Baseflight => "Baseflight",
                blackbox_core::FirmwareType::Cleanflight => "Cleanflight",
            }
        ),
        format!("H minthrottle:{}", config.get_min_throttle()),
        format!("H maxthrottle:{}", config.get_max_throttle()),
        format!("H rcRate:{}", config.get_rc_rate()),
        format!("H acc_1G:{}", config.get_acc_1g()),
        format!("H vbatref:{}", config.get_vbat_ref()),
        format!("H vbatscale:{}", config.get_vbat_scale()),
        format!("H vbatcellvoltage:{}", config.get_vbat_cell_voltage()),
        format!("H gyro.scale:0x{:08x}", config.get_gyro_scale().to_bits()),
    ]
}

/// Implements [`BlackboxHeaderToBytes`] for the pair the writer holds: the
/// `Product` marker, followed by the field-info and system-info lines, each
/// newline-terminated, ready to hand to the transport.
pub struct SessionHeader<'a> {
    pub schema: &'a Schema,
    pub config: &'a Config,
}

impl BlackboxHeaderToBytes for SessionHeader<'_> {
    fn as_bytes(&self) -> Result<Vec<u8>, BlackboxError> {
        let mut out = Vec::new();
        out.extend_from_slice(LOG_START_MARKER.as_bytes());
        for line in sysinfo_lines(self.config) {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        for line in field_info_lines(self.schema) {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::default_schema;

    #[test]
    fn field_info_lines_declare_every_frame_types_schema() {
        let config = Config::default();
        let schema = default_schema(&config, false);
        let lines = field_info_lines(&schema);
        assert!(lines.iter().any(|l| l.starts_with("H Field I name:loopIteration")));
        assert!(lines.iter().any(|l| l.starts_with("H Field P predictor:")));
        assert!(lines.iter().any(|l| l.starts_with("H Field G name:GPS_numSat")));
        assert!(lines.iter().any(|l| l.starts_with("H Field H name:GPS_home[0]")));
    }

    #[test]
    fn sysinfo_lines_carry_the_configured_throttle_range() {
        let mut config = Config::default();
        config.set_min_throttle(1100);
        let lines = sysinfo_lines(&config);
        assert!(lines.contains(&"H minthrottle:1100".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("H Data version:")));
    }

    #[test]
    fn session_header_starts_with_the_log_start_marker() {
        let config = Config::default();
        let schema = default_schema(&config, false);
        let bytes = SessionHeader {
            schema: &schema,
            config: &config,
        }
        .as_bytes()
        .unwrap();
        assert!(bytes.starts_with(LOG_START_MARKER.as_bytes()));
    }
}
