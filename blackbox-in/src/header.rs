//! Parses the `H <name>:<value>` header block at the start of a log into a
//! [`Schema`] and [`Config`].
//!
//! Plays the "raw bytes into a typed struct" role `giga_segy_in`'s header
//! conversions play for SEG-Y's binary header, but the wire format here is
//! line-oriented ASCII rather than fixed byte offsets, so the conversion is a
//! line-by-line dispatch instead of a byte-range table.
use blackbox_core::enums::{Encoding, FirmwareType, Predictor};
use blackbox_core::{BlackboxError, Config, FieldDef, Schema};

/// Parsed header plus the byte offset of the first data-block byte.
pub(crate) struct ParsedHeader {
    pub(crate) schema: Schema,
    pub(crate) config: Config,
    pub(crate) data_version: u32,
    pub(crate) data_start: usize,
}

#[derive(Default)]
struct RawFieldGroup {
    name: Vec<String>,
    signed: Vec<bool>,
    predictor: Vec<u8>,
    encoding: Vec<u8>,
}

impl RawFieldGroup {
    fn into_field_defs(self, inter: Option<RawFieldGroup>) -> Result<Vec<FieldDef>, BlackboxError> {
        let count = self.name.len();
        let inter = inter.unwrap_or(RawFieldGroup {
            name: self.name.clone(),
            signed: self.signed.clone(),
            predictor: self.predictor.clone(),
            encoding: self.encoding.clone(),
        });
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            out.push(FieldDef {
                name: self.name[i].clone(),
                signed: *self.signed.get(i).unwrap_or(&true),
                intra_predictor: Predictor::new(*self.predictor.get(i).unwrap_or(&0))?,
                intra_encoding: Encoding::new(*self.encoding.get(i).unwrap_or(&0))?,
                inter_predictor: Predictor::new(*inter.predictor.get(i).unwrap_or(&0))?,
                inter_encoding: Encoding::new(*inter.encoding.get(i).unwrap_or(&0))?,
            });
        }
        Ok(out)
    }
}

fn parse_csv_strings(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).collect()
}

fn parse_csv_bools(value: &str) -> Vec<bool> {
    value.split(',').map(|s| s.trim() != "0").collect()
}

fn parse_csv_u8(value: &str) -> Vec<u8> {
    value
        .split(',')
        .filter_map(|s| s.trim().parse::<u8>().ok())
        .collect()
}

/// Parse the `H ` header block starting at `bytes[0]`, stopping at the first
/// line that does not begin with `H `. Returns [`BlackboxError::BadHeader`]
/// for a malformed line and [`BlackboxError::MissingSchema`] if the main
/// field name list was never declared.
pub(crate) fn parse_header(bytes: &[u8]) -> Result<ParsedHeader, BlackboxError> {
    let mut config = Config::default();
    let mut data_version: u32 = 2;

    let mut main_intra = RawFieldGroup::default();
    let mut main_inter: Option<RawFieldGroup> = None;
    let mut gps = RawFieldGroup::default();
    let mut home = RawFieldGroup::default();

    let mut pos = 0usize;
    while pos < bytes.len() && bytes[pos] == b'H' {
        let line_end = bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .ok_or_else(|| BlackboxError::BadHeader {
                line: String::from_utf8_lossy(&bytes[pos..]).into_owned(),
            })?;
        let line = std::str::from_utf8(&bytes[pos..line_end]).map_err(|_| {
            BlackboxError::BadHeader {
                line: String::from_utf8_lossy(&bytes[pos..line_end]).into_owned(),
            }
        })?;
        pos = line_end + 1;

        let body = line.strip_prefix("H ").ok_or_else(|| BlackboxError::BadHeader {
            line: line.to_string(),
        })?;
        let (name, value) = body.split_once(':').ok_or_else(|| BlackboxError::BadHeader {
            line: line.to_string(),
        })?;

        apply_header_field(
            name,
            value,
            &mut config,
            &mut data_version,
            &mut main_intra,
            &mut main_inter,
            &mut gps,
            &mut home,
        );
    }

    if main_intra.name.is_empty() {
        return Err(BlackboxError::MissingSchema);
    }

    let mut schema = Schema::default();
    schema.main = main_intra.into_field_defs(main_inter)?;
    schema.gps = gps.into_field_defs(None)?;
    schema.home = home.into_field_defs(None)?;
    schema.resolve_motor0_index();

    Ok(ParsedHeader {
        schema,
        config,
        data_version,
        data_start: pos,
    })
}

#[allow(clippy::too_many_arguments)]
fn apply_header_field(
    name: &str,
    value: &str,
    config: &mut Config,
    data_version: &mut u32,
    main_intra: &mut RawFieldGroup,
    main_inter: &mut Option<RawFieldGroup>,
    gps: &mut RawFieldGroup,
    home: &mut RawFieldGroup,
) {
    match name {
        "Data version" => {
            if let Ok(v) = value.trim().parse() {
                *data_version = v;
            }
        }
        "Field I name" => main_intra.name = parse_csv_strings(value),
        "Field I signed" => main_intra.signed = parse_csv_bools(value),
        "Field I predictor" => main_intra.predictor = parse_csv_u8(value),
        "Field I encoding" => main_intra.encoding = parse_csv_u8(value),
        "Field P predictor" => {
            main_inter.get_or_insert_with(RawFieldGroup::default).predictor = parse_csv_u8(value);
        }
        "Field P encoding" => {
            main_inter.get_or_insert_with(RawFieldGroup::default).encoding = parse_csv_u8(value);
        }
        "Field G name" => gps.name = parse_csv_strings(value),
        "Field G signed" => gps.signed = parse_csv_bools(value),
        "Field G predictor" => gps.predictor = parse_csv_u8(value),
        "Field G encoding" => gps.encoding = parse_csv_u8(value),
        "Field H name" => home.name = parse_csv_strings(value),
        "Field H signed" => home.signed = parse_csv_bools(value),
        "Field H predictor" => home.predictor = parse_csv_u8(value),
        "Field H encoding" => home.encoding = parse_csv_u8(value),
        "I interval" => {
            if let Ok(v) = value.trim().parse() {
                config.set_i_interval(v);
            }
        }
        "P interval" => {
            if let Some((num, denom)) = value.split_once('/') {
                if let (Ok(num), Ok(denom)) = (num.trim().parse(), denom.trim().parse()) {
                    config.set_p_interval(num, denom);
                }
            }
        }
        "Firmware type" => config.set_firmware_type(FirmwareType::new(value.trim())),
        "minthrottle" => {
            if let Ok(v) = value.trim().parse() {
                config.set_min_throttle(v);
            }
        }
        "maxthrottle" => {
            if let Ok(v) = value.trim().parse() {
                config.set_max_throttle(v);
            }
        }
        "rcRate" => {
            if let Ok(v) = value.trim().parse() {
                config.set_rc_rate(v);
            }
        }
        "acc_1G" => {
            if let Ok(v) = value.trim().parse() {
                config.set_acc_1g(v);
            }
        }
        "vbatref" => {
            if let Ok(v) = value.trim().parse() {
                config.set_vbat_ref(v);
            }
        }
        "vbatscale" => {
            if let Ok(v) = value.trim().parse() {
                config.set_vbat_scale(v);
            }
        }
        "vbatcellvoltage" => {
            if let Ok(v) = value.trim().parse() {
                config.set_vbat_cell_voltage(v);
            }
        }
        "gyro.scale" => {
            if let Ok(bits) = u32::from_str_radix(value.trim().trim_start_matches("0x"), 16) {
                config.set_gyro_scale_from_bits(bits);
            }
        }
        // Unknown header names are ignored, per the schema/header spec.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Vec<u8> {
        let mut h = String::new();
        h.push_str("H Product:Blackbox flight data recorder by Nicholas Sherlock\n");
        h.push_str("H Data version:2\n");
        h.push_str("H Field I name:loopIteration,time,motor[0],motor[1]\n");
        h.push_str("H Field I signed:0,0,0,0\n");
        h.push_str("H Field I predictor:0,0,4,4\n");
        h.push_str("H Field I encoding:1,1,0,0\n");
        h.push_str("H Field P predictor:6,1,5,5\n");
        h.push_str("H Field P encoding:9,0,0,0\n");
        h.push_str("H I interval:32\n");
        h.push_str("H P interval:1/1\n");
        h.push_str("H minthrottle:1150\n");
        h.push_str("Idata-follows");
        h.into_bytes()
    }

    #[test]
    fn parses_field_names_and_intra_inter_predictors() {
        let parsed = parse_header(&sample_header()).unwrap();
        assert_eq!(parsed.schema.main.len(), 4);
        assert_eq!(parsed.schema.main[2].name, "motor[0]");
        assert_eq!(parsed.schema.main[0].inter_predictor, Predictor::Increment);
        assert_eq!(parsed.schema.main[2].intra_predictor, Predictor::MinThrottle);
        assert_eq!(parsed.schema.motor0_index(), Some(2));
        assert_eq!(parsed.config.get_min_throttle(), 1150);
        assert_eq!(parsed.config.get_i_interval(), 32);
        assert_eq!(&sample_header()[parsed.data_start..], b"Idata-follows");
    }

    #[test]
    fn missing_field_names_is_a_missing_schema_error() {
        let bytes = b"H Data version:2\nIdata";
        assert!(matches!(
            parse_header(bytes),
            Err(BlackboxError::MissingSchema)
        ));
    }

    #[test]
    fn a_line_without_a_colon_is_a_bad_header() {
        let bytes = b"H garbage\nIdata";
        assert!(matches!(parse_header(bytes), Err(BlackboxError::BadHeader { .. })));
    }
}
