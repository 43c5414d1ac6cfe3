//! Frame assembly: applies the predictor layer forward and emits residuals
//! with each field's declared encoding.
//!
//! This is the write-side mirror of `blackbox-in`'s `parser.rs` decode walk:
//! `encode_fields` advances a field cursor the same way `decode_fields` does,
//! but calls `encode_residual` instead of `decode_value` and a `write_*`
//! varint function instead of a `read_*` one. The two crates cannot literally
//! share this walker (there is no fourth "shared decode loop" crate to put it
//! in), so it is re-derived here against the same schema contract.
use blackbox_core::enums::{Encoding, Predictor};
use blackbox_core::schema::{encode_residual, predict_value};
use blackbox_core::varint::{
    write_signed_vlq, write_tag2_3s32, write_tag8_4s16_v1, write_tag8_4s16_v2, write_tag8_8svb,
    write_unsigned_vlq,
};
use blackbox_core::{Config, FieldDef, FrameType, GpsHomeState, HistoryRing, Schema};
use tinyvec::TinyVec;

/// A residual group never exceeds 8 values (the `Tag8_8Svb` bitmap-prefixed
/// group), so the per-group buffer stays on the stack the way
/// `giga_segy_out::write_data`'s `TinyVec<[u8; 8]>` keeps a field's encoded
/// bytes off the heap.
type ResidualGroup = TinyVec<[i32; 8]>;

fn write_fixed(value: i32, width: usize, out: &mut Vec<u8>) {
    let bytes = (value as u32).to_le_bytes();
    out.extend_from_slice(&bytes[..width]);
}

/// Mirrors `blackbox-in::parser::group_run_length`: how many consecutive
/// fields, starting at `start`, one occurrence of `encoding` consumes.
fn group_run_length(fields: &[FieldDef], start: usize, encoding: Encoding, use_inter: bool) -> usize {
    match encoding {
        Encoding::Tag8_4S16 => 4.min(fields.len() - start),
        Encoding::Tag2_3S32 => 3.min(fields.len() - start),
        Encoding::Tag8_8Svb => {
            let mut n = 0;
            while start + n < fields.len() && n < 8 {
                let e = if use_inter {
                    fields[start + n].inter_encoding
                } else {
                    fields[start + n].intra_encoding
                };
                if e != Encoding::Tag8_8Svb {
                    break;
                }
                n += 1;
            }
            n.max(1)
        }
        _ => 1,
    }
}

fn encode_residual_group(encoding: Encoding, data_version: u32, residuals: &[i32], out: &mut Vec<u8>) {
    match encoding {
        Encoding::SignedVb => write_signed_vlq(residuals[0], out),
        Encoding::UnsignedVb => write_unsigned_vlq(residuals[0] as u32, out),
        Encoding::U8 => write_fixed(residuals[0], 1, out),
        Encoding::U16 => write_fixed(residuals[0], 2, out),
        Encoding::U32 => write_fixed(residuals[0], 4, out),
        Encoding::S8 => write_fixed(residuals[0], 1, out),
        Encoding::S16 => write_fixed(residuals[0], 2, out),
        Encoding::S32 => write_fixed(residuals[0], 4, out),
        Encoding::Null => {}
        Encoding::Tag8_4S16 => {
            let arr = [residuals[0], residuals[1], residuals[2], residuals[3]];
            if data_version <= 1 {
                write_tag8_4s16_v1(arr, out);
            } else {
                write_tag8_4s16_v2(arr, out);
            }
        }
        Encoding::Tag2_3S32 => write_tag2_3s32([residuals[0], residuals[1], residuals[2]], out),
        Encoding::Tag8_8Svb => write_tag8_8svb(residuals, out),
    }
}

/// Walk `fields` left to right, turning each value into a residual (or group
/// of residuals) via `predict` and writing it with the field's declared
/// encoding. `Predictor::Increment` fields are skipped entirely: no residual
/// is ever written for them (the decoder reconstructs the value instead).
fn encode_fields(
    fields: &[FieldDef],
    data_version: u32,
    use_inter: bool,
    values: &[i32],
    mut predict: impl FnMut(usize, &[i32]) -> i32,
    out: &mut Vec<u8>,
) {
    let mut cursor = 0;
    while cursor < fields.len() {
        let predictor = if use_inter {
            fields[cursor].inter_predictor
        } else {
            fields[cursor].intra_predictor
        };
        if predictor == Predictor::Increment {
            cursor += 1;
            continue;
        }
        let encoding = if use_inter {
            fields[cursor].inter_encoding
        } else {
            fields[cursor].intra_encoding
        };
        let run = group_run_length(fields, cursor, encoding, use_inter);
        let residuals: ResidualGroup = (0..run)
            .map(|k| {
                let idx = cursor + k;
                encode_residual(values[idx], predict(idx, values))
            })
            .collect();
        encode_residual_group(encoding, data_version, &residuals, out);
        cursor += run.max(1);
    }
}

/// Emit an `I` frame: every field encoded independently against its intra
/// predictor, then committed as both `prev` and `prev2`.
pub fn encode_intraframe(
    schema: &Schema,
    config: &Config,
    data_version: u32,
    values: &[i32],
    history: &mut HistoryRing,
    out: &mut Vec<u8>,
) {
    out.push(FrameType::Intra.marker());
    let fields = &schema.main;
    let motor0 = schema.motor0_index();
    encode_fields(fields, data_version, false, values, |idx, vals| {
        let motor0_prev = motor0.filter(|&m| m < idx).map(|m| vals[m]);
        predict_value(
            fields[idx].intra_predictor,
            fields[idx].signed,
            0,
            0,
            motor0_prev,
            None,
            config,
        )
    }, out);
    history.scratch_mut().clear();
    history.scratch_mut().extend_from_slice(values);
    history.commit_intra();
}

/// Emit a `P` frame against the history ring's current `prev`/`prev2`, then
/// rotate them. `loopIteration`'s `Increment` field is never written; the
/// caller is expected to have advanced it by `1 + skipped`, matching what
/// the decoder will reconstruct.
pub fn encode_interframe(
    schema: &Schema,
    config: &Config,
    data_version: u32,
    values: &[i32],
    history: &mut HistoryRing,
    out: &mut Vec<u8>,
) {
    out.push(FrameType::Inter.marker());
    let fields = &schema.main;
    let (prev, prev2) = {
        let prev: Vec<i32> = history.prev().to_vec();
        let prev2: Vec<i32> = history.prev2().to_vec();
        (prev, prev2)
    };
    encode_fields(fields, data_version, true, values, |idx, _vals| {
        predict_value(
            fields[idx].inter_predictor,
            fields[idx].signed,
            prev[idx],
            prev2[idx],
            None,
            None,
            config,
        )
    }, out);
    history.scratch_mut().clear();
    history.scratch_mut().extend_from_slice(values);
    history.commit_inter();
}

/// Emit a `G` frame. `values` is `(numSat, lat, lon, altitude, speed)` in
/// absolute units; the `HomeCoord` predictor folds the tracked home
/// coordinate out of lat/lon so only the delta is written.
pub fn encode_gps_frame(
    schema: &Schema,
    config: &Config,
    data_version: u32,
    gps_state: &GpsHomeState,
    values: &[i32],
    out: &mut Vec<u8>,
) {
    out.push(FrameType::Gps.marker());
    let fields = &schema.gps;
    encode_fields(fields, data_version, false, values, |idx, _vals| {
        let home_coord = match idx {
            1 => Some(gps_state.home_lat),
            2 => Some(gps_state.home_lon),
            _ => None,
        };
        predict_value(
            fields[idx].intra_predictor,
            fields[idx].signed,
            0,
            0,
            None,
            home_coord,
            config,
        )
    }, out);
}

/// Emit an `H` (GPS-home) frame: two absolute signed coordinates, no
/// prediction.
pub fn encode_home_frame(
    schema: &Schema,
    config: &Config,
    data_version: u32,
    values: &[i32],
    out: &mut Vec<u8>,
) {
    out.push(FrameType::GpsHome.marker());
    let fields = &schema.home;
    encode_fields(fields, data_version, false, values, |idx, _vals| {
        predict_value(
            fields[idx].intra_predictor,
            fields[idx].signed,
            0,
            0,
            None,
            None,
            config,
        )
    }, out);
}

/// The GPS/home emission cadence: emit `H` then `G` the first time a fix
/// arrives (home has not been latched yet), or every `gps_home_repeat_cycles`
/// keyframe cycles at intracycle slot 15; otherwise emit a lone `G` if any
/// GPS field changed. Home itself is never derived from the live fix here —
/// the caller latches it once and only re-latches on an explicit reset, so a
/// drone moving away from the launch point never counts as a home change.
pub enum GpsEmission {
    None,
    GpsOnly,
    HomeAndGps,
}

pub fn decide_gps_emission(
    config: &Config,
    gps_state: &GpsHomeState,
    i_cycle_count: u32,
    intracycle_index: u32,
    gps_values_changed: bool,
) -> GpsEmission {
    let home_needs_latching = !gps_state.has_home;
    let repeat_due = intracycle_index == 15 && i_cycle_count % config.get_gps_home_repeat_cycles() == 0;
    if home_needs_latching || repeat_due {
        GpsEmission::HomeAndGps
    } else if gps_values_changed {
        GpsEmission::GpsOnly
    } else {
        GpsEmission::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::default_schema;
    use blackbox_core::varint::{read_signed_vlq, read_unsigned_vlq};

    #[test]
    fn intraframe_roundtrips_a_zero_sample_through_minthrottle() {
        let config = Config::default();
        let schema = default_schema(&config, false);
        let values: Vec<i32> = schema
            .main
            .iter()
            .map(|f| if f.name.starts_with("motor[") { config.get_min_throttle() } else { 0 })
            .collect();
        let mut history = HistoryRing::new(schema.main.len());
        let mut out = Vec::new();
        encode_intraframe(&schema, &config, 2, &values, &mut history, &mut out);
        assert_eq!(out[0], b'I');
        assert_eq!(history.prev(), values.as_slice());
        assert_eq!(history.prev2(), values.as_slice());
    }

    #[test]
    fn interframe_with_no_change_encodes_zero_residuals() {
        let config = Config::default();
        let schema = default_schema(&config, false);
        let values: Vec<i32> = schema
            .main
            .iter()
            .map(|f| if f.name.starts_with("motor[") { config.get_min_throttle() } else { 0 })
            .collect();
        let mut history = HistoryRing::new(schema.main.len());
        let mut seed = Vec::new();
        encode_intraframe(&schema, &config, 2, &values, &mut history, &mut seed);

        let mut next = values.clone();
        next[0] += 1; // loopIteration still advances even though Increment writes nothing
        let mut out = Vec::new();
        encode_interframe(&schema, &config, 2, &next, &mut history, &mut out);
        assert_eq!(out[0], b'P');
        // time's StraightLine residual should be the single zero-length varint 0x00.
        let mut pos = 1;
        let time_residual = read_signed_vlq(&out, &mut pos).unwrap();
        assert_eq!(time_residual, 0);
    }

    #[test]
    fn gps_frame_encodes_a_delta_against_the_tracked_home() {
        let config = Config::default();
        let schema = default_schema(&config, false);
        let mut gps_state = GpsHomeState::default();
        gps_state.has_home = true;
        gps_state.home_lat = 1_000_000;
        gps_state.home_lon = 2_000_000;

        let values = vec![8, 1_000_010, 2_000_020, 50, 3];
        let mut out = Vec::new();
        encode_gps_frame(&schema, &config, 2, &gps_state, &values, &mut out);
        assert_eq!(out[0], b'G');
        let mut pos = 1;
        let num_sat = read_unsigned_vlq(&out, &mut pos).unwrap();
        assert_eq!(num_sat, 8);
        let lat_delta = read_signed_vlq(&out, &mut pos).unwrap();
        assert_eq!(lat_delta, 10);
    }

    #[test]
    fn decide_gps_emission_fires_home_and_gps_on_the_repeat_cadence() {
        let config = Config::default();
        let mut gps_state = GpsHomeState::default();
        gps_state.has_home = true;
        gps_state.home_lat = 5;
        gps_state.home_lon = 5;
        let decision = decide_gps_emission(&config, &gps_state, 128, 15, false);
        assert!(matches!(decision, GpsEmission::HomeAndGps));
    }

    #[test]
    fn decide_gps_emission_latches_home_on_the_first_fix_only() {
        let config = Config::default();
        let gps_state = GpsHomeState::default();
        let decision = decide_gps_emission(&config, &gps_state, 0, 0, false);
        assert!(matches!(decision, GpsEmission::HomeAndGps));
    }

    #[test]
    fn decide_gps_emission_is_quiet_when_nothing_changed_off_cadence() {
        let config = Config::default();
        let mut gps_state = GpsHomeState::default();
        gps_state.has_home = true;
        gps_state.home_lat = 5;
        gps_state.home_lon = 5;
        let decision = decide_gps_emission(&config, &gps_state, 3, 7, false);
        assert!(matches!(decision, GpsEmission::None));
    }
}
