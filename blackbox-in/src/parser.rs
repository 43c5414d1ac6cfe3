//! Frame decoding and the resynchronising parser state machine.
//!
//! This is the decoder-side mirror of the frame layer: where `blackbox-out`
//! walks a schema applying predictors forward, this module walks the same
//! schema applying them in reverse, against a one-frame lookahead that
//! decides whether the previous candidate frame gets committed or thrown
//! away and re-searched from its first byte.
use blackbox_core::enums::{Encoding, FrameType, Predictor};
use blackbox_core::schema::{decode_value, predict_value};
use blackbox_core::varint::{
    read_signed_vlq, read_tag2_3s32, read_tag8_4s16_v1, read_tag8_4s16_v2, read_tag8_8svb,
    read_unsigned_vlq, sign_extend,
};
use blackbox_core::{
    BlackboxError, Config, FieldDef, FlightLogStatistics, GpsHomeState, HistoryRing, Schema,
    FIELD_INDEX_ITERATION, FIELD_INDEX_TIME,
};

fn read_fixed(bytes: &[u8], pos: &mut usize, width: usize) -> Result<u32, BlackboxError> {
    let mut v: u32 = 0;
    for i in 0..width {
        let byte = *bytes.get(*pos + i).ok_or(BlackboxError::UnexpectedEof)?;
        v |= (byte as u32) << (8 * i);
    }
    *pos += width;
    Ok(v)
}

/// How many consecutive fields, starting at `start`, one occurrence of
/// `encoding` consumes. Fixed for the two bounded group codecs; for
/// `Tag8_8Svb` the run extends while consecutive fields declare the same
/// encoding, capped at eight.
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

fn decode_residuals(
    encoding: Encoding,
    data_version: u32,
    run: usize,
    bytes: &[u8],
    pos: &mut usize,
) -> Result<Vec<i32>, BlackboxError> {
    match encoding {
        Encoding::SignedVb => Ok(vec![read_signed_vlq(bytes, pos)?]),
        Encoding::UnsignedVb => Ok(vec![read_unsigned_vlq(bytes, pos)? as i32]),
        Encoding::U8 => Ok(vec![read_fixed(bytes, pos, 1)? as i32]),
        Encoding::U16 => Ok(vec![read_fixed(bytes, pos, 2)? as i32]),
        Encoding::U32 => Ok(vec![read_fixed(bytes, pos, 4)? as i32]),
        Encoding::S8 => Ok(vec![sign_extend(read_fixed(bytes, pos, 1)?, 8)]),
        Encoding::S16 => Ok(vec![sign_extend(read_fixed(bytes, pos, 2)?, 16)]),
        Encoding::S32 => Ok(vec![read_fixed(bytes, pos, 4)? as i32]),
        Encoding::Null => Ok(vec![0; run.max(1)]),
        Encoding::Tag8_4S16 => {
            let arr = if data_version <= 1 {
                read_tag8_4s16_v1(bytes, pos)?
            } else {
                read_tag8_4s16_v2(bytes, pos)?
            };
            Ok(arr.to_vec())
        }
        Encoding::Tag2_3S32 => Ok(read_tag2_3s32(bytes, pos)?.to_vec()),
        Encoding::Tag8_8Svb => read_tag8_8svb(bytes, pos, run),
    }
}

/// Walk `fields` left to right, decoding one residual (or group of
/// residuals) per step and turning each into a value via `predict`.
///
/// `predict(idx, values_so_far)` returns the predictor baseline for field
/// `idx`; for an `Increment` field it instead returns the fully
/// reconstructed value directly, since no residual is written for it.
fn decode_fields(
    fields: &[FieldDef],
    data_version: u32,
    use_inter: bool,
    bytes: &[u8],
    pos: &mut usize,
    mut predict: impl FnMut(usize, bool, &[i32]) -> i32,
) -> Result<Vec<i32>, BlackboxError> {
    let mut values = vec![0i32; fields.len()];
    let mut cursor = 0;
    while cursor < fields.len() {
        let predictor = if use_inter {
            fields[cursor].inter_predictor
        } else {
            fields[cursor].intra_predictor
        };
        if predictor == Predictor::Increment {
            values[cursor] = predict(cursor, true, &values);
            cursor += 1;
            continue;
        }
        let encoding = if use_inter {
            fields[cursor].inter_encoding
        } else {
            fields[cursor].intra_encoding
        };
        let run = group_run_length(fields, cursor, encoding, use_inter);
        if encoding == Encoding::Tag8_4S16 && run != 4 {
            return Err(BlackboxError::FrameCorrupt {
                reason: "Tag8_4S16 group ran past the end of the schema",
            });
        }
        if encoding == Encoding::Tag2_3S32 && run != 3 {
            return Err(BlackboxError::FrameCorrupt {
                reason: "Tag2_3S32 group ran past the end of the schema",
            });
        }
        let residuals = decode_residuals(encoding, data_version, run, bytes, pos)?;
        for (k, residual) in residuals.into_iter().enumerate() {
            let idx = cursor + k;
            let predicted = predict(idx, false, &values);
            values[idx] = decode_value(residual, predicted);
        }
        cursor += run.max(1);
    }
    Ok(values)
}

fn decode_intraframe(
    schema: &Schema,
    config: &Config,
    data_version: u32,
    bytes: &[u8],
    pos: &mut usize,
) -> Result<Vec<i32>, BlackboxError> {
    let fields = &schema.main;
    let motor0 = schema.motor0_index();
    decode_fields(fields, data_version, false, bytes, pos, |idx, _is_inc, values| {
        let motor0_prev = motor0.filter(|&m| m < idx).map(|m| values[m]);
        predict_value(
            fields[idx].intra_predictor,
            fields[idx].signed,
            0,
            0,
            motor0_prev,
            None,
            config,
        )
    })
}

fn decode_interframe(
    schema: &Schema,
    config: &Config,
    data_version: u32,
    history: &HistoryRing,
    skipped: u32,
    bytes: &[u8],
    pos: &mut usize,
) -> Result<Vec<i32>, BlackboxError> {
    let fields = &schema.main;
    let prev = history.prev();
    let prev2 = history.prev2();
    decode_fields(fields, data_version, true, bytes, pos, |idx, is_increment, _values| {
        if is_increment {
            return prev[idx].wrapping_add(1).wrapping_add(skipped as i32);
        }
        predict_value(
            fields[idx].inter_predictor,
            fields[idx].signed,
            prev[idx],
            prev2[idx],
            None,
            None,
            config,
        )
    })
}

/// Index convention for the GPS tuple: `(numSat, lat, lon, altitude,
/// speed)`, matching the historical field order. Index 1 predicts against
/// the home latitude, index 2 against the home longitude; the `HomeCoord`
/// predictor folds the home coordinate back in during decode, so the
/// reconstructed values are absolute, not home-relative (only the on-wire
/// residual is a delta).
fn decode_gps_frame(
    schema: &Schema,
    config: &Config,
    data_version: u32,
    gps_state: &GpsHomeState,
    bytes: &[u8],
    pos: &mut usize,
) -> Result<Vec<i32>, BlackboxError> {
    let fields = &schema.gps;
    decode_fields(fields, data_version, false, bytes, pos, |idx, _is_inc, _values| {
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
    })
}

fn decode_home_frame(
    schema: &Schema,
    config: &Config,
    data_version: u32,
    bytes: &[u8],
    pos: &mut usize,
) -> Result<Vec<i32>, BlackboxError> {
    let fields = &schema.home;
    decode_fields(fields, data_version, false, bytes, pos, |idx, _is_inc, _values| {
        predict_value(
            fields[idx].intra_predictor,
            fields[idx].signed,
            0,
            0,
            None,
            None,
            config,
        )
    })
}

struct Pending {
    frame_type: FrameType,
    start: usize,
    end: usize,
    decoded: Option<Vec<i32>>,
}

/// Drives the resynchronising parse described in the stream state machine,
/// invoking `on_frame(valid, frame_type, values, offset, size)` once per
/// candidate frame, in wire order.
pub(crate) fn parse_data_block(
    bytes: &[u8],
    data_start: usize,
    schema: &Schema,
    config: &Config,
    data_version: u32,
    mut on_frame: impl FnMut(bool, FrameType, &[i32], usize, usize),
    mut on_event: impl FnMut(usize, u32, u32),
) -> FlightLogStatistics {
    let mut stats = FlightLogStatistics::new(schema.main.len());
    let mut history = HistoryRing::new(schema.main.len());
    let mut gps_state = GpsHomeState::default();
    let mut main_valid = false;
    let mut max_iteration: i64 = i64::MIN;
    let mut max_time: i64 = i64::MIN;
    let mut next_virtual_tick: u32 = 0;

    let mut pos = data_start;
    let mut pending: Option<Pending> = None;

    loop {
        let at_boundary = pos >= bytes.len() || FrameType::from_marker(bytes[pos]).is_some();

        if let Some(p) = pending.take() {
            let structurally_ok = at_boundary
                && p.decoded.is_some()
                && (p.frame_type != FrameType::Intra
                    || {
                        let v = p.decoded.as_ref().unwrap();
                        v[FIELD_INDEX_ITERATION] as i64 >= max_iteration
                            && v[FIELD_INDEX_TIME] as i64 >= max_time
                    });

            if structurally_ok {
                let values = p.decoded.as_ref().unwrap();
                stats.record_frame(p.frame_type, p.end - p.start);
                match p.frame_type {
                    FrameType::Intra => {
                        history.scratch_mut().clear();
                        history.scratch_mut().extend_from_slice(values);
                        history.commit_intra();
                        max_iteration = max_iteration.max(values[FIELD_INDEX_ITERATION] as i64);
                        max_time = max_time.max(values[FIELD_INDEX_TIME] as i64);
                        for (i, &v) in values.iter().enumerate() {
                            stats.observe_field(i, v as i64);
                        }
                        main_valid = true;
                        on_frame(true, p.frame_type, values, p.start, p.end - p.start);
                    }
                    FrameType::Inter => {
                        history.scratch_mut().clear();
                        history.scratch_mut().extend_from_slice(values);
                        history.commit_inter();
                        max_iteration = max_iteration.max(values[FIELD_INDEX_ITERATION] as i64);
                        max_time = max_time.max(values[FIELD_INDEX_TIME] as i64);
                        for (i, &v) in values.iter().enumerate() {
                            stats.observe_field(i, v as i64);
                        }
                        if main_valid {
                            on_frame(true, p.frame_type, values, p.start, p.end - p.start);
                        } else {
                            stats.num_unusable_p_frames += 1;
                            on_frame(false, p.frame_type, values, p.start, p.end - p.start);
                        }
                    }
                    FrameType::Gps => {
                        gps_state.last_num_sat = values[0];
                        gps_state.last_lat = values.get(1).copied().unwrap_or(0);
                        gps_state.last_lon = values.get(2).copied().unwrap_or(0);
                        gps_state.last_altitude = values.get(3).copied().unwrap_or(0);
                        gps_state.last_speed = values.get(4).copied().unwrap_or(0);
                        on_frame(true, p.frame_type, values, p.start, p.end - p.start);
                    }
                    FrameType::GpsHome => {
                        gps_state.has_home = true;
                        gps_state.home_lat = values.first().copied().unwrap_or(0);
                        gps_state.home_lon = values.get(1).copied().unwrap_or(0);
                        on_frame(true, p.frame_type, values, p.start, p.end - p.start);
                    }
                }
            } else {
                stats.num_broken_frames += 1;
                if p.frame_type == FrameType::Intra || p.frame_type == FrameType::Inter {
                    main_valid = false;
                }
                on_frame(false, p.frame_type, &[], p.start, 0);
                // Resume a byte-by-byte search for the next plausible marker
                // starting just past the corrupt frame's first byte.
                pos = p.start + 1;
                continue;
            }
        }

        if pos >= bytes.len() {
            break;
        }

        match FrameType::from_marker(bytes[pos]) {
            Some(frame_type @ (FrameType::Intra | FrameType::Inter)) => {
                let mut skipped = 0u32;
                while !config.should_have_frame(next_virtual_tick) {
                    skipped += 1;
                    stats.intentionally_absent_frames += 1;
                    next_virtual_tick += 1;
                }
                next_virtual_tick += 1;

                let start = pos;
                let mut cursor = pos + 1;
                let decoded = if frame_type == FrameType::Intra {
                    decode_intraframe(schema, config, data_version, bytes, &mut cursor)
                } else {
                    decode_interframe(schema, config, data_version, &history, skipped, bytes, &mut cursor)
                };
                let end = cursor;
                pending = Some(Pending {
                    frame_type,
                    start,
                    end,
                    decoded: decoded.ok(),
                });
                pos = end;
            }
            Some(frame_type @ FrameType::Gps) => {
                let start = pos;
                let mut cursor = pos + 1;
                let decoded = decode_gps_frame(schema, config, data_version, &gps_state, bytes, &mut cursor);
                let end = cursor;
                pending = Some(Pending {
                    frame_type,
                    start,
                    end,
                    decoded: decoded.ok(),
                });
                pos = end;
            }
            Some(frame_type @ FrameType::GpsHome) => {
                let start = pos;
                let mut cursor = pos + 1;
                let decoded = decode_home_frame(schema, config, data_version, bytes, &mut cursor);
                let end = cursor;
                pending = Some(Pending {
                    frame_type,
                    start,
                    end,
                    decoded: decoded.ok(),
                });
                pos = end;
            }
            None if bytes[pos] == b'E' => {
                // An in-band event marker (sync beep, logging resumed/ended):
                // an event code followed by a single payload value, neither
                // part of the main telemetry stream, so it is reported
                // through `on_event` rather than mixed into frame statistics.
                let offset = pos;
                let mut cursor = pos + 1;
                match (
                    read_unsigned_vlq(bytes, &mut cursor),
                    read_unsigned_vlq(bytes, &mut cursor),
                ) {
                    (Ok(code), Ok(payload)) => {
                        on_event(offset, code, payload);
                        pos = cursor;
                    }
                    _ => pos += 1,
                }
            }
            None => {
                pos += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_core::enums::{Encoding, Predictor};
    use blackbox_core::varint::{write_signed_vlq, write_tag8_4s16_v2, write_unsigned_vlq};
    use blackbox_core::FieldDef;

    fn two_motor_schema() -> Schema {
        let mut schema = Schema::default();
        schema.main = vec![
            FieldDef {
                name: "loopIteration".into(),
                signed: false,
                intra_predictor: Predictor::None,
                intra_encoding: Encoding::UnsignedVb,
                inter_predictor: Predictor::Increment,
                inter_encoding: Encoding::Null,
            },
            FieldDef {
                name: "time".into(),
                signed: false,
                intra_predictor: Predictor::None,
                intra_encoding: Encoding::UnsignedVb,
                inter_predictor: Predictor::StraightLine,
                inter_encoding: Encoding::SignedVb,
            },
            FieldDef {
                name: "motor[0]".into(),
                signed: false,
                intra_predictor: Predictor::MinThrottle,
                intra_encoding: Encoding::SignedVb,
                inter_predictor: Predictor::Previous,
                inter_encoding: Encoding::SignedVb,
            },
            FieldDef {
                name: "motor[1]".into(),
                signed: false,
                intra_predictor: Predictor::Motor0,
                intra_encoding: Encoding::SignedVb,
                inter_predictor: Predictor::Previous,
                inter_encoding: Encoding::SignedVb,
            },
        ];
        schema.resolve_motor0_index();
        schema
    }

    #[test]
    fn scenario_s1_an_all_zero_intraframe_decodes_to_all_zero_fields() {
        let schema = two_motor_schema();
        let config = Config::default();
        let mut body = vec![b'I'];
        write_unsigned_vlq(0, &mut body); // iteration
        write_unsigned_vlq(0, &mut body); // time
        write_signed_vlq(0, &mut body); // motor[0] residual vs minthrottle -> value 1150... see below
        write_signed_vlq(0, &mut body); // motor[1] residual vs motor[0]

        let mut frames = Vec::new();
        parse_data_block(&body, 0, &schema, &config, 2, |valid, ft, values, _off, _len| {
            frames.push((valid, ft, values.to_vec()));
        }, |_off, _code, _payload| {});
        assert_eq!(frames.len(), 1);
        let (valid, ft, values) = &frames[0];
        assert!(*valid);
        assert_eq!(*ft, FrameType::Intra);
        assert_eq!(values[0], 0);
        assert_eq!(values[1], 0);
        assert_eq!(values[2], config.get_min_throttle());
        assert_eq!(values[3], config.get_min_throttle());
    }

    #[test]
    fn scenario_s2_two_keyframes_with_no_intervening_p_track_max_iteration() {
        let schema = two_motor_schema();
        let config = Config::default();
        let mut body = Vec::new();
        for iteration in [0u32, 32] {
            body.push(b'I');
            write_unsigned_vlq(iteration, &mut body);
            write_unsigned_vlq(0, &mut body);
            write_signed_vlq(0, &mut body);
            write_signed_vlq(0, &mut body);
        }
        let mut i_count = 0;
        let mut p_count = 0;
        parse_data_block(&body, 0, &schema, &config, 2, |valid, ft, _values, _off, _len| {
            assert!(valid);
            match ft {
                FrameType::Intra => i_count += 1,
                FrameType::Inter => p_count += 1,
                _ => {}
            }
        }, |_off, _code, _payload| {});
        assert_eq!(i_count, 2);
        assert_eq!(p_count, 0);
    }

    #[test]
    fn scenario_s3_a_zero_delta_p_frame_after_an_i_frame_decodes_cleanly() {
        let mut schema = two_motor_schema();
        // Give motor[0]/motor[1] a Tag8_4S16 inter encoding to mirror the rc-command group.
        schema.main[2].inter_encoding = Encoding::Tag8_4S16;
        schema.main[3].inter_encoding = Encoding::Tag8_4S16;
        schema.main.push(FieldDef {
            name: "rc2".into(),
            signed: true,
            intra_predictor: Predictor::None,
            intra_encoding: Encoding::SignedVb,
            inter_predictor: Predictor::Previous,
            inter_encoding: Encoding::Tag8_4S16,
        });
        schema.main.push(FieldDef {
            name: "rc3".into(),
            signed: true,
            intra_predictor: Predictor::None,
            intra_encoding: Encoding::SignedVb,
            inter_predictor: Predictor::Previous,
            inter_encoding: Encoding::Tag8_4S16,
        });
        let config = Config::default();

        let mut body = vec![b'I'];
        write_unsigned_vlq(0, &mut body);
        write_unsigned_vlq(0, &mut body);
        write_signed_vlq(0, &mut body);
        write_signed_vlq(0, &mut body);
        write_signed_vlq(0, &mut body);
        write_signed_vlq(0, &mut body);

        body.push(b'P');
        write_signed_vlq(0, &mut body); // time delta (StraightLine, zero history -> 0)
        write_tag8_4s16_v2([0, 0, 0, 0], &mut body);

        let mut seen = Vec::new();
        parse_data_block(&body, 0, &schema, &config, 2, |valid, ft, values, _off, _len| {
            seen.push((valid, ft, values.to_vec()));
        }, |_off, _code, _payload| {});
        assert_eq!(seen.len(), 2);
        assert!(seen[1].0);
        assert_eq!(seen[1].1, FrameType::Inter);
    }

    #[test]
    fn scenario_s5_a_corrupted_p_frame_is_reported_invalid_and_does_not_block_the_next_i() {
        let schema = two_motor_schema();
        let config = Config::default();
        let mut body = vec![b'I'];
        write_unsigned_vlq(0, &mut body);
        write_unsigned_vlq(0, &mut body);
        write_signed_vlq(0, &mut body);
        write_signed_vlq(0, &mut body);

        // A P frame whose declared encoding can never terminate validly before
        // hitting end-of-stream: five 0x80 continuation bytes with no
        // terminator, guaranteed to surface as `UnexpectedEof`/`CorruptVarint`.
        body.push(b'P');
        body.extend_from_slice(&[0x80, 0x80, 0x80, 0x80, 0x80]);

        body.push(b'I');
        write_unsigned_vlq(32, &mut body);
        write_unsigned_vlq(1000, &mut body);
        write_signed_vlq(0, &mut body);
        write_signed_vlq(0, &mut body);

        let mut events = Vec::new();
        parse_data_block(&body, 0, &schema, &config, 2, |valid, ft, _values, _off, _len| {
            events.push((valid, ft));
        }, |_off, _code, _payload| {});
        assert!(events.contains(&(false, FrameType::Inter)));
        assert!(events.contains(&(true, FrameType::Intra)));
        assert_eq!(events.iter().filter(|(valid, _)| *valid).count(), 2);
    }
}
