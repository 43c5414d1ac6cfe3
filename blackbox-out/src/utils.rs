//! Builds the canonical field schema the encoder publishes: `loopIteration`,
//! `time`, four RC commands, three gyro axes, three accelerometer axes, and
//! `motor[0..motor_count]`, trimmed to the number of motors actually wired up
//! the way `blackboxHeaderFields` is trimmed by `motorsToRemove` in the
//! historical firmware (the textual template always covers 8 motors).
use blackbox_core::enums::{Encoding, Predictor};
use blackbox_core::{Config, FieldDef, Schema};

/// Upper bound on motors a schema can declare; matches the historical
/// template's fixed 8-motor header text.
pub const MAX_MOTORS: u8 = 8;

fn field(
    name: &str,
    signed: bool,
    intra_predictor: Predictor,
    intra_encoding: Encoding,
    inter_predictor: Predictor,
    inter_encoding: Encoding,
) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        signed,
        intra_predictor,
        intra_encoding,
        inter_predictor,
        inter_encoding,
    }
}

/// The main-frame field template, trimmed to `config.get_motor_count()`
/// motors (clamped to `[1, MAX_MOTORS]`) and carrying a tail servo channel
/// when `has_servo` is set (tricopters only).
pub fn default_main_fields(config: &Config, has_servo: bool) -> Vec<FieldDef> {
    let mut fields = vec![
        field(
            "loopIteration",
            false,
            Predictor::None,
            Encoding::UnsignedVb,
            Predictor::Increment,
            Encoding::Null,
        ),
        field(
            "time",
            false,
            Predictor::None,
            Encoding::UnsignedVb,
            Predictor::StraightLine,
            Encoding::SignedVb,
        ),
        field(
            "rcCommand[0]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Previous,
            Encoding::Tag8_4S16,
        ),
        field(
            "rcCommand[1]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Previous,
            Encoding::Tag8_4S16,
        ),
        field(
            "rcCommand[2]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Previous,
            Encoding::Tag8_4S16,
        ),
        // Throttle: unsigned, unlike the three stick axes above it.
        field(
            "rcCommand[3]",
            false,
            Predictor::None,
            Encoding::UnsignedVb,
            Predictor::Previous,
            Encoding::Tag8_4S16,
        ),
        field(
            "gyroData[0]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Average2,
            Encoding::SignedVb,
        ),
        field(
            "gyroData[1]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Average2,
            Encoding::SignedVb,
        ),
        field(
            "gyroData[2]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Average2,
            Encoding::SignedVb,
        ),
        field(
            "accSmooth[0]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Average2,
            Encoding::SignedVb,
        ),
        field(
            "accSmooth[1]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Average2,
            Encoding::SignedVb,
        ),
        field(
            "accSmooth[2]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Average2,
            Encoding::SignedVb,
        ),
    ];

    let motor_count = config.get_motor_count().clamp(1, MAX_MOTORS);
    for i in 0..motor_count {
        let (intra_predictor, intra_encoding) = if i == 0 {
            (Predictor::MinThrottle, Encoding::UnsignedVb)
        } else {
            (Predictor::Motor0, Encoding::SignedVb)
        };
        fields.push(field(
            &format!("motor[{}]", i),
            false,
            intra_predictor,
            intra_encoding,
            Predictor::Average2,
            Encoding::SignedVb,
        ));
    }

    if has_servo {
        fields.push(field(
            "servo[5]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::Previous,
            Encoding::SignedVb,
        ));
    }

    fields
}

/// The GPS-frame field template: satellite count, home-relative lat/lon,
/// altitude, speed.
pub fn default_gps_fields() -> Vec<FieldDef> {
    vec![
        field(
            "GPS_numSat",
            false,
            Predictor::None,
            Encoding::UnsignedVb,
            Predictor::None,
            Encoding::UnsignedVb,
        ),
        field(
            "GPS_coord[0]",
            true,
            Predictor::HomeCoord,
            Encoding::SignedVb,
            Predictor::HomeCoord,
            Encoding::SignedVb,
        ),
        field(
            "GPS_coord[1]",
            true,
            Predictor::HomeCoord,
            Encoding::SignedVb,
            Predictor::HomeCoord,
            Encoding::SignedVb,
        ),
        field(
            "GPS_altitude",
            false,
            Predictor::None,
            Encoding::UnsignedVb,
            Predictor::None,
            Encoding::UnsignedVb,
        ),
        field(
            "GPS_speed",
            false,
            Predictor::None,
            Encoding::UnsignedVb,
            Predictor::None,
            Encoding::UnsignedVb,
        ),
    ]
}

/// The GPS-home-frame field template: absolute lat/lon of the home point.
pub fn default_home_fields() -> Vec<FieldDef> {
    vec![
        field(
            "GPS_home[0]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::None,
            Encoding::SignedVb,
        ),
        field(
            "GPS_home[1]",
            true,
            Predictor::None,
            Encoding::SignedVb,
            Predictor::None,
            Encoding::SignedVb,
        ),
    ]
}

/// Assemble the full schema a session will declare in its header.
pub fn default_schema(config: &Config, has_servo: bool) -> Schema {
    let mut schema = Schema::default();
    schema.main = default_main_fields(config, has_servo);
    schema.gps = default_gps_fields();
    schema.home = default_home_fields();
    schema.resolve_motor0_index();
    schema
}
