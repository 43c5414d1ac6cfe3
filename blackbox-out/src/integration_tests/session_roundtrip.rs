use std::io::Write;

use crate::settings::DefaultWriteSettings;
use crate::{BlackboxWriter, GpsSample, ProducerSample};
use blackbox_core::Config;

fn drive_to_running(writer: &mut BlackboxWriter<DefaultWriteSettings>, transport: &mut Vec<u8>) {
    writer.enable();
    writer.start();
    let idle = ProducerSample {
        iteration: 0,
        ..Default::default()
    };
    while !writer.is_running() {
        writer.tick(transport, &idle);
    }
}

fn sample(iteration: u32, gps: Option<GpsSample>) -> ProducerSample {
    ProducerSample {
        iteration,
        time: iteration * 2000,
        rc_command: [5, -5, 0, 1200],
        gyro: [1, -2, 3],
        acc_smooth: [10, -20, 30],
        motor: vec![1200, 1210, 1220, 1230],
        servo: None,
        gps,
    }
}

#[test]
fn a_recorded_session_decodes_back_to_the_same_samples() {
    let mut writer = BlackboxWriter::with_default_schema(DefaultWriteSettings::new(Config::default(), 128));
    let mut transport = Vec::new();
    drive_to_running(&mut writer, &mut transport);

    let home = GpsSample {
        num_sat: 7,
        lat: 473_000_000,
        lon: 85_200_000,
        altitude: 400,
        speed: 0,
    };
    writer.tick(&mut transport, &sample(0, Some(home)));
    for iteration in 1..40 {
        writer.tick(&mut transport, &sample(iteration, None));
    }
    writer.finish();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&transport).unwrap();
    file.flush().unwrap();

    let log = blackbox_in::FlightLog::open(file.path().to_str().unwrap()).unwrap();
    assert_eq!(log.log_count(), 1);

    let mut main_frames = Vec::new();
    let mut gps_frames = Vec::new();
    let mut home_frames = Vec::new();
    let stats = log
        .parse(
            0,
            |schema, _config| {
                assert!(schema.main.iter().any(|f| f.name == "loopIteration"));
                assert!(schema.main.iter().any(|f| f.name == "motor[3]"));
            },
            |frame| {
                assert!(frame.valid, "no broken frames expected on a clean synthetic session");
                match frame.frame_type {
                    blackbox_in::FrameType::Intra | blackbox_in::FrameType::Inter => {
                        main_frames.push(frame.values)
                    }
                    blackbox_in::FrameType::Gps => gps_frames.push(frame.values),
                    blackbox_in::FrameType::GpsHome => home_frames.push(frame.values),
                }
            },
            |_event| {},
        )
        .unwrap();

    assert_eq!(main_frames.len(), 40);
    assert_eq!(stats.num_i_frames, 2); // iteration 0 and iteration 32 (default I interval)
    assert_eq!(stats.num_p_frames, 38);
    assert_eq!(stats.num_broken_frames, 0);

    let first = &main_frames[0];
    assert_eq!(first[0], 0); // loopIteration
    assert_eq!(first[1], 0); // time
    assert_eq!(&first[2..6], &[5, -5, 0, 1200]); // rcCommand
    assert_eq!(&first[6..9], &[1, -2, 3]); // gyroData
    assert_eq!(&first[9..12], &[10, -20, 30]); // accSmooth
    assert_eq!(&first[12..16], &[1200, 1210, 1220, 1230]); // motor[0..4]

    let last = main_frames.last().unwrap();
    assert_eq!(last[0], 39);
    assert_eq!(last[1], 39 * 2000);

    assert_eq!(home_frames.len(), 1);
    assert_eq!(home_frames[0], vec![473_000_000, 85_200_000]);

    assert_eq!(gps_frames.len(), 1);
    assert_eq!(gps_frames[0], vec![7, 473_000_000, 85_200_000, 400, 0]);
}

#[test]
fn a_second_gps_fix_away_from_home_only_sends_a_lone_g_frame() {
    let mut writer = BlackboxWriter::with_default_schema(DefaultWriteSettings::new(Config::default(), 128));
    let mut transport = Vec::new();
    drive_to_running(&mut writer, &mut transport);

    let home = GpsSample {
        num_sat: 6,
        lat: 1_000_000,
        lon: 2_000_000,
        altitude: 10,
        speed: 0,
    };
    writer.tick(&mut transport, &sample(0, Some(home)));

    let moved = GpsSample {
        lat: 1_000_050,
        ..home
    };
    writer.tick(&mut transport, &sample(1, Some(moved)));
    writer.finish();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&transport).unwrap();
    file.flush().unwrap();

    let log = blackbox_in::FlightLog::open(file.path().to_str().unwrap()).unwrap();
    let mut gps_frames = Vec::new();
    let mut home_frames = Vec::new();
    log.parse(
        0,
        |_, _| {},
        |frame| match frame.frame_type {
            blackbox_in::FrameType::Gps => gps_frames.push(frame.values),
            blackbox_in::FrameType::GpsHome => home_frames.push(frame.values),
            _ => {}
        },
        |_| {},
    )
    .unwrap();

    assert_eq!(home_frames.len(), 1, "home did not move, so only the first fix should register it");
    assert_eq!(gps_frames.len(), 2);
    assert_eq!(gps_frames[1][1], 1_000_050);
}
