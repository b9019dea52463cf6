//! Record-then-upload against a real loopback TCP receiver.

use crate::harness::{FrameMicrophone, TestReceiver};
use sarathi::audio::{AudioCapture, AudioTransfer, TransferOutcome};
use sarathi::config::{AudioConfig, SarathiConfig};
use sarathi::console::OperatorCommand;
use sarathi::net::TcpConnector;
use sarathi::{Operator, Reply};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn audio_config() -> AudioConfig {
    AudioConfig {
        frame_bytes: 320,
        ..AudioConfig::default()
    }
}

fn wait_take_drained(capture: &AudioCapture, bytes: usize) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while capture.captured_bytes() < bytes && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_three_frames_arrive_as_one_payload() {
    let receiver = TestReceiver::bind();
    let mic = FrameMicrophone {
        frames: 3,
        frame_len: 320,
    };
    let mut capture = AudioCapture::new(Arc::new(mic), &audio_config());

    capture.start().unwrap();
    wait_take_drained(&capture, 960);
    let take = capture.stop().unwrap();
    assert_eq!(take.len(), 960);

    let transfer = AudioTransfer::new(
        Arc::new(TcpConnector::new(receiver.addr())),
        Duration::from_secs(1),
    );
    let outcome = transfer.spawn(take).unwrap().join();
    assert_eq!(outcome, TransferOutcome::Sent { bytes: 960 });

    assert!(receiver.wait_for(Duration::from_secs(2), |c| c.len() == 1 && c[0].eof));
    let payload = &receiver.connections()[0].bytes;
    assert_eq!(payload.len(), 960);
    let expected: Vec<u8> = (0..960u32).map(|i| (i % 256) as u8).collect();
    assert_eq!(payload, &expected);
}

#[test]
fn test_upload_without_receiver_fails_once() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let transfer = AudioTransfer::new(
        Arc::new(TcpConnector::new(format!("127.0.0.1:{}", port))),
        Duration::from_millis(500),
    );

    let outcome = transfer.spawn(vec![0u8; 640].into()).unwrap().join();
    assert!(matches!(outcome, TransferOutcome::Failed { .. }));
}

#[test]
fn test_operator_session_end_to_end() {
    let control_rx = TestReceiver::bind();
    let audio_rx = TestReceiver::bind();

    let mut config = SarathiConfig::default();
    config.audio = audio_config();
    config.telemetry.send_period_ms = 20;
    config.telemetry.client_id = "it-operator".into();

    let mut op = Operator::new(
        &config,
        Arc::new(TcpConnector::new(control_rx.addr())),
        Arc::new(TcpConnector::new(audio_rx.addr())),
        Arc::new(FrameMicrophone {
            frames: 3,
            frame_len: 320,
        }),
    );
    op.start().unwrap();

    op.handle(OperatorCommand::Planar { x: 1.0, y: 0.0 }).unwrap();
    assert!(control_rx.wait_for(Duration::from_secs(5), |c| {
        c.len() == 1
            && c[0]
                .records()
                .iter()
                .any(|r| r["type"] == "twist" && r["vx"].as_f64() == Some(0.5))
    }));

    op.handle(OperatorCommand::Record).unwrap();
    thread::sleep(Duration::from_millis(100));
    let reply = op.handle(OperatorCommand::Send).unwrap();
    assert_eq!(reply, Reply::Text("uploading 960 bytes".into()));

    assert!(audio_rx.wait_for(Duration::from_secs(3), |c| c.len() == 1 && c[0].eof));
    assert_eq!(audio_rx.connections()[0].bytes.len(), 960);

    op.shutdown();
    assert!(control_rx.wait_for(Duration::from_secs(2), |c| c[0].eof));
    let records = control_rx.connections()[0].records();
    assert_eq!(records[0]["client_id"], "it-operator");
    assert_eq!(records.last().unwrap()["reason"], "app_stopped");
}
