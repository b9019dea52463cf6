//! Control link against a real loopback TCP receiver.

use crate::harness::{Received, TestReceiver};
use sarathi::control::{ControlStateStore, ControlVector};
use sarathi::net::TcpConnector;
use sarathi::telemetry::{LinkSettings, LinkState, TelemetryLink};
use std::sync::Arc;
use std::time::Duration;

fn settings() -> LinkSettings {
    LinkSettings {
        client_id: "it-client".into(),
        send_period: Duration::from_millis(20),
        reconnect_backoff: Duration::from_millis(200),
        connect_timeout: Duration::from_millis(500),
        stop_timeout: Duration::from_millis(1500),
    }
}

fn twists(conn: &Received) -> usize {
    conn.records().iter().filter(|r| r["type"] == "twist").count()
}

#[test]
fn test_stream_lifecycle_over_tcp() {
    let receiver = TestReceiver::bind();
    let control = ControlStateStore::shared();
    control.set(ControlVector::new(0.25, 0.0, -0.1, 0.0, 3.3333, 0.0));

    let mut link = TelemetryLink::new(
        Arc::new(TcpConnector::new(receiver.addr())),
        Arc::clone(&control),
        settings(),
    );
    link.start().unwrap();

    assert!(receiver.wait_for(Duration::from_secs(5), |c| {
        c.len() == 1 && twists(&c[0]) >= 5
    }));
    assert_eq!(link.state(), LinkState::Connected);
    assert!(link.stop());

    assert!(receiver.wait_for(Duration::from_secs(2), |c| c[0].eof));
    let conn = &receiver.connections()[0];
    assert!(conn.bytes.ends_with(b"\n"));

    let records = conn.records();
    assert_eq!(records[0]["type"], "hello");
    assert_eq!(records[0]["client_id"], "it-client");
    assert_eq!(records[0]["version"], 1);

    let body = &records[1..records.len() - 1];
    for (i, twist) in body.iter().enumerate() {
        assert_eq!(twist["type"], "twist");
        assert_eq!(twist["seq"].as_u64(), Some(i as u64));
        assert_eq!(twist["vx"].as_f64(), Some(0.25));
        assert_eq!(twist["vz"].as_f64(), Some(-0.1));
        assert_eq!(twist["pitch"].as_f64(), Some(3.333));
    }

    let last = records.last().unwrap();
    assert_eq!(last["type"], "bye");
    assert_eq!(last["reason"], "app_stopped");
}

#[test]
fn test_reconnects_after_server_hangs_up() {
    let receiver = TestReceiver::bind();
    let mut link = TelemetryLink::new(
        Arc::new(TcpConnector::new(receiver.addr())),
        ControlStateStore::shared(),
        settings(),
    );
    link.start().unwrap();

    assert!(receiver.wait_for(Duration::from_secs(5), |c| {
        c.len() == 1 && twists(&c[0]) >= 3
    }));
    receiver.drop_connections();

    // The broken pipe surfaces on a later write; after the backoff a fresh
    // session starts over with hello and seq 0.
    assert!(receiver.wait_for(Duration::from_secs(10), |c| {
        c.len() >= 2 && twists(&c[1]) >= 2
    }));
    link.stop();

    let second = receiver.connections()[1].records();
    assert_eq!(second[0]["type"], "hello");
    assert_eq!(second[1]["seq"], 0);
    assert_eq!(second[2]["seq"], 1);
}

#[test]
fn test_unreachable_receiver_keeps_retrying() {
    // Reserve a port, then free it so nothing listens there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut link = TelemetryLink::new(
        Arc::new(TcpConnector::new(format!("127.0.0.1:{}", port))),
        ControlStateStore::shared(),
        settings(),
    )
    .with_status(tx);
    link.start().unwrap();

    std::thread::sleep(Duration::from_millis(700));
    assert_ne!(link.state(), LinkState::Connected);
    assert!(link.stop());

    let failures = rx
        .try_iter()
        .filter(|s| matches!(s, sarathi::telemetry::LinkStatus::ConnectFailed { .. }))
        .count();
    assert!(failures >= 2, "only {} failures", failures);
}
