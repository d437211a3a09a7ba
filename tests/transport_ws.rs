//! End-to-end transport test against a local websocket relay.

use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use danmaku::transport::{Backoff, ConnectionPhase, TransportActor, TransportEvent, WsConnector};
use tungstenite::Message as WsMessage;
use url::Url;

fn frame(user: &str, content: &str) -> WsMessage {
    WsMessage::Text(format!(
        r#"{{"type":"text","userName":"{user}","content":"{content}","timestamp":1700000000000}}"#
    ))
}

fn collect_until(rx: &Receiver<TransportEvent>, messages: usize) -> Vec<TransportEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    let mut seen = 0;
    while seen < messages {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = rx
            .recv_timeout(remaining)
            .expect("timed out waiting for transport events");
        if matches!(event, TransportEvent::Message(_)) {
            seen += 1;
        }
        events.push(event);
    }
    events
}

#[test]
fn test_reconnects_after_close_and_skips_malformed_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let relay = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        ws.send(frame("alice", "one")).unwrap();
        ws.send(WsMessage::Text("{not json".to_string())).unwrap();
        ws.send(frame("bob", "two")).unwrap();
        ws.close(None).unwrap();
        while ws.read().is_ok() {}

        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        ws.send(frame("carol", "three")).unwrap();
        while ws.read().is_ok() {}
    });

    let (tx, rx) = unbounded();
    let actor = TransportActor::spawn(
        WsConnector::new(Duration::from_millis(50)),
        Url::parse(&format!("ws://{addr}/ws")).unwrap(),
        Backoff::new(Duration::from_millis(20), Duration::from_millis(200)),
        tx,
    )
    .unwrap();

    let events = collect_until(&rx, 3);
    actor.join();
    relay.join().unwrap();

    let contents: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            TransportEvent::Message(m) => Some(m.content.as_str()),
            TransportEvent::Phase(_) => None,
        })
        .collect();
    assert_eq!(contents, vec!["one", "two", "three"]);

    let phases: Vec<ConnectionPhase> = events
        .iter()
        .filter_map(|event| match event {
            TransportEvent::Phase(p) => Some(*p),
            TransportEvent::Message(_) => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            ConnectionPhase::Connecting,
            ConnectionPhase::Connected,
            ConnectionPhase::Disconnected,
            ConnectionPhase::Connecting,
            ConnectionPhase::Connected,
        ]
    );
}

#[test]
fn test_unreachable_relay_keeps_retrying() {
    // Bind then drop to get a port nothing listens on
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let (tx, rx) = unbounded();
    let actor = TransportActor::spawn(
        WsConnector::new(Duration::from_millis(50)),
        Url::parse(&format!("ws://{addr}/ws")).unwrap(),
        Backoff::new(Duration::from_millis(10), Duration::from_millis(40)),
        tx,
    )
    .unwrap();

    let mut attempts = 0;
    let deadline = Instant::now() + Duration::from_secs(5);
    while attempts < 3 && Instant::now() < deadline {
        if let Ok(TransportEvent::Phase(ConnectionPhase::Connecting)) =
            rx.recv_timeout(Duration::from_millis(500))
        {
            attempts += 1;
        }
    }
    actor.join();

    assert!(attempts >= 3, "only {attempts} connection attempts");
}
