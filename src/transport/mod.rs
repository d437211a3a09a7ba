//! Transport: the resilient message stream from the relay.
//!
//! [`TransportClient`] is a small state machine over a [`Connector`]. It
//! decodes frames into [`Message`]s, and on any failure or close it drops
//! back to [`ConnectionPhase::Disconnected`] and schedules exactly one
//! retry, with a delay that doubles from a floor up to a ceiling.
//!
//! The client never touches the feed surface. Everything it produces goes
//! out as [`TransportEvent`]s over a channel; the worker thread that drives
//! it lives in [`TransportActor`].

mod actor;
mod ws;

pub use actor::TransportActor;
pub use ws::{WsChannel, WsConnector};

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{DecodeError, TransportError};
use crate::message::Message;

/// How often an idle, disconnected worker re-checks for shutdown.
const IDLE_SLICE: Duration = Duration::from_millis(50);

/// Connection state as seen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionPhase {
    /// No connection; a retry may be pending.
    #[default]
    Disconnected,
    /// Opening a connection.
    Connecting,
    /// Connected and receiving.
    Connected,
}

impl ConnectionPhase {
    /// Lowercase label for display.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    /// Start at `floor`, never exceed `ceiling`.
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Delay the next retry will use.
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Take the current delay and double it for next time.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        delay
    }

    /// Back to the floor after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

/// One frame read from an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text payload.
    Text(String),
    /// A binary payload.
    Binary(Vec<u8>),
    /// The peer closed the stream.
    Close,
}

/// An open, readable connection.
pub trait Channel {
    /// Read the next frame.
    ///
    /// `Ok(None)` means nothing arrived within the channel's read timeout.
    fn recv(&mut self) -> Result<Option<Frame>, TransportError>;
}

/// Opens [`Channel`]s to an endpoint.
pub trait Connector {
    /// Channel type produced.
    type Channel: Channel;

    /// Open a connection to `endpoint`.
    fn open(&mut self, endpoint: &Url) -> Result<Self::Channel, TransportError>;
}

/// What the transport reports downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A decoded message, in arrival order.
    Message(Message),
    /// The connection phase changed.
    Phase(ConnectionPhase),
}

/// Reconnecting stream client.
pub struct TransportClient<C: Connector> {
    connector: C,
    endpoint: Url,
    phase: ConnectionPhase,
    backoff: Backoff,
    channel: Option<C::Channel>,
    retry_at: Option<Instant>,
    events: Sender<TransportEvent>,
    consumer_gone: bool,
}

impl<C: Connector> TransportClient<C> {
    /// Create a disconnected client. Nothing happens until [`connect`](Self::connect).
    pub fn new(
        connector: C,
        endpoint: Url,
        backoff: Backoff,
        events: Sender<TransportEvent>,
    ) -> Self {
        Self {
            connector,
            endpoint,
            phase: ConnectionPhase::Disconnected,
            backoff,
            channel: None,
            retry_at: None,
            events,
            consumer_gone: false,
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Backoff state.
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// When the pending retry fires, if one is scheduled.
    pub const fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Whether the receiving side of the event channel is gone.
    pub const fn consumer_gone(&self) -> bool {
        self.consumer_gone
    }

    /// Open a connection unless one is already open or opening.
    ///
    /// A pending retry is consumed by this call.
    pub fn connect(&mut self, now: Instant) {
        if self.phase != ConnectionPhase::Disconnected {
            return;
        }
        self.retry_at = None;
        self.set_phase(ConnectionPhase::Connecting);
        debug!(endpoint = %self.endpoint, "connecting");

        match self.connector.open(&self.endpoint) {
            Ok(channel) => {
                self.channel = Some(channel);
                self.backoff.reset();
                info!(endpoint = %self.endpoint, "connected");
                self.set_phase(ConnectionPhase::Connected);
            }
            Err(e) => {
                warn!(error = %e, "connection attempt failed");
                self.on_terminate(now);
            }
        }
    }

    /// Handle one raw frame from the open channel.
    pub fn on_message(&mut self, frame: Frame, now: Instant) {
        let decoded = match frame {
            Frame::Text(text) => Message::decode(&text),
            Frame::Binary(bytes) => Message::decode_bytes(&bytes),
            Frame::Close => {
                info!("stream closed by relay");
                self.on_terminate(now);
                return;
            }
        };

        match decoded {
            Ok(message) => self.emit(TransportEvent::Message(message)),
            Err(e) => log_dropped(&e),
        }
    }

    /// The connection failed or closed: go back to disconnected and
    /// schedule a retry.
    pub fn on_terminate(&mut self, now: Instant) {
        self.channel = None;
        if self.phase != ConnectionPhase::Disconnected {
            self.set_phase(ConnectionPhase::Disconnected);
        }
        if self.retry_at.is_none() {
            let delay = self.backoff.next_delay();
            self.retry_at = Some(now + delay);
            info!(delay_ms = delay.as_millis(), "reconnect scheduled");
        }
    }

    /// Fire the pending retry once its deadline has passed.
    pub fn poll(&mut self, now: Instant) {
        if self.retry_at.is_some_and(|deadline| now >= deadline) {
            self.connect(now);
        }
    }

    /// Read at most one frame from the open channel.
    pub fn pump(&mut self, now: Instant) {
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        match channel.recv() {
            Ok(Some(frame)) => self.on_message(frame, now),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "stream failed");
                self.on_terminate(now);
            }
        }
    }

    /// Drive the client until `shutdown` is set or the consumer goes away.
    pub fn run(mut self, shutdown: &AtomicBool) {
        self.connect(Instant::now());

        while !shutdown.load(Ordering::Relaxed) && !self.consumer_gone {
            if self.channel.is_some() {
                self.pump(Instant::now());
                continue;
            }

            let now = Instant::now();
            match self.retry_at {
                Some(deadline) if now < deadline => {
                    thread::sleep((deadline - now).min(IDLE_SLICE));
                }
                Some(_) => self.poll(now),
                None => self.connect(now),
            }
        }
        debug!("transport loop finished");
    }

    fn set_phase(&mut self, phase: ConnectionPhase) {
        self.phase = phase;
        self.emit(TransportEvent::Phase(phase));
    }

    fn emit(&mut self, event: TransportEvent) {
        if self.events.send(event).is_err() && !self.consumer_gone {
            debug!("event receiver dropped");
            self.consumer_gone = true;
        }
    }
}

fn log_dropped(error: &DecodeError) {
    warn!(error = %error, "dropping malformed message");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use crossbeam_channel::{unbounded, Receiver};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Scripted connection outcomes; each open pops one.
    #[derive(Clone, Default)]
    struct FakeConnector {
        script: Rc<RefCell<VecDeque<Result<Vec<Frame>, ()>>>>,
        opens: Rc<RefCell<usize>>,
    }

    struct FakeChannel {
        frames: VecDeque<Frame>,
    }

    impl Channel for FakeChannel {
        fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
            match self.frames.pop_front() {
                Some(frame) => Ok(Some(frame)),
                None => Err(TransportError::Closed),
            }
        }
    }

    impl Connector for FakeConnector {
        type Channel = FakeChannel;

        fn open(&mut self, _endpoint: &Url) -> Result<FakeChannel, TransportError> {
            *self.opens.borrow_mut() += 1;
            match self.script.borrow_mut().pop_front() {
                Some(Ok(frames)) => Ok(FakeChannel {
                    frames: frames.into(),
                }),
                _ => Err(TransportError::Closed),
            }
        }
    }

    fn client(
        script: Vec<Result<Vec<Frame>, ()>>,
    ) -> (TransportClient<FakeConnector>, FakeConnector, Receiver<TransportEvent>) {
        let connector = FakeConnector::default();
        connector.script.borrow_mut().extend(script);
        let (tx, rx) = unbounded();
        let client = TransportClient::new(
            connector.clone(),
            Url::parse("ws://relay.test/ws").unwrap(),
            Backoff::default(),
            tx,
        );
        (client, connector, rx)
    }

    fn messages(rx: &Receiver<TransportEvent>) -> Vec<Message> {
        rx.try_iter()
            .filter_map(|event| match event {
                TransportEvent::Message(m) => Some(m),
                TransportEvent::Phase(_) => None,
            })
            .collect()
    }

    fn text(json: &str) -> Frame {
        Frame::Text(json.to_string())
    }

    #[test]
    fn test_backoff_sequence_doubles_and_caps() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(1));
    }

    #[test]
    fn test_repeated_failures_schedule_growing_retries() {
        let (mut client, connector, _rx) = client(vec![]);
        let mut now = Instant::now();
        let mut waits = Vec::new();

        client.connect(now);
        for _ in 0..7 {
            assert_eq!(client.phase(), ConnectionPhase::Disconnected);
            let deadline = client.retry_deadline().unwrap();
            waits.push((deadline - now).as_secs());
            now = deadline;
            client.poll(now);
        }

        assert_eq!(waits, vec![1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(*connector.opens.borrow(), 8);
    }

    #[test]
    fn test_success_resets_backoff() {
        let (mut client, _connector, rx) = client(vec![Err(()), Err(()), Err(()), Ok(vec![])]);
        let mut now = Instant::now();

        client.connect(now);
        while client.phase() != ConnectionPhase::Connected {
            now = client.retry_deadline().unwrap();
            client.poll(now);
        }
        assert_eq!(client.backoff().current(), Duration::from_secs(1));
        assert_eq!(client.retry_deadline(), None);

        let phases: Vec<ConnectionPhase> = rx
            .try_iter()
            .filter_map(|event| match event {
                TransportEvent::Phase(p) => Some(p),
                TransportEvent::Message(_) => None,
            })
            .collect();
        assert_eq!(phases.last(), Some(&ConnectionPhase::Connected));
    }

    #[test]
    fn test_malformed_frame_is_dropped_without_disconnect() {
        let (mut client, _connector, rx) = client(vec![Ok(vec![
            text(r#"{"type":"text","userName":"a","content":"one"}"#),
            text("{not json"),
            text(r#"{"type":"superchat","userName":"b","content":"no price"}"#),
            text(r#"{"type":"gift","userName":"c","content":"two","price":5}"#),
        ])]);
        let now = Instant::now();

        client.connect(now);
        for _ in 0..4 {
            client.pump(now);
            assert_eq!(client.phase(), ConnectionPhase::Connected);
        }

        let received = messages(&rx);
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].content, "one");
        assert_eq!(received[1].kind, MessageKind::Gift);
    }

    #[test]
    fn test_close_frame_terminates_and_schedules_retry() {
        let (mut client, _connector, _rx) = client(vec![Ok(vec![Frame::Close])]);
        let now = Instant::now();

        client.connect(now);
        client.pump(now);
        assert_eq!(client.phase(), ConnectionPhase::Disconnected);
        assert_eq!(client.retry_deadline(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_connect_is_idempotent_while_connected() {
        let (mut client, connector, _rx) = client(vec![Ok(vec![])]);
        let now = Instant::now();

        client.connect(now);
        client.connect(now);
        client.connect(now);
        assert_eq!(*connector.opens.borrow(), 1);
        assert_eq!(client.phase(), ConnectionPhase::Connected);
    }

    #[test]
    fn test_only_one_retry_is_ever_pending() {
        let (mut client, _connector, _rx) = client(vec![]);
        let now = Instant::now();

        client.connect(now);
        let first = client.retry_deadline().unwrap();

        // A second termination while a retry is pending does not add another
        client.on_terminate(now + Duration::from_millis(10));
        assert_eq!(client.retry_deadline(), Some(first));
        assert_eq!(client.backoff().current(), Duration::from_secs(2));

        // An early poll does nothing
        client.poll(now);
        assert_eq!(client.retry_deadline(), Some(first));
    }

    #[test]
    fn test_binary_utf8_frames_are_decoded() {
        let payload = br#"{"type":"chat","userName":"a","content":"bin"}"#.to_vec();
        let (mut client, _connector, rx) = client(vec![Ok(vec![Frame::Binary(payload)])]);
        let now = Instant::now();

        client.connect(now);
        client.pump(now);
        let received = messages(&rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].content, "bin");
    }

    #[test]
    fn test_dropped_receiver_ends_run() {
        let (client, _connector, rx) = client(vec![Ok(vec![])]);
        drop(rx);
        let shutdown = AtomicBool::new(false);
        // Returns instead of retrying forever
        client.run(&shutdown);
    }
}
