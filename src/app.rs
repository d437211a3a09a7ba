//! The main loop: one thread, one event at a time.
//!
//! Transport events, terminal input and frame ticks arrive on channels and
//! are handled in whatever order `select!` yields them. Each handler runs to
//! completion before the next event is looked at, so append, scroll and
//! eviction never interleave. Drawing happens on ticks, and only when
//! something changed.

use std::time::{Duration, Instant};

use anyhow::Context as _;
use chrono::Local;
use crossbeam_channel::{bounded, select, tick};
use tracing::{info, warn};

use crate::actor::{InputActor, InputEvent, KeyCode};
use crate::config::FeedConfig;
use crate::controller::{FeedController, FeedOptions};
use crate::format::FeedNode;
use crate::surface::{FeedView, ScrollSurface};
use crate::terminal::{status_line, Screen, StatusSnapshot};
use crate::transport::{Backoff, TransportActor, WsConnector};

const INPUT_POLL: Duration = Duration::from_millis(50);
const EVENT_QUEUE: usize = 1024;

/// Whether the loop keeps going after an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep running.
    Continue,
    /// Leave the main loop.
    Quit,
}

/// Rows left for the feed once the status bar has its row.
const fn feed_rows(height: u16) -> u16 {
    if height > 1 {
        height - 1
    } else {
        1
    }
}

/// Run the feed in the current terminal until the user quits.
///
/// # Errors
///
/// Fails if the configuration does not yield a usable endpoint, the
/// terminal cannot be set up or drawn to, or a worker thread cannot start.
pub fn run(config: &FeedConfig) -> anyhow::Result<()> {
    let endpoint = config.endpoint()?;
    let options = FeedOptions::from_config(config)?;
    let (width, height) = Screen::size().context("failed to query terminal size")?;
    let mut feed = FeedController::new(FeedView::new(width, feed_rows(height)), options);

    let mut screen = Screen::enter().context("failed to set up the terminal")?;

    let (input_tx, input_rx) = bounded(64);
    let input = InputActor::spawn(input_tx, INPUT_POLL).context("failed to start input thread")?;

    let (event_tx, event_rx) = bounded(EVENT_QUEUE);
    let transport = TransportActor::spawn(
        WsConnector::new(config.transport.read_timeout()),
        endpoint.clone(),
        Backoff::new(config.transport.backoff_floor(), config.transport.backoff_ceiling()),
        event_tx,
    )
    .context("failed to start transport thread")?;
    let ticker = tick(config.feed.tick_interval());

    info!(%endpoint, width, height, "feed started");

    let result = 'main: loop {
        select! {
            recv(event_rx) -> event => match event {
                Ok(event) => feed.handle_transport(event, Local::now()),
                Err(_) => {
                    warn!("transport worker stopped");
                    break 'main Ok(());
                }
            },
            recv(input_rx) -> event => {
                let flow = event.map_or(Flow::Quit, |event| {
                    handle_input(&mut feed, event, Instant::now())
                });
                if flow == Flow::Quit {
                    break 'main Ok(());
                }
            },
            recv(ticker) -> now => {
                feed.on_tick(now.unwrap_or_else(|_| Instant::now()));
                if feed.take_dirty() {
                    let status = status_line(&snapshot(&feed), width_of(&feed));
                    if let Err(e) = screen.draw(feed.buffer().surface(), &status) {
                        break 'main Err(anyhow::Error::new(e).context("failed to draw frame"));
                    }
                }
            },
        }
    };

    // The transport may be blocked in a connect; signal it and let the
    // process exit reap it.
    transport.shutdown();
    input.join();
    drop(screen);

    let stats = feed.stats();
    info!(
        received = stats.received,
        evicted = stats.evicted,
        filtered = stats.filtered,
        "feed stopped"
    );
    result
}

fn width_of(feed: &FeedController<FeedView>) -> u16 {
    feed.buffer().surface().width()
}

fn snapshot<S: ScrollSurface<Node = FeedNode>>(feed: &FeedController<S>) -> StatusSnapshot {
    StatusSnapshot {
        phase: feed.phase(),
        live: feed.buffer().live_count(),
        stats: feed.stats(),
        auto_scroll: feed.auto_scroll(),
        following: feed.following(),
    }
}

/// Apply one input event to the feed.
pub fn handle_input<S>(feed: &mut FeedController<S>, event: InputEvent, now: Instant) -> Flow
where
    S: ScrollSurface<Node = FeedNode>,
{
    match event {
        InputEvent::Key { code, modifiers } => match code {
            KeyCode::Char('c') if modifiers.control => return Flow::Quit,
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('a') => feed.toggle_auto_scroll(now),
            KeyCode::Up | KeyCode::Char('k') => feed.on_scroll(-1, now),
            KeyCode::Down | KeyCode::Char('j') => feed.on_scroll(1, now),
            KeyCode::PageUp => feed.on_page(-1, now),
            KeyCode::PageDown | KeyCode::Char(' ') => feed.on_page(1, now),
            KeyCode::Home | KeyCode::Char('g') => feed.scroll_to_start(now),
            KeyCode::End | KeyCode::Char('G') => feed.scroll_to_end(now),
            KeyCode::Char(_) => {}
        },
        InputEvent::Scroll { delta } => feed.on_scroll(delta, now),
        InputEvent::Resize { width, height } => feed.resize(width, feed_rows(height)),
        InputEvent::Error(message) => warn!(%message, "terminal input error"),
        InputEvent::Shutdown => return Flow::Quit,
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::KeyModifiers;
    use crate::message::{Message, MessageKind};

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn filled_feed() -> FeedController<FeedView> {
        let mut feed = FeedController::new(FeedView::new(80, 10), FeedOptions::default());
        feed.resize(80, 10);
        for n in 0..40 {
            let message = Message {
                kind: MessageKind::Text,
                user_name: "viewer".to_string(),
                content: format!("hello {n}"),
                avatar: None,
                color: None,
                timestamp: None,
                price: None,
                platform: None,
            };
            feed.on_message(&message, Local::now());
        }
        feed
    }

    #[test]
    fn test_quit_keys() {
        let mut feed = filled_feed();
        let now = Instant::now();
        assert_eq!(handle_input(&mut feed, key(KeyCode::Char('q')), now), Flow::Quit);
        assert_eq!(handle_input(&mut feed, key(KeyCode::Esc), now), Flow::Quit);
        let ctrl_c = InputEvent::Key {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
        };
        assert_eq!(handle_input(&mut feed, ctrl_c, now), Flow::Quit);
        assert_eq!(handle_input(&mut feed, key(KeyCode::Char('c')), now), Flow::Continue);
    }

    #[test]
    fn test_paging_moves_by_viewport() {
        let mut feed = filled_feed();
        let now = Instant::now();
        let bottom = feed.buffer().scroll_position();

        handle_input(&mut feed, key(KeyCode::PageUp), now);
        assert_eq!(feed.buffer().scroll_position(), bottom - 9);
        assert!(!feed.following());

        handle_input(&mut feed, key(KeyCode::End), now);
        assert_eq!(feed.buffer().scroll_position(), bottom);
        assert!(feed.following());
    }

    #[test]
    fn test_resize_reserves_status_row() {
        let mut feed = filled_feed();
        handle_input(
            &mut feed,
            InputEvent::Resize {
                width: 100,
                height: 21,
            },
            Instant::now(),
        );
        assert_eq!(feed.buffer().surface().height(), 20);
        assert_eq!(feed.buffer().surface().width(), 100);
        assert!(feed.buffer().at_end());
    }

    #[test]
    fn test_feed_rows_never_zero() {
        assert_eq!(feed_rows(0), 1);
        assert_eq!(feed_rows(1), 1);
        assert_eq!(feed_rows(24), 23);
    }
}
