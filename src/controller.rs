//! Feed controller: turns transport output and user scrolling into
//! render buffer operations.
//!
//! Per message: format, append, follow the tail if following, then trim if
//! the append went over the hard ceiling. Per scroll: move the viewport and
//! schedule an eviction pass at the new position once scrolling has been
//! quiet for the debounce interval.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::buffer::{BufferLimits, RenderBuffer};
use crate::config::FeedConfig;
use crate::error::ConfigError;
use crate::format::{format_message, FeedNode, FormatContext};
use crate::message::{Message, MessageKind};
use crate::surface::ScrollSurface;
use crate::transport::{ConnectionPhase, TransportEvent};

/// Running totals shown in the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedStats {
    /// Messages delivered by the transport.
    pub received: u64,
    /// Messages hidden by the kind filter.
    pub filtered: u64,
    /// Items removed by eviction passes.
    pub evicted: u64,
}

/// Controller settings, usually taken from [`FeedConfig`].
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Buffer thresholds.
    pub limits: BufferLimits,
    /// Follow new messages.
    pub auto_scroll: bool,
    /// Quiet period before a scroll-triggered eviction.
    pub scroll_debounce: Duration,
    /// Kinds to show; empty shows all.
    pub kinds: Vec<MessageKind>,
    /// Formatting inputs (avatar proxy).
    pub format: FormatContext,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            limits: BufferLimits::default(),
            auto_scroll: true,
            scroll_debounce: Duration::from_millis(50),
            kinds: Vec::new(),
            format: FormatContext::default(),
        }
    }
}

impl FeedOptions {
    /// Derive options from the loaded configuration.
    pub fn from_config(config: &FeedConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            limits: config.buffer.into(),
            auto_scroll: config.feed.auto_scroll,
            scroll_debounce: config.feed.scroll_debounce(),
            kinds: config.feed.kinds.clone(),
            format: FormatContext::new(Some(config.image_proxy()?)),
        })
    }
}

/// Sequences transport events and user scrolling into the render buffer.
#[derive(Debug)]
pub struct FeedController<S> {
    buffer: RenderBuffer<S>,
    format: FormatContext,
    kinds: Vec<MessageKind>,
    auto_scroll: bool,
    following: bool,
    scroll_debounce: Duration,
    evict_due: Option<Instant>,
    page_rows: u16,
    phase: ConnectionPhase,
    stats: FeedStats,
    dirty: bool,
}

impl<S: ScrollSurface<Node = FeedNode>> FeedController<S> {
    /// Create a controller over an empty surface.
    pub fn new(surface: S, options: FeedOptions) -> Self {
        Self {
            buffer: RenderBuffer::new(surface, options.limits),
            format: options.format,
            kinds: options.kinds,
            auto_scroll: options.auto_scroll,
            following: options.auto_scroll,
            scroll_debounce: options.scroll_debounce,
            evict_due: None,
            page_rows: 1,
            phase: ConnectionPhase::Disconnected,
            stats: FeedStats::default(),
            dirty: true,
        }
    }

    /// The buffer, for drawing.
    pub const fn buffer(&self) -> &RenderBuffer<S> {
        &self.buffer
    }

    /// Last connection phase reported by the transport.
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Running totals.
    pub const fn stats(&self) -> FeedStats {
        self.stats
    }

    /// Whether auto-scroll is enabled at all.
    pub const fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    /// Whether new messages currently move the viewport.
    pub const fn following(&self) -> bool {
        self.following
    }

    /// Returns `true` once after anything visible changed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// React to one transport event.
    pub fn handle_transport(&mut self, event: TransportEvent, arrived_at: DateTime<Local>) {
        match event {
            TransportEvent::Message(message) => self.on_message(&message, arrived_at),
            TransportEvent::Phase(phase) => {
                if phase != self.phase {
                    info!(phase = phase.as_str(), "connection phase changed");
                    self.phase = phase;
                    self.dirty = true;
                }
            }
        }
    }

    /// Show one message.
    pub fn on_message(&mut self, message: &Message, arrived_at: DateTime<Local>) {
        self.stats.received += 1;
        if !self.kinds.is_empty() && !self.kinds.contains(&message.kind) {
            self.stats.filtered += 1;
            return;
        }

        let node = format_message(message, arrived_at, &self.format);
        let over_ceiling = self.buffer.append(node);
        if self.following {
            self.buffer.scroll_to_end();
        }
        if over_ceiling {
            let viewport_top = self.buffer.scroll_position();
            let evicted = self.buffer.evict_offscreen(viewport_top);
            debug!(
                evicted,
                viewport_top,
                live = self.buffer.live_count(),
                "ceiling eviction"
            );
            self.stats.evicted += evicted as u64;
        }
        self.dirty = true;
    }

    /// The user scrolled by `delta` rows.
    pub fn on_scroll(&mut self, delta: i32, now: Instant) {
        self.buffer.scroll_by(delta);
        if delta < 0 && !self.buffer.at_end() {
            self.following = false;
        } else if self.buffer.at_end() {
            self.following = self.auto_scroll;
        }
        self.after_scroll(now);
    }

    /// Scroll by whole viewport pages.
    pub fn on_page(&mut self, pages: i32, now: Instant) {
        let rows = i32::from(self.page_rows.saturating_sub(1).max(1));
        self.on_scroll(pages.saturating_mul(rows), now);
    }

    /// Jump to the oldest item.
    pub fn scroll_to_start(&mut self, now: Instant) {
        self.on_scroll(i32::MIN, now);
    }

    /// Jump to the newest item and resume following.
    pub fn scroll_to_end(&mut self, now: Instant) {
        self.buffer.scroll_to_end();
        self.following = self.auto_scroll;
        self.after_scroll(now);
    }

    /// Turn auto-scroll on or off.
    pub fn toggle_auto_scroll(&mut self, now: Instant) {
        self.auto_scroll = !self.auto_scroll;
        info!(enabled = self.auto_scroll, "auto-scroll toggled");
        if self.auto_scroll {
            self.scroll_to_end(now);
        } else {
            self.following = false;
            self.dirty = true;
        }
    }

    /// The viewport changed size.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.buffer.resize(width, height);
        self.page_rows = height;
        if self.following {
            self.buffer.scroll_to_end();
        }
        self.dirty = true;
    }

    /// Run a scroll-triggered eviction whose quiet period has passed.
    pub fn on_tick(&mut self, now: Instant) {
        if self.evict_due.is_some_and(|due| now >= due) {
            self.evict_due = None;
            self.evict_at_viewport();
        }
    }

    fn after_scroll(&mut self, now: Instant) {
        self.dirty = true;
        if self.scroll_debounce.is_zero() {
            self.evict_at_viewport();
        } else {
            self.evict_due = Some(now + self.scroll_debounce);
        }
    }

    fn evict_at_viewport(&mut self) {
        let evicted = self.buffer.evict_offscreen(self.buffer.scroll_position());
        if evicted > 0 {
            self.stats.evicted += evicted as u64;
            self.dirty = true;
        }
    }
}
