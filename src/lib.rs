//! # danmaku
//!
//! A terminal viewer for live-stream chat ("danmaku") relayed over a
//! websocket.
//!
//! The feed is meant to run unattended for hours while messages arrive in
//! bursts, so two pieces carry the weight:
//!
//! - **Transport**: a reconnecting client that never gives up. Failures and
//!   closes lead to one scheduled retry with capped exponential backoff;
//!   malformed payloads are dropped one at a time.
//! - **Render buffer**: a bounded list of rendered items that only evicts
//!   what the user has already scrolled past, oldest first, trimming to a
//!   soft maximum.
//!
//! Everything else (formatting, layout, drawing) is a pure function from a
//! [`Message`] to lines on the screen.
//!
//! ## Example
//!
//! ```rust,ignore
//! use danmaku::{FeedController, FeedOptions, FeedView, Message};
//!
//! let mut feed = FeedController::new(FeedView::new(80, 23), FeedOptions::default());
//! let message = Message::decode(r#"{"type":"text","userName":"a","content":"hi"}"#)?;
//! feed.on_message(&message, chrono::Local::now());
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod app;
pub mod buffer;
pub mod color;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod logging;
pub mod message;
pub mod surface;
pub mod terminal;
pub mod transport;

// Re-exports for convenience
pub use buffer::{BufferLimits, RenderBuffer};
pub use color::Rgb;
pub use config::FeedConfig;
pub use controller::{FeedController, FeedOptions, FeedStats};
pub use error::{ConfigError, DecodeError, LogError, TransportError};
pub use format::{format_message, FeedNode, FormatContext, FundingLevel};
pub use message::{Message, MessageKind};
pub use surface::{Extent, FeedView, ScrollSurface};
pub use transport::{Backoff, ConnectionPhase, TransportClient, TransportEvent};
