//! Actors: the threads that feed the main loop.
//!
//! Each actor owns one blocking source and forwards what it sees over a
//! crossbeam channel; the main loop `select!`s over all of them and is the
//! only place feed state changes.
//!
//! ```text
//! ┌──────────────────┐   InputEvent
//! │   Input Thread   │ ──────────────┐
//! └──────────────────┘               ▼
//!                              ┌───────────┐
//!                      tick    │ Main Loop │──▶ RenderBuffer ──▶ screen
//!                   ─────────▶ │           │
//!                              └───────────┘
//! ┌──────────────────┐               ▲
//! │ Transport Thread │ ──────────────┘
//! └──────────────────┘  TransportEvent
//! ```

mod input;
mod messages;

pub use input::InputActor;
pub use messages::{InputEvent, KeyCode, KeyModifiers};
