//! Status bar: one row with left, center and right sections.
//!
//! Left shows the connection phase, center the live count and counters,
//! right the follow state. Sections are truncated from the right when the
//! terminal is too narrow; the left section wins.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::color::Rgb;
use crate::controller::FeedStats;
use crate::surface::{Span, Style, StyledLine};
use crate::transport::ConnectionPhase;

const BAR_BG: Rgb = Rgb::new(40, 40, 40);
const CENTER_FG: Rgb = Rgb::new(150, 150, 150);
const RIGHT_FG: Rgb = Rgb::new(100, 200, 100);

/// Everything the status bar displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Connection phase.
    pub phase: ConnectionPhase,
    /// Items on the surface.
    pub live: usize,
    /// Running totals.
    pub stats: FeedStats,
    /// Auto-scroll enabled.
    pub auto_scroll: bool,
    /// Currently following the tail.
    pub following: bool,
}

const fn phase_color(phase: ConnectionPhase) -> Rgb {
    match phase {
        ConnectionPhase::Connected => Rgb::new(100, 200, 100),
        ConnectionPhase::Connecting => Rgb::new(230, 200, 80),
        ConnectionPhase::Disconnected => Rgb::new(230, 90, 90),
    }
}

/// Build the status row for a terminal `width` columns wide.
pub fn status_line(status: &StatusSnapshot, width: u16) -> StyledLine {
    let width = usize::from(width);
    let left = format!(" ● {}", status.phase.as_str());
    let center = format!(
        "live {}  recv {}  evicted {}{}",
        status.live,
        status.stats.received,
        status.stats.evicted,
        if status.stats.filtered > 0 {
            format!("  filtered {}", status.stats.filtered)
        } else {
            String::new()
        }
    );
    let right = if !status.auto_scroll {
        "auto-scroll off ".to_string()
    } else if status.following {
        "following ".to_string()
    } else {
        "paused [End] ".to_string()
    };

    let left = truncate(&left, width);
    let mut remaining = width - left.width();
    let right = truncate(&right, remaining);
    remaining -= right.width();
    let center = truncate(&center, remaining.saturating_sub(2));

    // Center is centered in the whole row when it fits, else packed left
    let center_width = center.width();
    let ideal = width.saturating_sub(center_width) / 2;
    let lead = ideal.max(left.width() + 1).min(width - right.width() - center_width) - left.width();
    let trail = width - left.width() - lead - center_width - right.width();

    let bg = |fg: Rgb| Style {
        bg: Some(BAR_BG),
        ..Style::fg(fg)
    };
    StyledLine {
        spans: vec![
            Span::new(left, bg(phase_color(status.phase)).bold()),
            Span::new(" ".repeat(lead), bg(CENTER_FG)),
            Span::new(center, bg(CENTER_FG)),
            Span::new(" ".repeat(trail), bg(CENTER_FG)),
            Span::new(right, bg(RIGHT_FG)),
        ],
        fill: Some(BAR_BG),
    }
}

fn truncate(text: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        if used + w > max {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out
}
