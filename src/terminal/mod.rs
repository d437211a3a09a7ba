//! Terminal output: screen setup/teardown and frame drawing.
//!
//! A frame is built completely in memory with crossterm's `queue!` and then
//! written with a single `write_all`, so the terminal never shows a half
//! drawn feed.

mod status_bar;

pub use status_bar::{status_line, StatusSnapshot};

use std::io::{self, Write};

use crossterm::style::{
    Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::{cursor, event, execute, queue, terminal};
use unicode_width::UnicodeWidthStr;

use crate::surface::{FeedView, Modifiers, StyledLine};

/// Initial capacity of the frame buffer; a full 80x24 frame with colour
/// escapes fits comfortably.
const FRAME_CAPACITY: usize = 16 * 1024;

/// Raw mode, alternate screen and mouse capture, restored on drop.
pub struct Screen {
    out: io::Stdout,
    frame: Vec<u8>,
}

impl Screen {
    /// Take over the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be switched into raw mode or
    /// the alternate screen.
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        if let Err(e) = execute!(
            out,
            terminal::EnterAlternateScreen,
            event::EnableMouseCapture,
            cursor::Hide
        ) {
            let _ = terminal::disable_raw_mode();
            return Err(e);
        }
        Ok(Self {
            out,
            frame: Vec::with_capacity(FRAME_CAPACITY),
        })
    }

    /// Current terminal size as `(width, height)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be queried.
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    /// Draw the feed and the status row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the terminal fails.
    pub fn draw(&mut self, view: &FeedView, status: &StyledLine) -> io::Result<()> {
        self.frame.clear();
        render_frame(&mut self.frame, view, status)?;
        self.out.write_all(&self.frame)?;
        self.out.flush()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = execute!(
            self.out,
            ResetColor,
            cursor::Show,
            event::DisableMouseCapture,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

/// Queue one full frame into `out`: the visible feed rows, blank rows below
/// them, and the status row at the bottom.
///
/// # Errors
///
/// Returns an error if `out` fails.
pub fn render_frame<W: Write>(out: &mut W, view: &FeedView, status: &StyledLine) -> io::Result<()> {
    let width = view.width();
    let rows = view.height();

    let mut row = 0u16;
    for line in view.visible_lines() {
        queue!(out, cursor::MoveTo(0, row))?;
        queue_line(out, line, width)?;
        row += 1;
    }
    let blank = StyledLine::default();
    while row < rows {
        queue!(out, cursor::MoveTo(0, row))?;
        queue_line(out, &blank, width)?;
        row += 1;
    }

    queue!(out, cursor::MoveTo(0, rows))?;
    queue_line(out, status, width)
}

fn queue_line<W: Write>(out: &mut W, line: &StyledLine, width: u16) -> io::Result<()> {
    for span in &line.spans {
        queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        if let Some(bg) = span.style.bg.or(line.fill) {
            queue!(out, SetBackgroundColor(bg.into()))?;
        }
        if let Some(fg) = span.style.fg {
            queue!(out, SetForegroundColor(fg.into()))?;
        }
        if span.style.modifiers.contains(Modifiers::BOLD) {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        if span.style.modifiers.contains(Modifiers::DIM) {
            queue!(out, SetAttribute(Attribute::Dim))?;
        }
        queue!(out, Print(&span.text))?;
    }

    // Pad to the full width so stale cells from the previous frame go away
    let used: usize = line.spans.iter().map(|s| s.text.width()).sum();
    let pad = usize::from(width).saturating_sub(used);
    queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
    if let Some(fill) = line.fill {
        queue!(out, SetBackgroundColor(fill.into()))?;
    }
    queue!(out, Print(" ".repeat(pad)), ResetColor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{format_message, FormatContext};
    use crate::message::{Message, MessageKind};
    use crate::surface::ScrollSurface;
    use chrono::Local;

    #[test]
    fn test_render_frame_contains_visible_rows_and_status() {
        let mut view = FeedView::new(40, 3);
        for n in 0..5 {
            let message = Message {
                kind: MessageKind::Text,
                user_name: "viewer".to_string(),
                content: format!("line {n}"),
                avatar: None,
                color: None,
                timestamp: None,
                price: None,
                platform: None,
            };
            view.append(format_message(&message, Local::now(), &FormatContext::default()));
        }
        view.scroll_to_end();

        let status = StyledLine {
            spans: vec![crate::surface::Span::new("STATUS", Default::default())],
            fill: None,
        };
        let mut out = Vec::new();
        render_frame(&mut out, &view, &status).unwrap();
        let text = String::from_utf8_lossy(&out);

        assert!(!text.contains("line 1"));
        assert!(text.contains("line 2"));
        assert!(text.contains("line 4"));
        assert!(text.contains("STATUS"));
    }
}
