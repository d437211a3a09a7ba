//! Line layout: turns a [`FeedNode`] into wrapped, styled terminal lines.

use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::color::Rgb;
use crate::format::{FeedNode, NodeFlags};

/// Columns taken by `HH:MM `; wrapped lines are indented by this much.
const GUTTER: usize = 6;

const TIMESTAMP_FG: Rgb = Rgb::new(0x90, 0x90, 0x90);
const BODY_FG: Rgb = Rgb::new(0xDD, 0xDD, 0xDD);
const NAME_FG: Rgb = Rgb::new(0xAA, 0xAA, 0xAA);
const GIFT_FG: Rgb = Rgb::new(0xFF, 0x8A, 0xC8);
const SUBSCRIBE_FG: Rgb = Rgb::new(0x6B, 0xE3, 0x8C);

bitflags! {
    /// Text style modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Bold text
        const BOLD = 0b0000_0001;
        /// Dim/faint text
        const DIM = 0b0000_0010;
    }
}

/// Colours and modifiers of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    /// Foreground colour; `None` keeps the terminal default.
    pub fg: Option<Rgb>,
    /// Background colour; `None` uses the line fill.
    pub bg: Option<Rgb>,
    /// Modifiers.
    pub modifiers: Modifiers,
}

impl Style {
    /// Style with a foreground colour.
    pub const fn fg(fg: Rgb) -> Self {
        Self {
            fg: Some(fg),
            bg: None,
            modifiers: Modifiers::empty(),
        }
    }

    /// Add bold.
    #[must_use]
    pub const fn bold(mut self) -> Self {
        self.modifiers = self.modifiers.union(Modifiers::BOLD);
        self
    }
}

/// A run of text with one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Text content.
    pub text: String,
    /// Style of the whole run.
    pub style: Style,
}

impl Span {
    /// Create a span.
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// One terminal row of an item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledLine {
    /// Spans, left to right.
    pub spans: Vec<Span>,
    /// Background of the whole row (paid messages).
    pub fill: Option<Rgb>,
}

impl StyledLine {
    /// Plain text of the row.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Display width of the row.
    pub fn width(&self) -> usize {
        self.spans.iter().map(|s| s.text.width()).sum()
    }
}

/// Lay out `node` for a viewport `width` columns wide. Always at least one line.
pub fn layout_node(node: &FeedNode, width: u16) -> Vec<StyledLine> {
    let width = usize::from(width).max(GUTTER + 1);

    if let Some(level) = node.funding {
        let fill = Some(level.header_color());
        let mut header = header_spans(node);
        if let Some(price) = node.price {
            header.push(Span::new(" ", Style::default()));
            header.push(Span::new(price.text(), Style::fg(Rgb::GOLD).bold()));
        }
        let mut lines = wrap(header, width, fill);
        if !node.body.is_empty() {
            let indent = " ".repeat(GUTTER);
            let body = vec![
                Span::new(indent, Style::default()),
                Span::new(node.body.clone(), Style::fg(Rgb::WHITE)),
            ];
            lines.extend(wrap(body, width, fill));
        }
        return lines;
    }

    let mut spans = header_spans(node);
    spans.push(Span::new(" ", Style::default()));
    if node.flags.contains(NodeFlags::GIFT) {
        spans.push(Span::new("❖ ", Style::fg(GIFT_FG)));
    } else if node.flags.contains(NodeFlags::SUBSCRIBE) {
        spans.push(Span::new("★ ", Style::fg(SUBSCRIBE_FG)));
    }
    spans.push(Span::new(node.body.clone(), Style::fg(BODY_FG)));
    if let Some(price) = node.price {
        spans.push(Span::new(" ", Style::default()));
        spans.push(Span::new(price.text(), Style::fg(Rgb::GOLD)));
    }
    wrap(spans, width, None)
}

// timestamp, avatar glyph, author chip
fn header_spans(node: &FeedNode) -> Vec<Span> {
    let author = &node.author;
    let mut name_style = Style::fg(author.color.unwrap_or(NAME_FG));
    if author.emphasized {
        name_style = name_style.bold();
    }
    let avatar_fg = author.color.unwrap_or(Rgb::PLACEHOLDER);

    let mut spans = vec![
        Span::new(format!("{:<5} ", node.timestamp), Style::fg(TIMESTAMP_FG)),
        Span::new(node.avatar.glyph().to_string(), Style::fg(avatar_fg).bold()),
        Span::new(" ", Style::default()),
        Span::new(author.name.clone(), name_style),
    ];
    if let Some(platform) = &author.platform {
        spans.push(Span::new(
            format!(" [{platform}]"),
            Style {
                modifiers: Modifiers::DIM,
                ..Style::fg(TIMESTAMP_FG)
            },
        ));
    }
    spans
}

/// Greedy grapheme wrap; continuation rows start at the gutter.
fn wrap(spans: Vec<Span>, width: usize, fill: Option<Rgb>) -> Vec<StyledLine> {
    let mut lines = Vec::new();
    let mut current = StyledLine {
        spans: Vec::new(),
        fill,
    };
    let mut col = 0usize;

    for span in spans {
        let mut run = String::new();
        for grapheme in span.text.graphemes(true) {
            // Control characters would break the row grid
            let grapheme = if grapheme.chars().any(char::is_control) {
                " "
            } else {
                grapheme
            };
            let w = grapheme.width();
            if col + w > width && col > GUTTER {
                if !run.is_empty() {
                    current.spans.push(Span::new(std::mem::take(&mut run), span.style));
                }
                lines.push(std::mem::replace(
                    &mut current,
                    StyledLine {
                        spans: vec![Span::new(" ".repeat(GUTTER), Style::default())],
                        fill,
                    },
                ));
                col = GUTTER;
            }
            run.push_str(grapheme);
            col += w;
        }
        if !run.is_empty() {
            current.spans.push(Span::new(run, span.style));
        }
    }

    lines.push(current);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{format_message, FormatContext};
    use crate::message::{Message, MessageKind};
    use chrono::Local;

    fn node(kind: MessageKind, content: &str, price: Option<f64>) -> FeedNode {
        let message = Message {
            kind,
            user_name: "alice".to_string(),
            content: content.to_string(),
            avatar: None,
            color: None,
            timestamp: None,
            price,
            platform: None,
        };
        format_message(&message, Local::now(), &FormatContext::default())
    }

    #[test]
    fn test_short_message_is_one_line() {
        let lines = layout_node(&node(MessageKind::Text, "hello", None), 80);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text().ends_with("alice hello"));
    }

    #[test]
    fn test_long_message_wraps_within_width() {
        let body = "word ".repeat(40);
        let lines = layout_node(&node(MessageKind::Text, &body, None), 40);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width() <= 40, "line too wide: {:?}", line.text());
        }
        assert!(lines[1].text().starts_with("      "));
    }

    #[test]
    fn test_wide_characters_wrap_by_display_width() {
        let lines = layout_node(&node(MessageKind::Text, &"弹幕".repeat(30), None), 30);
        for line in &lines {
            assert!(line.width() <= 30);
        }
    }

    #[test]
    fn test_superchat_has_header_and_filled_body() {
        let lines = layout_node(&node(MessageKind::SuperChat, "thanks", Some(75.0)), 80);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].text().contains("¥75.00"));
        assert!(lines[1].text().contains("thanks"));
        assert!(lines.iter().all(|l| l.fill.is_some()));
    }

    #[test]
    fn test_gift_marker_and_price() {
        let lines = layout_node(&node(MessageKind::Gift, "rocket x1", Some(9.9)), 80);
        let text = lines[0].text();
        assert!(text.contains("❖ rocket x1"));
        assert!(text.ends_with("¥9.90"));
    }

    #[test]
    fn test_control_characters_are_flattened() {
        let lines = layout_node(&node(MessageKind::Text, "a\nb\tc", None), 80);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text().ends_with("a b c"));
    }
}
