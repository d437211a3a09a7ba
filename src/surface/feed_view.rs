//! Feed view: the terminal [`ScrollSurface`].
//!
//! Items are laid out once, at append time, into styled rows. Rows are
//! addressed by absolute positions that never change while the width stays
//! the same; the head item's position is the origin of the content
//! coordinates the surface reports. Removing the head only moves the origin,
//! which is what keeps the viewport anchored.

use std::collections::VecDeque;

use super::layout::{layout_node, StyledLine};
use super::{Extent, ScrollSurface};
use crate::format::FeedNode;

#[derive(Debug)]
struct LaidOutItem {
    node: FeedNode,
    top: u64,
    lines: Vec<StyledLine>,
}

impl LaidOutItem {
    fn bottom(&self) -> u64 {
        self.top + self.lines.len() as u64
    }
}

/// Scrollable list of laid-out feed items.
#[derive(Debug)]
pub struct FeedView {
    items: VecDeque<LaidOutItem>,
    /// Absolute row of the head item's top.
    origin: u64,
    /// Absolute row just past the newest item.
    end: u64,
    /// Absolute row at the top of the viewport.
    scroll_top: u64,
    width: u16,
    height: u16,
}

fn rows(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl FeedView {
    /// Create an empty view with the given viewport size.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            items: VecDeque::new(),
            origin: 0,
            end: 0,
            scroll_top: 0,
            width,
            height,
        }
    }

    /// Viewport width in columns.
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Viewport height in rows.
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Total rows of content present.
    pub fn content_height(&self) -> u64 {
        self.end - self.origin
    }

    /// Formatted node of the item at `index`.
    pub fn node(&self, index: usize) -> Option<&FeedNode> {
        self.items.get(index).map(|item| &item.node)
    }

    /// Rows currently inside the viewport, top to bottom.
    pub fn visible_lines(&self) -> impl Iterator<Item = &StyledLine> {
        let start = self.scroll_top;
        let first = self.items.partition_point(|item| item.bottom() <= start);
        let skip = self
            .items
            .get(first)
            .map_or(0, |item| start.saturating_sub(item.top));

        self.items
            .range(first..)
            .flat_map(|item| item.lines.iter())
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::from(self.height))
    }

    fn max_scroll_top(&self) -> u64 {
        self.end
            .saturating_sub(u64::from(self.height))
            .max(self.origin)
    }

    fn relayout(&mut self) {
        let mut top = self.origin;
        for item in &mut self.items {
            item.lines = layout_node(&item.node, self.width);
            item.top = top;
            top = item.bottom();
        }
        self.end = top;
    }
}

impl ScrollSurface for FeedView {
    type Node = FeedNode;

    fn append(&mut self, node: FeedNode) {
        let lines = layout_node(&node, self.width);
        let item = LaidOutItem {
            node,
            top: self.end,
            lines,
        };
        self.end = item.bottom();
        self.items.push_back(item);
    }

    fn remove_head(&mut self) -> Option<FeedNode> {
        let item = self.items.pop_front()?;
        self.origin = self.items.front().map_or(self.end, |next| next.top);
        self.scroll_top = self.scroll_top.clamp(self.origin, self.max_scroll_top());
        Some(item.node)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn extent(&self, index: usize) -> Option<Extent> {
        self.items.get(index).map(|item| {
            Extent::new(rows(item.top - self.origin), rows(item.bottom() - self.origin))
        })
    }

    fn scroll_position(&self) -> u32 {
        rows(self.scroll_top.saturating_sub(self.origin))
    }

    fn scroll_to_end(&mut self) {
        self.scroll_top = self.max_scroll_top();
    }

    fn scroll_by(&mut self, delta: i32) {
        let magnitude = u64::from(delta.unsigned_abs());
        let target = if delta < 0 {
            self.scroll_top.saturating_sub(magnitude)
        } else {
            self.scroll_top.saturating_add(magnitude)
        };
        self.scroll_top = target.clamp(self.origin, self.max_scroll_top());
    }

    fn at_end(&self) -> bool {
        self.scroll_top >= self.max_scroll_top()
    }

    fn resize(&mut self, width: u16, height: u16) {
        let was_at_end = self.at_end();
        let width_changed = width != self.width;
        self.width = width;
        self.height = height;

        if width_changed {
            // Keep the same item at the top of the viewport across the rewrap
            let anchor = self
                .items
                .partition_point(|item| item.bottom() <= self.scroll_top);
            self.relayout();
            self.scroll_top = self.items.get(anchor).map_or(self.end, |item| item.top);
        }

        if was_at_end {
            self.scroll_to_end();
        } else {
            self.scroll_top = self.scroll_top.clamp(self.origin, self.max_scroll_top());
        }
    }
}
