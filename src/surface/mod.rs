//! Rendering surface: the scrollable, ordered item list the feed draws into.
//!
//! The surface is a collaborator of [`RenderBuffer`](crate::buffer::RenderBuffer):
//! the buffer decides *what* is on the surface, the surface knows *where*
//! every item is. Geometry is reported in content rows, with row 0 at the top
//! of the oldest item still present.
//!
//! [`FeedView`] is the terminal implementation.

mod feed_view;
mod layout;

pub use feed_view::FeedView;
pub use layout::{layout_node, Modifiers, Span, Style, StyledLine};

/// Vertical extent of one item in content rows. `bottom` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    /// First row of the item.
    pub top: u32,
    /// Row just past the item.
    pub bottom: u32,
}

impl Extent {
    /// Create an extent.
    pub const fn new(top: u32, bottom: u32) -> Self {
        Self { top, bottom }
    }

    /// Height in rows.
    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// An appendable, head-removable, scrollable list of rendered nodes.
///
/// Items are kept in append order, which is also their top-to-bottom order.
/// Removing the head keeps the viewport anchored on the same content: every
/// remaining extent and the scroll position shift up by the removed height.
pub trait ScrollSurface {
    /// What the surface stores per item.
    type Node;

    /// Add a node after the newest item.
    fn append(&mut self, node: Self::Node);

    /// Remove and return the oldest item.
    fn remove_head(&mut self) -> Option<Self::Node>;

    /// Number of items present.
    fn len(&self) -> usize;

    /// Whether no items are present.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extent of the item at `index` (0 = oldest).
    fn extent(&self, index: usize) -> Option<Extent>;

    /// Content row shown at the top of the viewport.
    fn scroll_position(&self) -> u32;

    /// Move the viewport so the newest item is fully visible.
    fn scroll_to_end(&mut self);

    /// Move the viewport by `delta` rows (negative = towards older items).
    fn scroll_by(&mut self, delta: i32);

    /// Whether the viewport shows the end of the content.
    fn at_end(&self) -> bool;

    /// The viewport changed size.
    fn resize(&mut self, width: u16, height: u16);
}
