//! Render buffer: the bounded, ordered set of items on the feed surface.
//!
//! The buffer owns the [`ScrollSurface`] and is the only code that mutates
//! it, so the live count is always exactly the number of items present.
//! Growth is unbounded between eviction passes; a pass only removes items
//! from the head, and only those that have scrolled fully out of view plus
//! a margin.

use tracing::trace;

use crate::config::BufferConfig;
use crate::surface::ScrollSurface;

/// Size thresholds of a [`RenderBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    /// Count an eviction pass trims down to.
    pub soft_max: usize,
    /// Count above which an append triggers an eviction pass.
    pub hard_ceiling: usize,
    /// Rows past the top of the viewport an item must be before it may go.
    pub margin: u32,
}

impl Default for BufferLimits {
    fn default() -> Self {
        BufferConfig::default().into()
    }
}

impl From<BufferConfig> for BufferLimits {
    fn from(config: BufferConfig) -> Self {
        Self {
            soft_max: config.soft_max,
            hard_ceiling: config.hard_ceiling,
            margin: config.evict_margin_rows,
        }
    }
}

/// Ordered collection of rendered items backing a scroll surface.
#[derive(Debug)]
pub struct RenderBuffer<S> {
    surface: S,
    live_count: usize,
    limits: BufferLimits,
}

impl<S: ScrollSurface> RenderBuffer<S> {
    /// Wrap an empty surface.
    pub fn new(surface: S, limits: BufferLimits) -> Self {
        let live_count = surface.len();
        Self {
            surface,
            live_count,
            limits,
        }
    }

    /// Items currently on the surface.
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// Configured thresholds.
    pub const fn limits(&self) -> BufferLimits {
        self.limits
    }

    /// Read access to the surface, for drawing.
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Whether the live count is above the hard ceiling.
    pub const fn over_ceiling(&self) -> bool {
        self.live_count > self.limits.hard_ceiling
    }

    /// Add an item at the tail.
    ///
    /// Never rejects. Returns `true` when the count is now above the hard
    /// ceiling, in which case the caller runs [`evict_offscreen`] once the
    /// viewport has settled.
    ///
    /// [`evict_offscreen`]: Self::evict_offscreen
    pub fn append(&mut self, node: S::Node) -> bool {
        self.surface.append(node);
        self.live_count += 1;
        self.check_consistency();
        self.over_ceiling()
    }

    /// Trim items that are fully above `viewport_top` by at least the margin.
    ///
    /// Walks from the head and stops at the first item still inside the
    /// viewport or margin, or once the count is down to the soft maximum.
    /// Eligibility is decided against the single `viewport_top` snapshot
    /// before anything is removed, so a pass is never affected by its own
    /// removals. Returns the number of items evicted.
    pub fn evict_offscreen(&mut self, viewport_top: u32) -> usize {
        let excess = self.live_count.saturating_sub(self.limits.soft_max);
        let eligible = (0..excess)
            .take_while(|&index| {
                self.surface.extent(index).is_some_and(|extent| {
                    extent.bottom.saturating_add(self.limits.margin) <= viewport_top
                })
            })
            .count();

        for _ in 0..eligible {
            if self.surface.remove_head().is_none() {
                break;
            }
            self.live_count -= 1;
        }
        self.check_consistency();

        if eligible > 0 {
            trace!(eligible, live = self.live_count, "evicted offscreen items");
        }
        eligible
    }

    /// Move the viewport to the newest item.
    pub fn scroll_to_end(&mut self) {
        self.surface.scroll_to_end();
    }

    /// Move the viewport by `delta` rows.
    pub fn scroll_by(&mut self, delta: i32) {
        self.surface.scroll_by(delta);
    }

    /// Top row of the viewport.
    pub fn scroll_position(&self) -> u32 {
        self.surface.scroll_position()
    }

    /// Whether the viewport shows the newest content.
    pub fn at_end(&self) -> bool {
        self.surface.at_end()
    }

    /// Forward a viewport size change to the surface.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.surface.resize(width, height);
    }

    fn check_consistency(&self) {
        debug_assert_eq!(
            self.live_count,
            self.surface.len(),
            "live count diverged from surface"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Extent;
    use std::collections::VecDeque;

    /// Surface of fixed-height items with a `height`-row viewport.
    struct RowSurface {
        heights: VecDeque<u32>,
        scroll_top: u32,
        height: u32,
    }

    impl RowSurface {
        fn new(height: u32) -> Self {
            Self {
                heights: VecDeque::new(),
                scroll_top: 0,
                height,
            }
        }

        fn content(&self) -> u32 {
            self.heights.iter().sum()
        }

        fn max_top(&self) -> u32 {
            self.content().saturating_sub(self.height)
        }
    }

    impl ScrollSurface for RowSurface {
        type Node = u32;

        fn append(&mut self, node: u32) {
            self.heights.push_back(node);
        }

        fn remove_head(&mut self) -> Option<u32> {
            let removed = self.heights.pop_front()?;
            self.scroll_top = self.scroll_top.saturating_sub(removed).min(self.max_top());
            Some(removed)
        }

        fn len(&self) -> usize {
            self.heights.len()
        }

        fn extent(&self, index: usize) -> Option<Extent> {
            let height = *self.heights.get(index)?;
            let top: u32 = self.heights.iter().take(index).sum();
            Some(Extent::new(top, top + height))
        }

        fn scroll_position(&self) -> u32 {
            self.scroll_top
        }

        fn scroll_to_end(&mut self) {
            self.scroll_top = self.max_top();
        }

        fn scroll_by(&mut self, delta: i32) {
            let top = i64::from(self.scroll_top) + i64::from(delta);
            self.scroll_top = u32::try_from(top.max(0)).unwrap().min(self.max_top());
        }

        fn at_end(&self) -> bool {
            self.scroll_top >= self.max_top()
        }

        fn resize(&mut self, _width: u16, height: u16) {
            self.height = u32::from(height);
        }
    }

    fn limits(soft_max: usize, hard_ceiling: usize, margin: u32) -> BufferLimits {
        BufferLimits {
            soft_max,
            hard_ceiling,
            margin,
        }
    }

    #[test]
    fn test_appends_without_eviction_count_exactly() {
        let mut buffer = RenderBuffer::new(RowSurface::new(10), limits(100, 120, 5));
        for n in 1..=120 {
            assert!(!buffer.append(1));
            assert_eq!(buffer.live_count(), n);
        }
        assert!(buffer.append(1));
        assert_eq!(buffer.surface().len(), 121);
    }

    #[test]
    fn test_ceiling_pass_trims_to_soft_max() {
        let mut buffer = RenderBuffer::new(RowSurface::new(10), limits(100, 120, 5));
        for n in 1..=150 {
            let over = buffer.append(1);
            buffer.scroll_to_end();
            if over {
                buffer.evict_offscreen(buffer.scroll_position());
            }
            if n == 121 {
                assert!(buffer.live_count() <= 100);
            }
            assert!(buffer.live_count() <= 120);
        }
    }

    #[test]
    fn test_never_evicts_visible_or_margin_items() {
        let mut buffer = RenderBuffer::new(RowSurface::new(5), limits(0, 1000, 3));
        for _ in 0..20 {
            buffer.append(2);
        }
        // Items occupy rows [0,2), [2,4), ... Viewport starts at row 10
        buffer.scroll_by(10);
        let evicted = buffer.evict_offscreen(buffer.scroll_position());

        // Eligible: bottom + 3 <= 10, i.e. bottoms 2, 4 and 6
        assert_eq!(evicted, 3);
        assert_eq!(buffer.live_count(), 17);
        assert_eq!(buffer.scroll_position(), 4);
        let first = buffer.surface().extent(0).unwrap();
        assert!(first.bottom + 3 > buffer.scroll_position());
    }

    #[test]
    fn test_margin_boundary_needs_full_margin_of_clear_rows() {
        let mut surface = RowSurface::new(4);
        for height in [3, 20] {
            surface.append(height);
        }
        let mut buffer = RenderBuffer::new(surface, limits(0, 100, 5));

        // Last row of the head item is row 2; rows 3..7 are only four rows
        assert_eq!(buffer.evict_offscreen(7), 0);
        // Rows 3..8 are the full five-row margin
        assert_eq!(buffer.evict_offscreen(8), 1);
        assert_eq!(buffer.live_count(), 1);
    }

    #[test]
    fn test_walk_stops_at_first_ineligible_item() {
        let mut surface = RowSurface::new(4);
        // A tall head item that is still partly on screen shields the
        // short items behind it.
        for height in [30, 1, 1, 1, 1] {
            surface.append(height);
        }
        let mut buffer = RenderBuffer::new(surface, limits(0, 100, 0));
        assert_eq!(buffer.evict_offscreen(29), 0);
        assert_eq!(buffer.live_count(), 5);

        assert_eq!(buffer.evict_offscreen(32), 3);
        assert_eq!(buffer.live_count(), 2);
    }

    #[test]
    fn test_stops_at_soft_max() {
        let mut surface = RowSurface::new(2);
        for _ in 0..50 {
            surface.append(1);
        }
        let mut buffer = RenderBuffer::new(surface, limits(40, 45, 0));
        assert_eq!(buffer.evict_offscreen(48), 10);
        assert_eq!(buffer.live_count(), 40);

        // At the target already: nothing more goes
        assert_eq!(buffer.evict_offscreen(38), 0);
    }

    #[test]
    fn test_unscrolled_buffer_cannot_be_trimmed() {
        let mut buffer = RenderBuffer::new(RowSurface::new(10), limits(5, 8, 5));
        for _ in 0..20 {
            if buffer.append(1) {
                buffer.evict_offscreen(buffer.scroll_position());
            }
        }
        assert_eq!(buffer.scroll_position(), 0);
        assert_eq!(buffer.live_count(), 20);
    }
}
