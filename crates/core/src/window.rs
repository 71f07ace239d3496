//! Index arithmetic for rendering a long transaction list through a fixed-height viewport.
//!
//! Everything here is a pure function of its inputs so it can run on every scroll or
//! resize event without touching a rendering surface.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Half-open range `[start, end)` of rows that must be materialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRange {
    pub start: usize,
    pub end: usize,
}

impl WindowRange {
    pub const EMPTY: WindowRange = WindowRange { start: 0, end: 0 };

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The part of `items` covered by this window, clamped to the slice length.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let end = self.end.min(items.len());
        let start = self.start.min(end);
        &items[start..end]
    }
}

/// Viewport geometry for one scroll or resize tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub total: usize,
    pub container_height: f64,
    pub row_height: f64,
    pub scroll_top: f64,
    pub overscan: usize,
}

impl Viewport {
    pub fn window(&self) -> WindowRange {
        compute_window(
            self.total,
            self.container_height,
            self.row_height,
            self.scroll_top,
            self.overscan,
        )
    }

    pub fn top_offset(&self) -> f64 {
        let start = self.window().start;
        top_offset(i64::try_from(start).unwrap_or(i64::MAX), self.row_height)
    }
}

/// Minimal contiguous range of rows to render, widened by `overscan` rows on each side.
///
/// Degenerate geometry (no rows, zero or negative heights, NaN) yields an empty range.
pub fn compute_window(
    total: usize,
    container_height: f64,
    row_height: f64,
    scroll_top: f64,
    overscan: usize,
) -> WindowRange {
    let usable = |h: f64| h.is_finite() && h > 0.0;
    if total == 0 || !usable(container_height) || !usable(row_height) {
        return WindowRange::EMPTY;
    }

    let scroll_top = if scroll_top.is_finite() { scroll_top.max(0.0) } else { 0.0 };

    // Float to usize casts saturate.
    let first_visible = (scroll_top / row_height).floor() as usize;
    let start = first_visible.saturating_sub(overscan);

    let visible = ((container_height / row_height).ceil() as usize)
        .saturating_add(overscan.saturating_mul(2));
    let end = start.saturating_add(visible).min(total);

    WindowRange {
        start: start.min(end),
        end,
    }
}

/// Pixel offset at which the rendered slice starts, accounting for the rows above it.
pub fn top_offset(start: i64, row_height: f64) -> f64 {
    let row_height = if row_height.is_finite() { row_height.max(0.0) } else { 0.0 };
    start.max(0) as f64 * row_height
}
