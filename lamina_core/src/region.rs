// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Accumulated invalidation for a layer's contents.

use alloc::vec::Vec;

use kurbo::Rect;

/// Rects above this count are coalesced into their bounding box.
const MAX_RECTS: usize = 8;

fn contains(outer: Rect, inner: Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1
}

/// Pending repaint area for one layer.
///
/// Either the whole layer is invalid, or a short list of rectangles in layer
/// coordinates is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DamageRegion {
    full: bool,
    rects: Vec<Rect>,
}

impl DamageRegion {
    /// An empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            full: false,
            rects: Vec::new(),
        }
    }

    /// A region covering the whole layer.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            full: true,
            rects: Vec::new(),
        }
    }

    /// Returns `true` if nothing is invalid.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.full && self.rects.is_empty()
    }

    /// Returns `true` if the whole layer is invalid.
    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.full
    }

    /// Marks the whole layer invalid.
    pub fn invalidate_all(&mut self) {
        self.full = true;
        self.rects.clear();
    }

    /// Adds `rect` to the region. Empty rects are ignored.
    pub fn add(&mut self, rect: Rect) {
        if self.full || rect.is_zero_area() {
            return;
        }
        if self.rects.iter().any(|r| contains(*r, rect)) {
            return;
        }
        self.rects.retain(|r| !contains(rect, *r));
        self.rects.push(rect);
        if self.rects.len() > MAX_RECTS {
            let bounds = self.bounds();
            self.rects.clear();
            if let Some(b) = bounds {
                self.rects.push(b);
            }
        }
    }

    /// Bounding box of the listed rects (ignores the full flag).
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        self.rects.iter().copied().reduce(|a, b| a.union(b))
    }

    /// Resolves the region into concrete rects clipped to `layer_bounds`.
    #[must_use]
    pub fn resolve(&self, layer_bounds: Rect) -> Vec<Rect> {
        if self.full {
            if layer_bounds.is_zero_area() {
                return Vec::new();
            }
            return alloc::vec![layer_bounds];
        }
        self.rects
            .iter()
            .map(|r| r.intersect(layer_bounds))
            .filter(|r| !r.is_zero_area())
            .collect()
    }

    /// Returns the region and leaves `self` empty.
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contained_rects_are_dropped() {
        let mut d = DamageRegion::new();
        d.add(Rect::new(0.0, 0.0, 10.0, 10.0));
        d.add(Rect::new(2.0, 2.0, 4.0, 4.0));
        assert_eq!(d.resolve(Rect::new(0.0, 0.0, 100.0, 100.0)).len(), 1);
        d.add(Rect::new(-5.0, -5.0, 20.0, 20.0));
        let rects = d.resolve(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(rects, alloc::vec![Rect::new(0.0, 0.0, 20.0, 20.0)]);
    }

    #[test]
    fn many_rects_coalesce() {
        let mut d = DamageRegion::new();
        for i in 0..10 {
            let x = f64::from(i) * 10.0;
            d.add(Rect::new(x, 0.0, x + 5.0, 5.0));
        }
        assert_eq!(
            d.resolve(Rect::new(0.0, 0.0, 1000.0, 1000.0)),
            alloc::vec![Rect::new(0.0, 0.0, 95.0, 5.0)]
        );
    }

    #[test]
    fn full_resolves_to_bounds() {
        let mut d = DamageRegion::new();
        d.add(Rect::new(1.0, 1.0, 2.0, 2.0));
        d.invalidate_all();
        let b = Rect::new(0.0, 0.0, 50.0, 40.0);
        assert_eq!(d.resolve(b), alloc::vec![b]);
        assert!(d.take().is_full());
        assert!(d.is_empty());
    }
}
