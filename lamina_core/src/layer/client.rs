// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The callback interface between a layer tree and the code that owns it.

use kurbo::{Point, Rect};

use super::id::LayerId;
use crate::color::Color;
use crate::pixels::PixelBuffer;

/// Which parts of the owner's content a layer paints.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaintingPhases(u8);

impl PaintingPhases {
    /// Backgrounds and borders.
    pub const BACKGROUND: Self = Self(1 << 0);
    /// Foreground content.
    pub const FOREGROUND: Self = Self(1 << 1);
    /// Mask images.
    pub const MASK: Self = Self(1 << 2);

    /// No phase.
    pub const NONE: Self = Self(0);

    /// Returns `true` if every phase of `other` is included.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if no phase is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for PaintingPhases {
    fn default() -> Self {
        Self::BACKGROUND.union(Self::FOREGROUND)
    }
}

impl core::fmt::Debug for PaintingPhases {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut list = f.debug_list();
        if self.contains(Self::BACKGROUND) {
            list.entry(&"background");
        }
        if self.contains(Self::FOREGROUND) {
            list.entry(&"foreground");
        }
        if self.contains(Self::MASK) {
            list.entry(&"mask");
        }
        list.finish()
    }
}

/// A pixel target handed to [`LayerClient::paint_contents`].
///
/// The buffer's top-left pixel corresponds to `origin` in layer space.
/// Drawing helpers take layer-space rects and clip them to the dirty rect.
#[derive(Debug)]
pub struct PaintContext<'a> {
    buffer: &'a mut PixelBuffer,
    origin: Point,
    dirty_rect: Rect,
    phases: PaintingPhases,
}

impl<'a> PaintContext<'a> {
    /// Wraps `buffer`, whose top-left pixel is at `origin` in layer space.
    pub fn new(
        buffer: &'a mut PixelBuffer,
        origin: Point,
        dirty_rect: Rect,
        phases: PaintingPhases,
    ) -> Self {
        Self {
            buffer,
            origin,
            dirty_rect,
            phases,
        }
    }

    /// The layer-space rect that must be repainted.
    #[must_use]
    pub const fn dirty_rect(&self) -> Rect {
        self.dirty_rect
    }

    /// The phases the layer paints.
    #[must_use]
    pub const fn phases(&self) -> PaintingPhases {
        self.phases
    }

    /// Layer-space position of the buffer's top-left pixel.
    #[must_use]
    pub const fn origin(&self) -> Point {
        self.origin
    }

    /// Direct access to the pixels.
    pub fn buffer_mut(&mut self) -> &mut PixelBuffer {
        self.buffer
    }

    /// Fills a layer-space rect, replacing existing pixels.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let clipped = rect.intersect(self.dirty_rect);
        if clipped.is_zero_area() {
            return;
        }
        let local = clipped - self.origin.to_vec2();
        self.buffer.fill_rect(local, color);
    }

    /// Blends `color` over a layer-space rect.
    pub fn blend_rect(&mut self, rect: Rect, color: Color) {
        let clipped = rect.intersect(self.dirty_rect);
        if clipped.is_zero_area() {
            return;
        }
        let local = clipped - self.origin.to_vec2();
        self.buffer.blend_rect(local, color);
    }
}

/// Receives notifications from a [`LayerTree`](super::LayerTree) and paints
/// layer contents on request.
///
/// All methods have default no-op implementations.
pub trait LayerClient {
    /// A layer changed and the tree should be flushed soon.
    fn notify_flush_required(&mut self, layer: LayerId) {
        _ = layer;
    }

    /// A layer changed and its state must be pushed across the sync boundary.
    fn notify_sync_required(&mut self, layer: LayerId) {
        _ = layer;
    }

    /// An animation added to `layer` started at `time`.
    fn notify_animation_started(&mut self, layer: LayerId, time: f64) {
        _ = (layer, time);
    }

    /// Paints `layer`'s content for the context's dirty rect.
    fn paint_contents(&mut self, layer: LayerId, context: &mut PaintContext<'_>) {
        _ = (layer, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phases_skip_mask() {
        let phases = PaintingPhases::default();
        assert!(phases.contains(PaintingPhases::BACKGROUND));
        assert!(phases.contains(PaintingPhases::FOREGROUND));
        assert!(!phases.contains(PaintingPhases::MASK));
    }

    #[test]
    fn fill_is_clipped_to_dirty_rect() {
        let mut buffer = PixelBuffer::new(10, 10);
        let mut ctx = PaintContext::new(
            &mut buffer,
            Point::new(100.0, 100.0),
            Rect::new(100.0, 100.0, 105.0, 110.0),
            PaintingPhases::default(),
        );
        ctx.fill_rect(Rect::new(0.0, 0.0, 1000.0, 1000.0), Color::WHITE);
        assert_eq!(buffer.get(4, 9), Color::WHITE.premultiply());
        assert!(buffer.get(5, 0).a == 0);
    }
}
