// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing interface the compositor paints through.

use core::fmt;

use kurbo::{Point, Rect, Size};
use lamina_core::color::Color;
use lamina_core::filter::FilterOperations;
use lamina_core::pixels::PixelBuffer;
use lamina_core::transform::Transform3d;

/// An opaque handle to a mapper-owned texture.
///
/// Handles are assigned by the mapper and are only meaningful to the mapper
/// that created them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u64);

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({})", self.0)
    }
}

/// An alpha mask applied while drawing.
///
/// The mask texture is stretched over `rect`, which `transform` maps into
/// the bound surface. Pixels outside the mask rect are fully masked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskInput {
    /// Texture whose alpha channel scales the drawn pixels.
    pub texture: TextureId,
    /// Rect the mask covers, in the mask layer's space.
    pub rect: Rect,
    /// Mask layer space to surface space.
    pub transform: Transform3d,
}

/// Draws textured and solid quads into a bound surface.
///
/// Surfaces are textures; binding `None` selects the default target. Every
/// transform maps the drawn rect's space into the bound surface's pixel
/// space. Allocation failure is reported by [`create_texture`] returning
/// `None`; callers skip the affected content for the frame.
///
/// [`create_texture`]: Self::create_texture
pub trait TextureMapper {
    /// Allocates a cleared texture of `size`.
    fn create_texture(&mut self, size: Size, has_alpha: bool) -> Option<TextureId>;

    /// Resizes and clears `texture`.
    fn reset_texture(&mut self, texture: TextureId, size: Size, has_alpha: bool);

    /// Frees `texture`. Releasing an unknown handle is ignored.
    fn release_texture(&mut self, texture: TextureId);

    /// Size of `texture`, or `None` if the handle is unknown.
    fn texture_size(&self, texture: TextureId) -> Option<Size>;

    /// Whether `texture` was created or reset with alpha support.
    fn texture_has_alpha(&self, texture: TextureId) -> bool;

    /// Largest texture edge the mapper can allocate.
    fn max_texture_size(&self) -> Size;

    /// Copies `source_rect` of `source` into `texture` with its top-left at
    /// `target`.
    fn update_texture(
        &mut self,
        texture: TextureId,
        source: &PixelBuffer,
        source_rect: Rect,
        target: Point,
    );

    /// Makes `surface` the target of subsequent draws.
    fn bind_surface(&mut self, surface: Option<TextureId>);

    /// Draws `texture` stretched over `target_rect`.
    fn draw_texture(
        &mut self,
        texture: TextureId,
        target_rect: Rect,
        transform: &Transform3d,
        opacity: f32,
        mask: Option<&MaskInput>,
    );

    /// Fills `rect` with `color`.
    fn draw_solid_color(&mut self, rect: Rect, transform: &Transform3d, color: Color);

    /// Intersects the bound surface's clip with the transformed `rect`.
    fn begin_clip(&mut self, transform: &Transform3d, rect: Rect);

    /// Pops the clip pushed by the matching [`begin_clip`](Self::begin_clip).
    fn end_clip(&mut self);

    /// Writes `filters` applied to `source` into `target`, which has the
    /// same size. Returns `false` if nothing was written.
    fn apply_filters(
        &mut self,
        source: TextureId,
        target: TextureId,
        filters: &FilterOperations,
    ) -> bool;

    /// Called before the first draw of a frame.
    fn begin_frame(&mut self) {}

    /// Called after the last draw of a frame.
    fn end_frame(&mut self) {}
}
