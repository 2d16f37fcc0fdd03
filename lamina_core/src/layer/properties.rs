// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property groups stored per layer.

use alloc::string::String;
use alloc::sync::Arc;

use kurbo::{Point, Rect, Size};

use super::client::PaintingPhases;
use crate::color::Color;
use crate::filter::FilterOperations;
use crate::layer_transform::AnchorPoint;
use crate::pixels::PixelBuffer;
use crate::transform::Transform3d;

/// Boolean rendering flags of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerFlags {
    /// The content covers every pixel of the layer with opaque color.
    pub contents_opaque: bool,
    /// The layer is drawn when facing away from the viewer.
    pub backface_visible: bool,
    /// Descendants are clipped to the layer bounds.
    pub masks_to_bounds: bool,
    /// The owner paints content into this layer.
    pub draws_content: bool,
    /// Painted, solid-color and image contents are shown.
    pub contents_visible: bool,
    /// Descendants keep their depth instead of being flattened.
    pub preserves_3d: bool,
    /// The layer does not scroll with its ancestors.
    pub fixed_to_viewport: bool,
}

impl Default for LayerFlags {
    fn default() -> Self {
        Self {
            contents_opaque: false,
            backface_visible: true,
            masks_to_bounds: false,
            draws_content: false,
            contents_visible: true,
            preserves_3d: false,
            fixed_to_viewport: false,
        }
    }
}

/// Placement and transform inputs of a layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerGeometry {
    /// Top-left corner in the parent's space.
    pub position: Point,
    /// Pivot for `transform`.
    pub anchor_point: AnchorPoint,
    /// Layer size.
    pub size: Size,
    /// Origin of the layer's own coordinate space.
    pub bounds_origin: Point,
    /// Transform applied around the anchor point.
    pub transform: Transform3d,
    /// Transform applied to children around the layer center.
    pub children_transform: Transform3d,
    /// Where solid-color or image contents are drawn, in layer space.
    pub contents_rect: Rect,
    /// Device scale of painted content.
    pub contents_scale: f64,
}

impl Default for LayerGeometry {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            anchor_point: AnchorPoint::CENTER,
            size: Size::ZERO,
            bounds_origin: Point::ZERO,
            transform: Transform3d::IDENTITY,
            children_transform: Transform3d::IDENTITY,
            contents_rect: Rect::ZERO,
            contents_scale: 1.0,
        }
    }
}

/// A decoded image shown directly by a layer.
///
/// Two images are equal when their keys are; the key identifies the image
/// across the sync boundary.
#[derive(Clone, Debug)]
pub struct LayerImage {
    /// Caller-chosen identity of the image.
    pub key: u64,
    /// Decoded pixels.
    pub pixels: Arc<PixelBuffer>,
}

impl LayerImage {
    /// Creates an image.
    #[must_use]
    pub fn new(key: u64, pixels: PixelBuffer) -> Self {
        Self {
            key,
            pixels: Arc::new(pixels),
        }
    }
}

impl PartialEq for LayerImage {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// Contents drawn by the layer in place of (or in addition to) painted
/// content.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LayerContents {
    /// Nothing beyond painted content.
    #[default]
    None,
    /// A solid color filling the contents rect.
    SolidColor(Color),
    /// An image scaled into the contents rect.
    Image(LayerImage),
}

/// Whether [`set_needs_display_in_rect`](super::LayerTree::set_needs_display_in_rect)
/// clips the rect to the layer bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayClip {
    /// Intersect with the layer bounds.
    #[default]
    ClipToLayer,
    /// Keep the rect as given.
    DoNotClip,
}

/// Snapshot of a layer's scalar state, as pushed across the sync boundary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerState {
    /// Debug name.
    pub name: String,
    /// Placement and transforms.
    pub geometry: LayerGeometry,
    /// Opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Background color.
    pub background_color: Color,
    /// Rendering flags.
    pub flags: LayerFlags,
    /// Filter chain.
    pub filters: FilterOperations,
    /// Painting phases.
    pub painting_phases: PaintingPhases,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_compare_by_key() {
        let a = LayerImage::new(7, PixelBuffer::new(1, 1));
        let b = LayerImage::new(7, PixelBuffer::new(2, 2));
        assert_eq!(LayerContents::Image(a), LayerContents::Image(b));
    }

    #[test]
    fn default_flags_are_visible() {
        let flags = LayerFlags::default();
        assert!(flags.backface_visible);
        assert!(flags.contents_visible);
        assert!(!flags.draws_content);
    }
}
