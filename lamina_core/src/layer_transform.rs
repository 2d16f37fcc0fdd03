// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer transform state and its combination with the parent's.
//!
//! A layer is placed by its position, anchor point and size; its local
//! transform is applied around the anchor. [`LayerTransform::combine`]
//! produces two matrices from the parent's:
//!
//! - the *combined* transform that maps layer space to the root, used to
//!   paint the layer itself;
//! - the *combined-for-children* transform that descendants combine with.
//!   It is flattened when the layer does not preserve 3-D and includes the
//!   children (perspective) transform around the layer's center.

use kurbo::{Point, Rect, Size};

use crate::transform::Transform3d;

/// Normalized anchor point; `x` and `y` are fractions of the size, `z` is
/// in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorPoint {
    /// Fraction of the width.
    pub x: f64,
    /// Fraction of the height.
    pub y: f64,
    /// Depth offset.
    pub z: f64,
}

impl AnchorPoint {
    /// The layer center.
    pub const CENTER: Self = Self {
        x: 0.5,
        y: 0.5,
        z: 0.0,
    };

    /// Creates an anchor point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Default for AnchorPoint {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Transform inputs of one layer plus the matrices last combined from them.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerTransform {
    position: Point,
    anchor_point: AnchorPoint,
    size: Size,
    local: Transform3d,
    children_transform: Transform3d,
    bounds_origin: Point,
    flattening: bool,
    combined: Transform3d,
    combined_for_children: Transform3d,
    dirty: bool,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            anchor_point: AnchorPoint::CENTER,
            size: Size::ZERO,
            local: Transform3d::IDENTITY,
            children_transform: Transform3d::IDENTITY,
            bounds_origin: Point::ZERO,
            flattening: true,
            combined: Transform3d::IDENTITY,
            combined_for_children: Transform3d::IDENTITY,
            dirty: true,
        }
    }
}

impl LayerTransform {
    /// Sets the position of the layer's top-left corner in the parent's space.
    pub fn set_position(&mut self, position: Point) {
        if self.position != position {
            self.position = position;
            self.dirty = true;
        }
    }

    /// Sets the anchor point.
    pub fn set_anchor_point(&mut self, anchor_point: AnchorPoint) {
        if self.anchor_point != anchor_point {
            self.anchor_point = anchor_point;
            self.dirty = true;
        }
    }

    /// Sets the layer size.
    pub fn set_size(&mut self, size: Size) {
        if self.size != size {
            self.size = size;
            self.dirty = true;
        }
    }

    /// Sets the local transform applied around the anchor.
    pub fn set_local_transform(&mut self, local: Transform3d) {
        if self.local != local {
            self.local = local;
            self.dirty = true;
        }
    }

    /// Sets the transform applied to children around the layer center.
    pub fn set_children_transform(&mut self, children_transform: Transform3d) {
        if self.children_transform != children_transform {
            self.children_transform = children_transform;
            self.dirty = true;
        }
    }

    /// Sets the origin of the layer's own coordinate space; children are
    /// offset by its negation.
    pub fn set_bounds_origin(&mut self, bounds_origin: Point) {
        if self.bounds_origin != bounds_origin {
            self.bounds_origin = bounds_origin;
            self.dirty = true;
        }
    }

    /// Flattening is on for layers that do not preserve 3-D.
    pub fn set_flattening(&mut self, flattening: bool) {
        if self.flattening != flattening {
            self.flattening = flattening;
            self.dirty = true;
        }
    }

    /// Returns `true` if inputs changed since the last [`combine`](Self::combine).
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Position.
    #[must_use]
    pub const fn position(&self) -> Point {
        self.position
    }

    /// Anchor point.
    #[must_use]
    pub const fn anchor_point(&self) -> AnchorPoint {
        self.anchor_point
    }

    /// Size.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Local transform.
    #[must_use]
    pub const fn local_transform(&self) -> Transform3d {
        self.local
    }

    /// Children transform.
    #[must_use]
    pub const fn children_transform(&self) -> Transform3d {
        self.children_transform
    }

    /// The layer rect in its own space.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.size.to_rect()
    }

    /// The local transform positioned and applied around the anchor, in the
    /// parent's space.
    #[must_use]
    pub fn anchored_local(&self) -> Transform3d {
        let origin_x = self.anchor_point.x * self.size.width;
        let origin_y = self.anchor_point.y * self.size.height;
        let origin_z = self.anchor_point.z;
        Transform3d::from_translation(origin_x + self.position.x, origin_y + self.position.y, origin_z)
            * self.local
            * Transform3d::from_translation(-origin_x, -origin_y, -origin_z)
    }

    /// Recomputes both matrices from the parent's combined-for-children
    /// transform.
    pub fn combine(&mut self, parent: &Transform3d) {
        self.combined = *parent * self.anchored_local();
        let mut for_children = self.combined;
        if self.flattening {
            for_children = for_children.flatten();
        }
        if !self.children_transform.is_identity() {
            let cx = self.size.width / 2.0;
            let cy = self.size.height / 2.0;
            for_children = for_children
                * Transform3d::from_translation(cx, cy, 0.0)
                * self.children_transform
                * Transform3d::from_translation(-cx, -cy, 0.0);
        }
        if self.bounds_origin != Point::ZERO {
            for_children = for_children.pre_translate(-self.bounds_origin.x, -self.bounds_origin.y, 0.0);
        }
        self.combined_for_children = for_children;
        self.dirty = false;
    }

    /// Layer space to root space.
    #[must_use]
    pub const fn combined(&self) -> Transform3d {
        self.combined
    }

    /// The transform descendants combine with.
    #[must_use]
    pub const fn combined_for_children(&self) -> Transform3d {
        self.combined_for_children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn center_anchor_places_child() {
        let mut t = LayerTransform::default();
        t.set_size(Size::new(100.0, 100.0));
        t.set_position(Point::new(10.0, 10.0));
        t.combine(&Transform3d::IDENTITY);
        let center = t.combined().map_point(Point::new(50.0, 50.0));
        assert_eq!(center, Point::new(60.0, 60.0));
    }

    #[test]
    fn rotation_is_about_anchor() {
        let mut t = LayerTransform::default();
        t.set_size(Size::new(100.0, 100.0));
        t.set_local_transform(Transform3d::from_rotation_z(core::f64::consts::PI));
        t.combine(&Transform3d::IDENTITY);
        let center = t.combined().map_point(Point::new(50.0, 50.0));
        assert!((center.x - 50.0).abs() < EPS && (center.y - 50.0).abs() < EPS);
        let corner = t.combined().map_point(Point::ZERO);
        assert!((corner.x - 100.0).abs() < EPS && (corner.y - 100.0).abs() < EPS);
    }

    #[test]
    fn flattening_clears_depth_for_children() {
        let mut t = LayerTransform::default();
        t.set_size(Size::new(10.0, 10.0));
        t.set_local_transform(Transform3d::from_translation(0.0, 0.0, 25.0));
        t.combine(&Transform3d::IDENTITY);
        assert_eq!(t.combined().cols[3][2], 25.0);
        assert_eq!(t.combined_for_children().cols[3][2], 0.0);

        t.set_flattening(false);
        assert!(t.is_dirty());
        t.combine(&Transform3d::IDENTITY);
        assert_eq!(t.combined_for_children().cols[3][2], 25.0);
    }

    #[test]
    fn children_transform_is_about_center() {
        let mut t = LayerTransform::default();
        t.set_size(Size::new(100.0, 100.0));
        t.set_children_transform(Transform3d::from_scale(2.0, 2.0, 1.0));
        t.combine(&Transform3d::IDENTITY);
        let p = t.combined_for_children().map_point(Point::new(50.0, 50.0));
        assert_eq!(p, Point::new(50.0, 50.0));
        let q = t.combined_for_children().map_point(Point::new(60.0, 50.0));
        assert_eq!(q, Point::new(70.0, 50.0));
    }

    #[test]
    fn bounds_origin_offsets_children_only() {
        let mut t = LayerTransform::default();
        t.set_size(Size::new(100.0, 100.0));
        t.set_bounds_origin(Point::new(0.0, 30.0));
        t.combine(&Transform3d::IDENTITY);
        assert_eq!(t.combined().map_point(Point::ZERO), Point::ZERO);
        assert_eq!(
            t.combined_for_children().map_point(Point::new(0.0, 30.0)),
            Point::ZERO
        );
    }

    #[test]
    fn parent_transform_composes() {
        let mut t = LayerTransform::default();
        t.set_size(Size::new(10.0, 10.0));
        t.set_position(Point::new(5.0, 0.0));
        t.combine(&Transform3d::from_translation(100.0, 0.0, 0.0));
        assert_eq!(t.combined().map_point(Point::ZERO), Point::new(105.0, 0.0));
    }
}
