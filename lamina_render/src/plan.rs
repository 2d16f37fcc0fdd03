// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plan: the ordered draw commands of one frame, as recorded by a
//! [`RecordingTextureMapper`].
//!
//! The recording mapper allocates no pixels. It tracks texture sizes so the
//! compositor behaves exactly as with a real mapper, and can be given a
//! texture budget to exercise the exhaustion path.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use kurbo::{Point, Rect, Size};
use lamina_core::color::Color;
use lamina_core::filter::FilterOperations;
use lamina_core::pixels::PixelBuffer;
use lamina_core::transform::Transform3d;

use crate::texture::{MaskInput, TextureId, TextureMapper};

/// What a [`RenderItem`] draws.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawSource {
    /// A texture stretched over the item's rect.
    Texture(TextureId),
    /// A solid fill.
    SolidColor(Color),
}

/// A single draw command in the render plan.
///
/// Items are recorded in paint order (back to front within each surface).
#[derive(Clone, Debug, PartialEq)]
pub struct RenderItem {
    /// What is drawn.
    pub source: DrawSource,
    /// The surface drawn into; `None` is the default target.
    pub surface: Option<TextureId>,
    /// Rect in the source's space.
    pub rect: Rect,
    /// Source space to surface space.
    pub transform: Transform3d,
    /// Opacity (0.0–1.0, accumulated from ancestors).
    pub opacity: f32,
    /// Mask texture, if any.
    pub mask: Option<TextureId>,
    /// Number of clips active on the surface.
    pub clip_depth: usize,
}

/// An ordered list of draw commands for a single frame.
#[derive(Clone, Debug, Default)]
pub struct RenderPlan {
    /// Draw items in paint order.
    pub items: Vec<RenderItem>,
    /// Distinct surfaces bound besides the default target.
    pub surfaces_bound: Vec<TextureId>,
    /// Filter applications as `(source, target)` pairs.
    pub filter_passes: Vec<(TextureId, TextureId)>,
}

impl RenderPlan {
    /// Creates an empty render plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the plan for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
        self.surfaces_bound.clear();
        self.filter_passes.clear();
    }

    /// Items drawn into the default target.
    pub fn root_items(&self) -> impl Iterator<Item = &RenderItem> {
        self.items.iter().filter(|item| item.surface.is_none())
    }
}

/// A [`TextureMapper`] that records a [`RenderPlan`] instead of drawing.
#[derive(Debug)]
pub struct RecordingTextureMapper {
    plan: RenderPlan,
    textures: BTreeMap<TextureId, (Size, bool)>,
    next_id: u64,
    bound: Option<TextureId>,
    clips: Vec<Option<TextureId>>,
    max_textures: Option<usize>,
    uploads: usize,
}

impl Default for RecordingTextureMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTextureMapper {
    /// Creates a recorder with no texture limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plan: RenderPlan::new(),
            textures: BTreeMap::new(),
            next_id: 1,
            bound: None,
            clips: Vec::new(),
            max_textures: None,
            uploads: 0,
        }
    }

    /// Creates a recorder that fails allocation beyond `max_textures` live
    /// textures.
    #[must_use]
    pub fn with_texture_limit(max_textures: usize) -> Self {
        Self {
            max_textures: Some(max_textures),
            ..Self::new()
        }
    }

    /// The plan recorded since the last
    /// [`begin_frame`](TextureMapper::begin_frame).
    #[must_use]
    pub fn plan(&self) -> &RenderPlan {
        &self.plan
    }

    /// Number of live textures.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of texture uploads since creation.
    #[must_use]
    pub const fn uploads(&self) -> usize {
        self.uploads
    }

    fn clip_depth(&self) -> usize {
        self.clips.iter().filter(|s| **s == self.bound).count()
    }

    fn record(&mut self, source: DrawSource, rect: Rect, transform: &Transform3d, opacity: f32, mask: Option<TextureId>) {
        if rect.is_zero_area() || !transform.is_invertible() {
            return;
        }
        let item = RenderItem {
            source,
            surface: self.bound,
            rect,
            transform: *transform,
            opacity,
            mask,
            clip_depth: self.clip_depth(),
        };
        self.plan.items.push(item);
    }
}

impl TextureMapper for RecordingTextureMapper {
    fn create_texture(&mut self, size: Size, has_alpha: bool) -> Option<TextureId> {
        if self.max_textures.is_some_and(|max| self.textures.len() >= max) {
            return None;
        }
        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.textures.insert(id, (size, has_alpha));
        Some(id)
    }

    fn reset_texture(&mut self, texture: TextureId, size: Size, has_alpha: bool) {
        if let Some(entry) = self.textures.get_mut(&texture) {
            *entry = (size, has_alpha);
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn texture_size(&self, texture: TextureId) -> Option<Size> {
        self.textures.get(&texture).map(|(size, _)| *size)
    }

    fn texture_has_alpha(&self, texture: TextureId) -> bool {
        self.textures.get(&texture).is_some_and(|(_, alpha)| *alpha)
    }

    fn max_texture_size(&self) -> Size {
        Size::new(4096.0, 4096.0)
    }

    fn update_texture(&mut self, texture: TextureId, _: &PixelBuffer, _: Rect, _: Point) {
        if self.textures.contains_key(&texture) {
            self.uploads += 1;
        }
    }

    fn bind_surface(&mut self, surface: Option<TextureId>) {
        self.bound = surface;
        if let Some(id) = surface {
            if !self.plan.surfaces_bound.contains(&id) {
                self.plan.surfaces_bound.push(id);
            }
        }
    }

    fn draw_texture(
        &mut self,
        texture: TextureId,
        target_rect: Rect,
        transform: &Transform3d,
        opacity: f32,
        mask: Option<&MaskInput>,
    ) {
        self.record(
            DrawSource::Texture(texture),
            target_rect,
            transform,
            opacity,
            mask.map(|m| m.texture),
        );
    }

    fn draw_solid_color(&mut self, rect: Rect, transform: &Transform3d, color: Color) {
        self.record(DrawSource::SolidColor(color), rect, transform, 1.0, None);
    }

    fn begin_clip(&mut self, _: &Transform3d, _: Rect) {
        self.clips.push(self.bound);
    }

    fn end_clip(&mut self) {
        let bound = self.bound;
        if let Some(pos) = self.clips.iter().rposition(|s| *s == bound) {
            self.clips.remove(pos);
        }
    }

    fn apply_filters(&mut self, source: TextureId, target: TextureId, _: &FilterOperations) -> bool {
        if source == target || !self.textures.contains_key(&target) {
            return false;
        }
        self.plan.filter_passes.push((source, target));
        true
    }

    fn begin_frame(&mut self) {
        self.plan.clear();
        self.bound = None;
        self.clips.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_with_surface() {
        let mut m = RecordingTextureMapper::new();
        m.begin_frame();
        let surface = m.create_texture(Size::new(10.0, 10.0), true).unwrap();
        m.draw_solid_color(Rect::new(0.0, 0.0, 1.0, 1.0), &Transform3d::IDENTITY, Color::BLACK);
        m.bind_surface(Some(surface));
        m.begin_clip(&Transform3d::IDENTITY, Rect::new(0.0, 0.0, 5.0, 5.0));
        m.draw_solid_color(Rect::new(0.0, 0.0, 1.0, 1.0), &Transform3d::IDENTITY, Color::WHITE);
        m.end_clip();
        m.bind_surface(None);
        m.draw_texture(surface, Rect::new(0.0, 0.0, 10.0, 10.0), &Transform3d::IDENTITY, 0.5, None);

        let plan = m.plan();
        assert_eq!(plan.items.len(), 3);
        assert_eq!(plan.items[1].surface, Some(surface));
        assert_eq!(plan.items[1].clip_depth, 1);
        assert_eq!(plan.items[2].source, DrawSource::Texture(surface));
        assert_eq!(plan.root_items().count(), 2);
        assert_eq!(plan.surfaces_bound, alloc::vec![surface]);
    }

    #[test]
    fn texture_limit_fails_allocation() {
        let mut m = RecordingTextureMapper::with_texture_limit(1);
        assert!(m.create_texture(Size::new(1.0, 1.0), false).is_some());
        assert!(m.create_texture(Size::new(1.0, 1.0), false).is_none());
    }

    #[test]
    fn singular_draws_are_dropped() {
        let mut m = RecordingTextureMapper::new();
        m.draw_solid_color(
            Rect::new(0.0, 0.0, 1.0, 1.0),
            &Transform3d::from_scale(1.0, 0.0, 1.0),
            Color::BLACK,
        );
        assert!(m.plan().items.is_empty());
    }
}
