// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The recursive paint traversal.
//!
//! Each visible layer either paints straight into the current target or,
//! when blending would otherwise be wrong, paints its subtree into a pooled
//! intermediate surface that is then filtered and drawn once. Replicas paint
//! the owner's subtree a second time under the replica transform, before
//! the original.

use alloc::vec::Vec;
use core::mem;

use kurbo::{Rect, Vec2};
use lamina_core::layer::LayerId;
use lamina_core::transform::Transform3d;

use super::layer::{Backing, CompositingLayer, Contents};
use super::CompositingTree;
use crate::surface_pool::SurfacePool;
use crate::texture::{MaskInput, TextureId, TextureMapper};

/// Counts from one [`CompositingTree::paint`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaintStats {
    /// Layers whose own contents were painted (replicas count twice).
    pub layers_painted: u32,
    /// Draw requests issued to the mapper.
    pub draw_calls: u32,
    /// Intermediate surfaces composited.
    pub intermediate_surfaces: u32,
    /// Filter chains applied.
    pub filter_passes: u32,
    /// Surfaces skipped because no texture could be allocated.
    pub exhausted_surfaces: u32,
}

/// How many layers below a node could draw content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ContentCount {
    None,
    Single,
    Multiple,
}

#[derive(Clone, Copy, Debug)]
struct PaintOptions {
    transform: Transform3d,
    offset: Vec2,
    opacity: f32,
    surface: Option<TextureId>,
}

impl PaintOptions {
    const ROOT: Self = Self {
        transform: Transform3d::IDENTITY,
        offset: Vec2::ZERO,
        opacity: 1.0,
        surface: None,
    };

    /// Layer space to the bound surface, for a layer with `combined`.
    fn target_transform(&self, combined: Transform3d) -> Transform3d {
        Transform3d::from_translation(self.offset.x, self.offset.y, 0.0) * self.transform * combined
    }
}

struct Painter<'a> {
    tree: &'a CompositingTree,
    mapper: &'a mut dyn TextureMapper,
    pool: &'a mut SurfacePool,
    stats: PaintStats,
}

impl CompositingTree {
    /// Recomputes dirty transforms and paints the tree from the root.
    ///
    /// Brackets the traversal with the mapper's
    /// [`begin_frame`](TextureMapper::begin_frame) and
    /// [`end_frame`](TextureMapper::end_frame).
    pub fn paint(&mut self, mapper: &mut dyn TextureMapper) -> PaintStats {
        self.update_transforms();
        mapper.begin_frame();
        let mut pool = mem::take(&mut self.pool);
        let stats = match self.root {
            Some(root) => {
                let mut painter = Painter {
                    tree: self,
                    mapper,
                    pool: &mut pool,
                    stats: PaintStats::default(),
                };
                painter.paint_recursive(root, &PaintOptions::ROOT);
                painter.stats
            }
            None => PaintStats::default(),
        };
        mapper.bind_surface(None);
        mapper.end_frame();
        pool.collect(mapper);
        self.pool = pool;
        stats
    }

    /// Whether `id` would be painted, as of the last transform pass.
    #[must_use]
    pub fn is_layer_visible(&self, id: LayerId) -> bool {
        self.index
            .get(&id)
            .is_some_and(|&idx| self.is_visible(idx))
    }

    /// Whether `id` composites its subtree through an intermediate surface.
    #[must_use]
    pub fn needs_intermediate_surface(&self, id: LayerId) -> bool {
        self.index
            .get(&id)
            .is_some_and(|&idx| self.needs_surface(idx))
    }

    fn is_visible(&self, idx: u32) -> bool {
        let Some(layer) = self.get(idx) else {
            return false;
        };
        let flags = layer.state.flags;
        let no_children = layer.children.is_empty();
        if layer.state.geometry.size.is_zero_area()
            && (flags.masks_to_bounds || layer.mask.is_some() || no_children)
        {
            return false;
        }
        if !layer.combined_transform().is_invertible() {
            return false;
        }
        if !layer.visible && no_children {
            return false;
        }
        if !flags.contents_visible && no_children {
            return false;
        }
        layer.opacity >= self.config.visibility_threshold
    }

    fn count_contents(&self, idx: u32) -> ContentCount {
        let Some(layer) = self.get(idx) else {
            return ContentCount::None;
        };
        match (layer.own_content_count() + layer.children.len(), layer.children.first()) {
            (0, _) => ContentCount::None,
            (1, None) => ContentCount::Single,
            (1, Some(&child)) => self.count_contents(child),
            _ => ContentCount::Multiple,
        }
    }

    fn needs_surface(&self, idx: u32) -> bool {
        let Some(layer) = self.get(idx) else {
            return false;
        };
        if !layer.filters.is_empty() {
            return true;
        }
        // Two-pass blending is not used for 3-D rendering contexts.
        if layer.state.flags.preserves_3d {
            return false;
        }
        let translucent = layer.opacity < self.config.surface_opacity_threshold;
        let multiple = self.count_contents(idx) == ContentCount::Multiple;
        let replica = layer.replica.is_some();
        if translucent && (multiple || replica) {
            return true;
        }
        layer.mask.is_some() && multiple && !replica
    }

    /// Bounds of the layer, its unclipped descendants and its replica, in
    /// the space `matrix` maps the layer's combined transform into.
    fn surface_rect_in(&self, idx: u32, matrix: &Transform3d, with_replica: bool) -> Rect {
        let Some(layer) = self.get(idx) else {
            return Rect::ZERO;
        };
        let local = *matrix * layer.combined_transform();
        let mut rect = local.map_rect(layer.layer_rect());
        if !layer.state.flags.masks_to_bounds && layer.mask.is_none() {
            for &child in &layer.children {
                if self.is_visible(child) {
                    rect = rect.union(self.surface_rect_in(child, matrix, true));
                }
            }
        }
        if with_replica {
            let replica = layer.replica.and_then(|r| self.get(r));
            if let (Some(replica), Some(inverse)) =
                (replica, layer.combined_transform().inverse())
            {
                let replicated = *matrix * replica.combined_transform() * inverse;
                rect = rect.union(self.surface_rect_in(idx, &replicated, false));
            }
        }
        rect
    }

    /// Sorts children back to front by center depth.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "depths are quantized to whole units of the sort scale"
    )]
    fn depth_sorted(&self, children: &[u32]) -> Vec<u32> {
        let scale = self.config.depth_sort_scale;
        let mut order = children.to_vec();
        order.sort_by_key(|&c| self.get(c).map_or(0, |l| (l.center_z * scale) as i64));
        order
    }
}

impl Painter<'_> {
    fn paint_recursive(&mut self, idx: u32, options: &PaintOptions) {
        let tree = self.tree;
        let Some(layer) = tree.get(idx) else {
            return;
        };
        if !tree.is_visible(idx) {
            return;
        }
        let opacity = options.opacity * layer.opacity;
        if !tree.needs_surface(idx) {
            let options = PaintOptions { opacity, ..*options };
            self.paint_with_replica(idx, &options, true);
            return;
        }
        self.paint_into_surface(layer, idx, options, opacity);
    }

    fn paint_into_surface(
        &mut self,
        layer: &CompositingLayer,
        idx: u32,
        options: &PaintOptions,
        opacity: f32,
    ) {
        let tree = self.tree;
        let combined = layer.combined_transform();
        let Some(inverse) = combined.inverse() else {
            return;
        };
        let rect = (tree.surface_rect_in(idx, &inverse, true) + layer.filters.outsets()).expand();
        if rect.is_zero_area() {
            return;
        }
        let Some(surface) = self.pool.acquire(self.mapper, rect.size()) else {
            self.stats.exhausted_surfaces += 1;
            return;
        };
        self.mapper.bind_surface(Some(surface.texture()));
        let inner = PaintOptions {
            transform: inverse,
            offset: -rect.origin().to_vec2(),
            opacity: 1.0,
            surface: Some(surface.texture()),
        };
        // With a replica the mask is applied inside, to both copies.
        let has_replica = layer.replica.is_some();
        self.paint_with_replica(idx, &inner, has_replica);

        let mut result = surface;
        if !layer.filters.is_empty() {
            if let Some(filtered) = self.pool.acquire(self.mapper, rect.size()) {
                if self
                    .mapper
                    .apply_filters(result.texture(), filtered.texture(), &layer.filters)
                {
                    self.pool.release(mem::replace(&mut result, filtered));
                    self.stats.filter_passes += 1;
                } else {
                    self.pool.release(filtered);
                }
            }
        }

        self.mapper.bind_surface(options.surface);
        let mask = if has_replica {
            None
        } else {
            self.mask_input(layer, options)
        };
        let transform = options.target_transform(combined);
        self.mapper
            .draw_texture(result.texture(), rect, &transform, opacity, mask.as_ref());
        self.stats.draw_calls += 1;
        self.stats.intermediate_surfaces += 1;
        self.pool.release(result);
    }

    fn paint_with_replica(&mut self, idx: u32, options: &PaintOptions, mask_self: bool) {
        let tree = self.tree;
        let Some(layer) = tree.get(idx) else {
            return;
        };
        let replica = layer.replica.and_then(|r| tree.get(r));
        if let (Some(replica), Some(inverse)) = (replica, layer.combined_transform().inverse()) {
            let replica_options = PaintOptions {
                transform: options.transform * replica.combined_transform() * inverse,
                ..*options
            };
            self.paint_self_and_children(layer, &replica_options, mask_self);
        }
        self.paint_self_and_children(layer, options, mask_self);
    }

    fn paint_self_and_children(
        &mut self,
        layer: &CompositingLayer,
        options: &PaintOptions,
        mask_self: bool,
    ) {
        self.paint_self(layer, options, mask_self);
        if layer.children.is_empty() {
            return;
        }
        let preserves_3d = layer.state.flags.preserves_3d;
        let clip = layer.state.flags.masks_to_bounds && !preserves_3d;
        if clip {
            let transform = options.target_transform(layer.combined_transform());
            self.mapper.begin_clip(&transform, layer.layer_rect());
        }
        if preserves_3d {
            for child in self.tree.depth_sorted(&layer.children) {
                self.paint_recursive(child, options);
            }
        } else {
            for &child in &layer.children {
                self.paint_recursive(child, options);
            }
        }
        if clip {
            self.mapper.end_clip();
        }
    }

    fn paint_self(&mut self, layer: &CompositingLayer, options: &PaintOptions, mask_self: bool) {
        // A back-facing layer still paints its children.
        if !layer.visible || !layer.state.flags.contents_visible {
            return;
        }
        let transform = options.target_transform(layer.combined_transform());
        let opacity = options.opacity;
        let layer_rect = layer.layer_rect();
        let contents_rect = layer.state.geometry.contents_rect;
        self.stats.layers_painted += 1;

        let background = layer.state.background_color;
        if !background.is_transparent() && !layer_rect.is_zero_area() {
            self.mapper
                .draw_solid_color(layer_rect, &transform, background.with_opacity(opacity));
            self.stats.draw_calls += 1;
        }
        if let Contents::SolidColor(color) = layer.contents {
            if !contents_rect.is_zero_area() && !color.is_transparent() {
                self.mapper
                    .draw_solid_color(contents_rect, &transform, color.with_opacity(opacity));
                self.stats.draw_calls += 1;
            }
            return;
        }

        let mask = if mask_self {
            self.mask_input(layer, options)
        } else {
            None
        };
        match &layer.backing {
            Backing::None => {}
            Backing::Tiled(store) => {
                store.paint(self.mapper, layer_rect, &transform, opacity, mask.as_ref());
                self.stats.draw_calls += count(store.tiles().len());
            }
            Backing::Remote(store) => {
                store.paint(self.mapper, layer_rect, &transform, opacity, mask.as_ref());
                self.stats.draw_calls += count(store.tile_count());
            }
        }
        if let Contents::Image(key) = layer.contents {
            if let Some(store) = self.tree.images.get(&key) {
                store.paint(self.mapper, contents_rect, &transform, opacity, mask.as_ref());
                self.stats.draw_calls += count(store.tiles().len());
            }
        }
    }

    /// The mask of `layer`, positioned for the current target.
    fn mask_input(&self, layer: &CompositingLayer, options: &PaintOptions) -> Option<MaskInput> {
        let mask = self.tree.get(layer.mask?)?;
        let (texture, rect) = mask.backing.mask_texture()?;
        let content = mask.backing.content_rect();
        let transform = options.target_transform(mask.combined_transform())
            * Transform3d::rect_to_rect(content, mask.layer_rect());
        Some(MaskInput {
            texture,
            rect,
            transform,
        })
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{id, sized};
    use super::super::{Backing, CompositingTree, CompositorConfig, Contents};
    use crate::backing_store::TiledBackingStore;
    use crate::plan::{DrawSource, RecordingTextureMapper};
    use crate::software::SoftwareTextureMapper;
    use crate::texture::TextureMapper;
    use kurbo::{Point, Rect, Size};
    use lamina_core::color::Color;
    use lamina_core::filter::{FilterOperation, FilterOperations};
    use lamina_core::layer::{LayerId, LayerState};
    use lamina_core::pixels::PixelBuffer;
    use lamina_core::tiling::TilingConfig;
    use lamina_core::transform::Transform3d;

    fn solid(tree: &mut CompositingTree, n: u32, rect: Rect, color: Color) {
        tree.create_layer(id(n));
        let mut state = sized(rect.width(), rect.height());
        state.geometry.position = rect.origin();
        state.geometry.contents_rect = Size::new(rect.width(), rect.height()).to_rect();
        tree.set_state(id(n), state);
        tree.set_contents(id(n), Contents::SolidColor(color));
    }

    fn container(tree: &mut CompositingTree, n: u32, state: LayerState, children: &[LayerId]) {
        tree.create_layer(id(n));
        tree.set_state(id(n), state);
        tree.set_children(id(n), children);
    }

    fn painted(mapper: &mut dyn TextureMapper, size: Size, color: Color) -> Backing {
        let mut store = TiledBackingStore::new(TilingConfig::DEFAULT);
        store.resize_or_rebuild(mapper, size, true);
        let pixels = PixelBuffer::filled(size.width as u32, size.height as u32, color);
        store.update_contents(mapper, &pixels, pixels.bounds(), true);
        Backing::Tiled(store)
    }

    #[test]
    fn transparent_leaf_is_not_painted() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 1, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        let mut hidden = sized(10.0, 10.0);
        hidden.opacity = 0.0;
        hidden.geometry.contents_rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        tree.set_state(id(1), hidden);
        tree.set_root(Some(id(1)));
        tree.paint(&mut m);
        assert!(!tree.is_layer_visible(id(1)));
        assert!(m.plan().items.is_empty());

        let mut half = sized(10.0, 10.0);
        half.opacity = 0.5;
        half.geometry.contents_rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        tree.set_state(id(1), half);
        let stats = tree.paint(&mut m);
        assert!(tree.is_layer_visible(id(1)));
        assert_eq!(stats.layers_painted, 1);
        assert_eq!(m.plan().items.len(), 1);
    }

    #[test]
    fn transparent_branch_hides_descendants() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        let mut branch = sized(10.0, 10.0);
        branch.opacity = 0.0;
        container(&mut tree, 1, branch, &[id(2)]);
        tree.set_root(Some(id(1)));
        tree.paint(&mut m);
        assert!(m.plan().items.is_empty());
    }

    #[test]
    fn translucent_layer_with_two_drawing_children_uses_a_surface() {
        let mut tree = CompositingTree::default();
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        solid(&mut tree, 3, Rect::new(5.0, 5.0, 15.0, 15.0), Color::BLACK);
        let mut parent = sized(20.0, 20.0);
        parent.opacity = 0.5;
        container(&mut tree, 1, parent.clone(), &[id(2), id(3)]);
        assert!(tree.needs_intermediate_surface(id(1)));

        tree.set_children(id(1), &[id(2)]);
        assert!(!tree.needs_intermediate_surface(id(1)));

        parent.opacity = 1.0;
        tree.set_state(id(1), parent);
        tree.set_children(id(1), &[id(2), id(3)]);
        assert!(!tree.needs_intermediate_surface(id(1)));
    }

    #[test]
    fn surface_is_composited_once_at_accumulated_opacity() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        solid(&mut tree, 3, Rect::new(5.0, 5.0, 15.0, 15.0), Color::BLACK);
        let mut parent = sized(20.0, 20.0);
        parent.opacity = 0.5;
        parent.geometry.position = Point::new(100.0, 0.0);
        container(&mut tree, 1, parent, &[id(2), id(3)]);
        tree.set_root(Some(id(1)));
        let stats = tree.paint(&mut m);

        assert_eq!(stats.intermediate_surfaces, 1);
        let plan = m.plan();
        assert_eq!(plan.surfaces_bound.len(), 1);
        let surface = plan.surfaces_bound[0];
        let inner: alloc::vec::Vec<_> = plan
            .items
            .iter()
            .filter(|i| i.surface == Some(surface))
            .collect();
        assert_eq!(inner.len(), 2);
        assert!(inner.iter().all(|i| i.opacity == 1.0));
        let root: alloc::vec::Vec<_> = plan.root_items().collect();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].source, DrawSource::Texture(surface));
        assert_eq!(root[0].opacity, 0.5);
        assert_eq!(root[0].rect, Rect::new(0.0, 0.0, 20.0, 20.0));
        let origin = root[0].transform.map_point(Point::ZERO);
        assert_eq!(origin, Point::new(100.0, 0.0));
        // The surface goes back to the pool.
        assert_eq!(tree.pooled_surfaces(), 1);
    }

    #[test]
    fn surface_blending_matches_expected_pixels() {
        let mut m = SoftwareTextureMapper::new(20, 20);
        let mut tree = CompositingTree::default();
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 10.0, 10.0), Color::rgb(255, 0, 0));
        solid(&mut tree, 3, Rect::new(5.0, 0.0, 15.0, 10.0), Color::rgb(0, 0, 255));
        let mut parent = sized(20.0, 20.0);
        parent.opacity = 0.5;
        container(&mut tree, 1, parent, &[id(2), id(3)]);
        tree.set_root(Some(id(1)));
        tree.paint(&mut m);

        // Inside the overlap only the top child shows, at half opacity.
        let overlap = m.target().get(7, 5);
        assert!(overlap.r < 8, "red leaked through: {overlap:?}");
        assert!((i32::from(overlap.b) - 128).abs() <= 2);
        assert!((i32::from(overlap.a) - 128).abs() <= 2);
    }

    #[test]
    fn replica_paints_before_original() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 1, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        tree.create_layer(id(2));
        let mut replica = sized(10.0, 10.0);
        replica.geometry.position = Point::new(0.0, 20.0);
        tree.set_state(id(2), replica);
        tree.set_replica(id(1), Some(id(2)));
        tree.set_root(Some(id(1)));
        tree.paint(&mut m);

        let items = &m.plan().items;
        assert_eq!(items.len(), 2);
        let first = items[0].transform.map_point(Point::ZERO);
        let second = items[1].transform.map_point(Point::ZERO);
        assert_eq!(first, Point::new(0.0, 20.0));
        assert_eq!(second, Point::ZERO);
    }

    #[test]
    fn translucent_replica_shares_one_surface() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 1, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        let mut state = sized(10.0, 10.0);
        state.opacity = 0.5;
        state.geometry.contents_rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        tree.set_state(id(1), state);
        tree.create_layer(id(2));
        let mut replica = sized(10.0, 10.0);
        replica.geometry.position = Point::new(0.0, 20.0);
        tree.set_state(id(2), replica);
        tree.set_replica(id(1), Some(id(2)));
        tree.set_root(Some(id(1)));
        assert!(tree.needs_intermediate_surface(id(1)));
        tree.paint(&mut m);

        let root: alloc::vec::Vec<_> = m.plan().root_items().collect();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].rect, Rect::new(0.0, 0.0, 10.0, 30.0));
    }

    #[test]
    fn masked_ancestor_applies_mask_to_surface() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        solid(&mut tree, 3, Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK);
        container(&mut tree, 1, sized(10.0, 10.0), &[id(2), id(3)]);
        tree.create_layer(id(4));
        tree.set_state(id(4), sized(10.0, 10.0));
        let backing = painted(&mut m, Size::new(10.0, 10.0), Color::WHITE);
        tree.set_backing(&mut m, id(4), backing);
        tree.set_mask(id(1), Some(id(4)));
        tree.set_root(Some(id(1)));
        assert!(tree.needs_intermediate_surface(id(1)));
        tree.paint(&mut m);

        let root: alloc::vec::Vec<_> = m.plan().root_items().collect();
        assert_eq!(root.len(), 1);
        assert!(root[0].mask.is_some());
        assert!(m
            .plan()
            .items
            .iter()
            .filter(|i| i.surface.is_some())
            .all(|i| i.mask.is_none()));
    }

    #[test]
    fn filters_force_a_surface_and_run_once() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 1, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        let mut state = sized(10.0, 10.0);
        state.geometry.contents_rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        state.filters = FilterOperations::new(alloc::vec![FilterOperation::Blur(2.0)]);
        tree.set_state(id(1), state);
        tree.set_root(Some(id(1)));
        let stats = tree.paint(&mut m);

        assert_eq!(stats.filter_passes, 1);
        let plan = m.plan();
        assert_eq!(plan.filter_passes.len(), 1);
        let (_, filtered) = plan.filter_passes[0];
        let root: alloc::vec::Vec<_> = plan.root_items().collect();
        assert_eq!(root[0].source, DrawSource::Texture(filtered));
        // Blur outsets grow the surface beyond the layer.
        assert!(root[0].rect.x0 < 0.0 && root[0].rect.x1 > 10.0);
    }

    #[test]
    fn preserve_3d_children_paint_far_to_near() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        let near = Color::rgb(255, 0, 0);
        let far = Color::rgb(0, 0, 255);
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 10.0, 10.0), near);
        solid(&mut tree, 3, Rect::new(0.0, 0.0, 10.0, 10.0), far);
        let mut s2 = sized(10.0, 10.0);
        s2.geometry.contents_rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        s2.geometry.transform = Transform3d::from_translation(0.0, 0.0, 50.0);
        tree.set_state(id(2), s2);
        let mut s3 = sized(10.0, 10.0);
        s3.geometry.contents_rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        s3.geometry.transform = Transform3d::from_translation(0.0, 0.0, -50.0);
        tree.set_state(id(3), s3);
        let mut parent = sized(10.0, 10.0);
        parent.flags.preserves_3d = true;
        parent.opacity = 0.5;
        container(&mut tree, 1, parent, &[id(2), id(3)]);
        tree.set_root(Some(id(1)));
        assert!(!tree.needs_intermediate_surface(id(1)));
        tree.paint(&mut m);

        let sources: alloc::vec::Vec<_> = m.plan().items.iter().map(|i| i.source).collect();
        assert_eq!(
            sources,
            alloc::vec![
                DrawSource::SolidColor(far.with_opacity(0.5)),
                DrawSource::SolidColor(near.with_opacity(0.5)),
            ]
        );
    }

    #[test]
    fn masks_to_bounds_clips_children() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 30.0, 30.0), Color::WHITE);
        let mut parent = sized(10.0, 10.0);
        parent.flags.masks_to_bounds = true;
        container(&mut tree, 1, parent, &[id(2)]);
        tree.set_root(Some(id(1)));
        tree.paint(&mut m);
        assert_eq!(m.plan().items[0].clip_depth, 1);
    }

    #[test]
    fn exhausted_surface_paints_nothing() {
        let mut m = RecordingTextureMapper::with_texture_limit(0);
        let mut tree = CompositingTree::default();
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        solid(&mut tree, 3, Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK);
        let mut parent = sized(10.0, 10.0);
        parent.opacity = 0.5;
        container(&mut tree, 1, parent, &[id(2), id(3)]);
        tree.set_root(Some(id(1)));
        let stats = tree.paint(&mut m);
        assert_eq!(stats.exhausted_surfaces, 1);
        assert!(m.plan().items.is_empty());
    }

    #[test]
    fn back_facing_parent_paints_only_its_children() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::default();
        solid(&mut tree, 2, Rect::new(0.0, 0.0, 5.0, 5.0), Color::BLACK);
        solid(&mut tree, 1, Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        let mut turned = sized(10.0, 10.0);
        turned.geometry.contents_rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        turned.geometry.transform =
            Transform3d::from_rotation(0.0, 1.0, 0.0, core::f64::consts::PI);
        turned.flags.backface_visible = false;
        tree.set_state(id(1), turned.clone());
        tree.set_children(id(1), &[id(2)]);
        tree.set_root(Some(id(1)));

        let stats = tree.paint(&mut m);
        assert_eq!(stats.layers_painted, 1);
        assert_eq!(m.plan().items.len(), 1);
        assert_eq!(m.plan().items[0].source, DrawSource::SolidColor(Color::BLACK));

        turned.flags.backface_visible = true;
        tree.set_state(id(1), turned);
        let stats = tree.paint(&mut m);
        assert_eq!(stats.layers_painted, 2);
        assert_eq!(m.plan().items.len(), 2);
    }

    #[test]
    fn tiled_backing_paints_each_tile() {
        let mut m = RecordingTextureMapper::new();
        let mut tree = CompositingTree::new(CompositorConfig {
            tiling: TilingConfig::with_tile_dimension(8.0),
            ..CompositorConfig::DEFAULT
        });
        tree.create_layer(id(1));
        let mut state = sized(16.0, 8.0);
        state.flags.draws_content = true;
        tree.set_state(id(1), state);
        let mut store = TiledBackingStore::new(TilingConfig::with_tile_dimension(8.0));
        store.resize_or_rebuild(&mut m, Size::new(16.0, 8.0), true);
        let pixels = PixelBuffer::filled(16, 8, Color::WHITE);
        store.update_contents(&mut m, &pixels, pixels.bounds(), true);
        tree.set_backing(&mut m, id(1), Backing::Tiled(store));
        tree.set_root(Some(id(1)));
        let stats = tree.paint(&mut m);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(m.plan().items.len(), 2);
    }
}
