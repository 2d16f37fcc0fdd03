// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositing tree: a mirror of the scene graph that owns textures and
//! paints frames.
//!
//! Layers are keyed by the [`LayerId`] of the scene-graph layer they mirror
//! and stored in slots recycled through a free list. Relations that arrive
//! before their target exists are dropped; the next sync that mentions them
//! wires them up.
//!
//! # Frame
//!
//! 1. [`apply_animations`](CompositingTree::apply_animations) evaluates
//!    every layer's animations and marks changed transforms.
//! 2. [`paint`](CompositingTree::paint) recomputes combined transforms for
//!    the dirty subtrees (drained from the [`TRANSFORM`](dirty::TRANSFORM)
//!    channel in parent-before-child order), then walks the tree from the
//!    root, drawing through a [`TextureMapper`].

mod direct;
mod layer;
mod paint;
mod transforms;

pub use direct::DirectCompositor;
pub use layer::{Backing, CompositingLayer, Contents};
pub use paint::PaintStats;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::mem;

use kurbo::{Size, Vec2};
use lamina_core::animation::Animations;
use lamina_core::dirty;
use lamina_core::layer::{LayerId, LayerState};
use lamina_core::pixels::PixelBuffer;
use lamina_core::tiling::TilingConfig;
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::backing_store::TiledBackingStore;
use crate::surface_pool::SurfacePool;
use crate::texture::TextureMapper;

/// Tunables of the paint traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorConfig {
    /// Grid used by tiled backing stores and image contents.
    pub tiling: TilingConfig,
    /// Layers below this opacity composite overlapping content through an
    /// intermediate surface.
    pub surface_opacity_threshold: f32,
    /// Layers below this opacity are not painted.
    pub visibility_threshold: f32,
    /// Center depths are multiplied by this before comparing when sorting
    /// 3-D siblings.
    pub depth_sort_scale: f64,
}

impl CompositorConfig {
    /// Default tiling, 0.99 surface threshold, 0.01 visibility threshold.
    pub const DEFAULT: Self = Self {
        tiling: TilingConfig::DEFAULT,
        surface_opacity_threshold: 0.99,
        visibility_threshold: 0.01,
        depth_sort_scale: 1000.0,
    };
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Mirror of a layer tree with live textures.
#[derive(Debug)]
pub struct CompositingTree {
    config: CompositorConfig,
    slots: Vec<Option<CompositingLayer>>,
    index: BTreeMap<LayerId, u32>,
    free_list: Vec<u32>,
    root: Option<u32>,
    dirty: DirtyTracker<u32>,
    images: BTreeMap<u64, TiledBackingStore>,
    pool: SurfacePool,
    scroll_delta: Vec2,
}

impl Default for CompositingTree {
    fn default() -> Self {
        Self::new(CompositorConfig::DEFAULT)
    }
}

impl CompositingTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            index: BTreeMap::new(),
            free_list: Vec::new(),
            root: None,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            images: BTreeMap::new(),
            pool: SurfacePool::new(),
            scroll_delta: Vec2::ZERO,
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Number of mirrored layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no layer is mirrored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `true` if `id` is mirrored.
    #[must_use]
    pub fn contains(&self, id: LayerId) -> bool {
        self.index.contains_key(&id)
    }

    /// The mirror of `id`.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&CompositingLayer> {
        self.index.get(&id).and_then(|&idx| self.get(idx))
    }

    /// The root layer's id.
    #[must_use]
    pub fn root(&self) -> Option<LayerId> {
        self.root.and_then(|idx| self.id_at(idx))
    }

    /// Ids of `id`'s children in paint order.
    #[must_use]
    pub fn children(&self, id: LayerId) -> Vec<LayerId> {
        self.layer(id)
            .map(|l| l.children.iter().filter_map(|&c| self.id_at(c)).collect())
            .unwrap_or_default()
    }

    /// Id of `id`'s parent.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.id_at(self.layer(id)?.parent?)
    }

    /// Id of the layer that `id` masks or replicates.
    #[must_use]
    pub fn effect_target(&self, id: LayerId) -> Option<LayerId> {
        self.id_at(self.layer(id)?.effect_target?)
    }

    /// Returns `true` if any layer has an animation still advancing.
    #[must_use]
    pub fn has_running_animations(&self) -> bool {
        self.layers().any(|l| l.animations.has_running_animations())
    }

    /// Number of intermediate surfaces held by the pool.
    #[must_use]
    pub fn pooled_surfaces(&self) -> usize {
        self.pool.len()
    }

    // -- Lifecycle --

    /// Starts mirroring `id`. Returns `false` if it is already mirrored.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "slot count is bounded by the u32 layer index space"
    )]
    pub fn create_layer(&mut self, id: LayerId) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        let layer = CompositingLayer::new(id);
        let idx = match self.free_list.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(layer);
                idx
            }
            None => {
                self.slots.push(Some(layer));
                (self.slots.len() - 1) as u32
            }
        };
        self.index.insert(id, idx);
        self.dirty.mark(idx, dirty::TRANSFORM);
        true
    }

    /// Stops mirroring `id` and frees its textures.
    ///
    /// Children become parentless, and layers it referenced as mask or
    /// replica lose their effect target.
    pub fn destroy_layer(&mut self, mapper: &mut dyn TextureMapper, id: LayerId) {
        let Some(idx) = self.index.remove(&id) else {
            return;
        };
        self.detach_from_parent(idx);
        let Some(mut layer) = self.slots[idx as usize].take() else {
            return;
        };
        for child in layer.children.drain(..) {
            self.dirty.remove_dependency(child, idx, dirty::TRANSFORM);
            if let Some(c) = self.slot_mut(child) {
                c.parent = None;
            }
            self.dirty.mark_with(child, dirty::TRANSFORM, &EagerPolicy);
        }
        for effect in [layer.mask, layer.replica].into_iter().flatten() {
            if let Some(e) = self.slot_mut(effect) {
                e.effect_target = None;
            }
        }
        if let Some(target) = layer.effect_target {
            if let Some(t) = self.slot_mut(target) {
                if t.mask == Some(idx) {
                    t.mask = None;
                }
                if t.replica == Some(idx) {
                    t.replica = None;
                }
            }
        }
        layer.backing.release(mapper);
        if self.root == Some(idx) {
            self.root = None;
        }
        self.dirty.remove_key(idx);
        self.free_list.push(idx);
    }

    /// Sets the layer painting starts from. Unknown ids clear the root.
    pub fn set_root(&mut self, root: Option<LayerId>) {
        self.root = root.and_then(|id| self.index.get(&id).copied());
    }

    // -- Topology --

    /// Replaces `id`'s children.
    ///
    /// Old children are unparented first. Ids that are not mirrored yet are
    /// skipped; a child that has another parent is moved.
    pub fn set_children(&mut self, id: LayerId, children: &[LayerId]) {
        let Some(&idx) = self.index.get(&id) else {
            return;
        };
        let old = match self.slot_mut(idx) {
            Some(layer) => mem::take(&mut layer.children),
            None => return,
        };
        for child in old {
            self.dirty.remove_dependency(child, idx, dirty::TRANSFORM);
            if let Some(c) = self.slot_mut(child) {
                if c.parent == Some(idx) {
                    c.parent = None;
                }
            }
        }
        let mut resolved = Vec::with_capacity(children.len());
        for child in children {
            let Some(&c) = self.index.get(child) else {
                continue;
            };
            if resolved.contains(&c) || self.is_ancestor(c, idx) {
                continue;
            }
            self.detach_from_parent(c);
            if self.dirty.add_dependency(c, idx, dirty::TRANSFORM).is_err() {
                continue;
            }
            if let Some(layer) = self.slot_mut(c) {
                layer.parent = Some(idx);
            }
            self.dirty.mark_with(c, dirty::TRANSFORM, &EagerPolicy);
            resolved.push(c);
        }
        if let Some(layer) = self.slot_mut(idx) {
            layer.children = resolved;
        }
    }

    /// Sets or clears `id`'s mask layer.
    pub fn set_mask(&mut self, id: LayerId, mask: Option<LayerId>) {
        self.set_effect(id, mask, |l| &mut l.mask);
    }

    /// Sets or clears `id`'s replica layer.
    pub fn set_replica(&mut self, id: LayerId, replica: Option<LayerId>) {
        self.set_effect(id, replica, |l| &mut l.replica);
    }

    fn set_effect(
        &mut self,
        id: LayerId,
        effect: Option<LayerId>,
        field: fn(&mut CompositingLayer) -> &mut Option<u32>,
    ) {
        let Some(&idx) = self.index.get(&id) else {
            return;
        };
        let new = effect.and_then(|e| self.index.get(&e).copied());
        // The layer itself or one of its ancestors would paint inside itself.
        if new.is_some_and(|e| self.is_ancestor(e, idx)) {
            return;
        }
        let Some(layer) = self.slot_mut(idx) else {
            return;
        };
        let old = mem::replace(field(layer), new);
        if old == new {
            return;
        }
        if let Some(o) = old {
            self.dirty.remove_dependency(o, idx, dirty::TRANSFORM);
            if let Some(layer) = self.slot_mut(o) {
                if layer.effect_target == Some(idx) {
                    layer.effect_target = None;
                }
            }
        }
        if let Some(n) = new {
            if self.dirty.add_dependency(n, idx, dirty::TRANSFORM).is_err() {
                if let Some(layer) = self.slot_mut(idx) {
                    *field(layer) = None;
                }
                return;
            }
            if let Some(layer) = self.slot_mut(n) {
                layer.effect_target = Some(idx);
            }
            self.dirty.mark_with(n, dirty::TRANSFORM, &EagerPolicy);
        }
    }

    // -- Properties --

    /// Copies scalar state into the mirror of `id`.
    pub fn set_state(&mut self, id: LayerId, state: LayerState) {
        let Some(&idx) = self.index.get(&id) else {
            return;
        };
        if self.slot_mut(idx).is_some_and(|l| l.apply_state(state)) {
            self.dirty.mark_with(idx, dirty::TRANSFORM, &EagerPolicy);
        }
    }

    /// Sets direct contents.
    pub fn set_contents(&mut self, id: LayerId, contents: Contents) {
        if let Some(layer) = self.layer_mut(id) {
            layer.contents = contents;
        }
    }

    /// Replaces the animations evaluated for `id`.
    pub fn set_animations(&mut self, id: LayerId, animations: Animations) {
        let Some(&idx) = self.index.get(&id) else {
            return;
        };
        let Some(layer) = self.slot_mut(idx) else {
            return;
        };
        layer.animations = animations;
        // Properties no longer animated snap back on the next evaluation.
        let state = layer.state.clone();
        layer.apply_state(state);
        self.dirty.mark_with(idx, dirty::TRANSFORM, &EagerPolicy);
    }

    /// Mutable access to `id`'s backing.
    pub fn backing_mut(&mut self, id: LayerId) -> Option<&mut Backing> {
        self.layer_mut(id).map(|l| &mut l.backing)
    }

    /// Replaces `id`'s backing, freeing the old one's textures.
    pub fn set_backing(&mut self, mapper: &mut dyn TextureMapper, id: LayerId, backing: Backing) {
        if let Some(layer) = self.layer_mut(id) {
            layer.backing.release(mapper);
            layer.backing = backing;
            if let Backing::Remote(store) = &mut layer.backing {
                store.set_size(layer.state.geometry.size);
            }
        }
    }

    /// Offsets layers fixed to the viewport by `delta` so they stay put
    /// while their ancestors scroll.
    pub fn set_scroll_delta(&mut self, delta: Vec2) {
        if self.scroll_delta == delta {
            return;
        }
        self.scroll_delta = delta;
        let fixed: Vec<u32> = self
            .index
            .values()
            .copied()
            .filter(|&idx| self.get(idx).is_some_and(|l| l.state.flags.fixed_to_viewport))
            .collect();
        for idx in fixed {
            self.dirty.mark_with(idx, dirty::TRANSFORM, &EagerPolicy);
        }
    }

    // -- Images --

    /// Returns `true` if image `key` is registered.
    #[must_use]
    pub fn has_image(&self, key: u64) -> bool {
        self.images.contains_key(&key)
    }

    /// Number of registered images.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Registers or replaces image `key` and uploads its pixels.
    pub fn set_image(&mut self, mapper: &mut dyn TextureMapper, key: u64, pixels: &PixelBuffer) {
        let tiling = self.config.tiling;
        let store = self
            .images
            .entry(key)
            .or_insert_with(|| TiledBackingStore::new(tiling));
        let size = Size::new(f64::from(pixels.width()), f64::from(pixels.height()));
        let has_alpha = pixels.has_alpha();
        store.resize_or_rebuild(mapper, size, has_alpha);
        store.update_contents(mapper, pixels, pixels.bounds(), has_alpha);
    }

    /// Unregisters image `key` and frees its textures.
    pub fn remove_image(&mut self, mapper: &mut dyn TextureMapper, key: u64) {
        if let Some(mut store) = self.images.remove(&key) {
            store.release(mapper);
        }
    }

    /// Frees images no layer shows.
    pub fn prune_images(&mut self, mapper: &mut dyn TextureMapper) {
        let used: Vec<u64> = self
            .layers()
            .filter_map(|l| match l.contents {
                Contents::Image(key) => Some(key),
                _ => None,
            })
            .collect();
        let unused: Vec<u64> = self
            .images
            .keys()
            .copied()
            .filter(|k| !used.contains(k))
            .collect();
        for key in unused {
            self.remove_image(mapper, key);
        }
    }

    // -- Frame --

    /// Evaluates animations at `now`. Returns `true` if any is still running.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "slot count is bounded by the u32 layer index space"
    )]
    pub fn apply_animations(&mut self, now: f64) -> bool {
        let mut running = false;
        for idx in 0..self.slots.len() as u32 {
            let Some(layer) = self.slots[idx as usize].as_mut() else {
                continue;
            };
            if layer.apply_animations(now) {
                self.dirty.mark_with(idx, dirty::TRANSFORM, &EagerPolicy);
            }
            running |= layer.animations.has_running_animations();
        }
        running
    }

    /// Resizes the pooled surfaces' viewport; a change empties the pool.
    pub fn set_viewport_size(&mut self, mapper: &mut dyn TextureMapper, size: Size) {
        self.pool.set_viewport_size(mapper, size);
    }

    /// Frees every texture: backings, images and pooled surfaces.
    ///
    /// Layers keep their state; content reappears once re-uploaded.
    pub fn release_textures(&mut self, mapper: &mut dyn TextureMapper) {
        for layer in self.slots.iter_mut().flatten() {
            match &mut layer.backing {
                Backing::None => {}
                Backing::Tiled(store) => store.release(mapper),
                Backing::Remote(store) => store.remove_all_tiles(mapper),
            }
        }
        for (_, mut store) in mem::take(&mut self.images) {
            store.release(mapper);
        }
        self.pool.purge(mapper);
    }

    // -- Slot helpers --

    fn layers(&self) -> impl Iterator<Item = &CompositingLayer> {
        self.slots.iter().flatten()
    }

    fn layer_mut(&mut self, id: LayerId) -> Option<&mut CompositingLayer> {
        let idx = *self.index.get(&id)?;
        self.slot_mut(idx)
    }

    pub(crate) fn get(&self, idx: u32) -> Option<&CompositingLayer> {
        self.slots.get(idx as usize).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, idx: u32) -> Option<&mut CompositingLayer> {
        self.slots.get_mut(idx as usize).and_then(Option::as_mut)
    }

    fn id_at(&self, idx: u32) -> Option<LayerId> {
        self.get(idx).map(|l| l.id)
    }

    /// Returns `true` if `ancestor` is `idx` or one of its ancestors.
    ///
    /// Masks and replicas count their target as their ancestor.
    fn is_ancestor(&self, ancestor: u32, idx: u32) -> bool {
        let mut cursor = Some(idx);
        while let Some(c) = cursor {
            if c == ancestor {
                return true;
            }
            cursor = self.get(c).and_then(|l| l.effect_target.or(l.parent));
        }
        false
    }

    fn detach_from_parent(&mut self, idx: u32) {
        let Some(parent) = self.slot_mut(idx).and_then(|l| l.parent.take()) else {
            return;
        };
        self.dirty.remove_dependency(idx, parent, dirty::TRANSFORM);
        if let Some(p) = self.slot_mut(parent) {
            p.children.retain(|&c| c != idx);
        }
        self.dirty.mark_with(idx, dirty::TRANSFORM, &EagerPolicy);
    }
}
