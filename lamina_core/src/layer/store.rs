// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays scene graph with allocation, topology, and property
//! management.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::mem;

use kurbo::{Point, Rect, Size};
use understory_dirty::{CycleHandling, DirtyTracker};

use super::changes::TreeChanges;
use super::client::{LayerClient, PaintContext, PaintingPhases};
use super::id::{INVALID, LayerId};
use super::properties::{
    DisplayClip, LayerContents, LayerFlags, LayerGeometry, LayerImage, LayerState,
};
use super::traverse::Children;
use crate::animation::{
    AnimatedProperty, Animation, AnimationRejection, AnimationTiming, Animations, KeyframeList,
};
use crate::color::Color;
use crate::dirty::{self, ChangeMask};
use crate::filter::FilterOperations;
use crate::layer_transform::AnchorPoint;
use crate::pixels::PixelBuffer;
use crate::region::DamageRegion;
use crate::transform::Transform3d;

/// Repaint rects older than this are dropped from the history.
const MAX_REPAINT_HISTORY: usize = 32;

/// Which compositing path a tree feeds. Selects the notification a change
/// raises on the [`LayerClient`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayerBackend {
    /// Pure data model; changes are only recorded.
    Scene,
    /// Mirrored in-process; changes call
    /// [`notify_flush_required`](LayerClient::notify_flush_required).
    #[default]
    Direct,
    /// Mirrored across a sync boundary; changes call
    /// [`notify_sync_required`](LayerClient::notify_sync_required).
    Coordinated,
}

/// Capabilities and behavior of a [`LayerTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerTreeConfig {
    /// Notification path.
    pub backend: LayerBackend,
    /// Whether the compositor can apply filters. When `false`,
    /// [`LayerTree::set_filters`] rejects every non-empty list.
    pub filters_supported: bool,
}

impl LayerTreeConfig {
    /// In-process compositing with filter support.
    pub const DEFAULT: Self = Self {
        backend: LayerBackend::Direct,
        filters_supported: true,
    };

    /// Same as [`DEFAULT`](Self::DEFAULT) with another backend.
    #[must_use]
    pub const fn with_backend(backend: LayerBackend) -> Self {
        Self {
            backend,
            filters_supported: true,
        }
    }
}

impl Default for LayerTreeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The authoritative scene graph.
///
/// Layers are addressed by [`LayerId`] handles. Internally, each layer
/// occupies a slot in parallel arrays. Destroyed layers are recycled via a
/// free list, and generation counters prevent stale handle access.
///
/// Every setter is a no-op when the value is unchanged. Otherwise it records
/// a [`ChangeMask`] bit for the layer, marks the [`SYNC`](dirty::SYNC)
/// channel and notifies the client according to the configured
/// [`LayerBackend`].
pub struct LayerTree {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,
    pub(crate) mask: Vec<u32>,
    pub(crate) replica: Vec<u32>,
    pub(crate) effect_target: Vec<u32>,

    // -- Properties --
    pub(crate) name: Vec<String>,
    pub(crate) geometry: Vec<LayerGeometry>,
    pub(crate) opacity: Vec<f32>,
    pub(crate) background_color: Vec<Color>,
    pub(crate) flags: Vec<LayerFlags>,
    pub(crate) filters: Vec<FilterOperations>,
    pub(crate) contents: Vec<LayerContents>,
    pub(crate) painting_phases: Vec<PaintingPhases>,
    pub(crate) animations: Vec<Animations>,

    // -- Invalidation --
    pub(crate) needs_display: Vec<DamageRegion>,
    pub(crate) repaint_rects: Vec<Vec<Rect>>,
    pub(crate) change_mask: Vec<ChangeMask>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Lifecycle tracking --
    pub(crate) pending_added: Vec<LayerId>,
    pub(crate) pending_removed: Vec<LayerId>,
    pub(crate) pending_animation_starts: Vec<(LayerId, f64)>,

    root: u32,
    client: Option<Box<dyn LayerClient>>,
    config: LayerTreeConfig,
}

impl core::fmt::Debug for LayerTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayerTree")
            .field("len", &self.len)
            .field("live", &self.alive.iter().filter(|a| **a).count())
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for LayerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerTree {
    /// Creates an empty tree with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LayerTreeConfig::DEFAULT)
    }

    /// Creates an empty tree.
    #[must_use]
    pub fn with_config(config: LayerTreeConfig) -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            mask: Vec::new(),
            replica: Vec::new(),
            effect_target: Vec::new(),
            name: Vec::new(),
            geometry: Vec::new(),
            opacity: Vec::new(),
            background_color: Vec::new(),
            flags: Vec::new(),
            filters: Vec::new(),
            contents: Vec::new(),
            painting_phases: Vec::new(),
            animations: Vec::new(),
            needs_display: Vec::new(),
            repaint_rects: Vec::new(),
            change_mask: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
            pending_animation_starts: Vec::new(),
            root: INVALID,
            client: None,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LayerTreeConfig {
        &self.config
    }

    /// Installs the client that receives notifications and paints content.
    pub fn set_client(&mut self, client: Box<dyn LayerClient>) {
        self.client = Some(client);
    }

    /// Removes and returns the client.
    pub fn take_client(&mut self) -> Option<Box<dyn LayerClient>> {
        self.client.take()
    }

    // -- Allocation API --

    /// Creates a new detached layer and returns its handle.
    ///
    /// The layer starts with default geometry, full opacity, no contents and
    /// no relations. Its full state is reported by the next flush.
    pub fn create_layer(&mut self) -> LayerId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot. The generation was bumped on destroy.
            let i = idx as usize;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.mask[i] = INVALID;
            self.replica[i] = INVALID;
            self.effect_target[i] = INVALID;
            self.name[i] = String::new();
            self.geometry[i] = LayerGeometry::default();
            self.opacity[i] = 1.0;
            self.background_color[i] = Color::TRANSPARENT;
            self.flags[i] = LayerFlags::default();
            self.filters[i] = FilterOperations::default();
            self.contents[i] = LayerContents::None;
            self.painting_phases[i] = PaintingPhases::default();
            self.animations[i] = Animations::new();
            self.needs_display[i] = DamageRegion::new();
            self.repaint_rects[i].clear();
            self.change_mask[i] = ChangeMask::NONE;
            self.alive[i] = true;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.mask.push(INVALID);
            self.replica.push(INVALID);
            self.effect_target.push(INVALID);
            self.name.push(String::new());
            self.geometry.push(LayerGeometry::default());
            self.opacity.push(1.0);
            self.background_color.push(Color::TRANSPARENT);
            self.flags.push(LayerFlags::default());
            self.filters.push(FilterOperations::default());
            self.contents.push(LayerContents::None);
            self.painting_phases.push(PaintingPhases::default());
            self.animations.push(Animations::new());
            self.needs_display.push(DamageRegion::new());
            self.repaint_rects.push(Vec::new());
            self.change_mask.push(ChangeMask::NONE);
            self.generation.push(0);
            self.alive.push(true);
            idx
        };

        let id = self.id_at(idx);
        self.pending_added.push(id);
        self.record_change(idx, ChangeMask::STATE);
        self.dirty.mark(idx, dirty::TOPOLOGY);
        id
    }

    /// Destroys a layer, freeing its slot for reuse.
    ///
    /// The layer is detached from its parent (or from the layer it masks or
    /// replicates). Its children are unparented, not destroyed, and its mask
    /// and replica lose their back-reference.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_layer(&mut self, id: LayerId) {
        self.validate(id);
        let idx = id.idx;
        self.release(idx);

        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            let next = self.next_sibling[child as usize];
            self.parent[child as usize] = INVALID;
            self.prev_sibling[child as usize] = INVALID;
            self.next_sibling[child as usize] = INVALID;
            self.note_change(child, ChangeMask::PARENT);
            child = next;
        }
        self.first_child[idx as usize] = INVALID;

        let mask = mem::replace(&mut self.mask[idx as usize], INVALID);
        if mask != INVALID {
            self.parent[mask as usize] = INVALID;
            self.effect_target[mask as usize] = INVALID;
            self.note_change(mask, ChangeMask::PARENT);
        }
        let replica = mem::replace(&mut self.replica[idx as usize], INVALID);
        if replica != INVALID {
            self.effect_target[replica as usize] = INVALID;
            self.note_change(replica, ChangeMask::PARENT);
        }

        self.dirty.remove_key(idx);
        self.animations[idx as usize] = Animations::new();
        self.contents[idx as usize] = LayerContents::None;
        self.needs_display[idx as usize] = DamageRegion::new();
        self.change_mask[idx as usize] = ChangeMask::NONE;
        if self.root == idx {
            self.root = INVALID;
        }

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.alive[idx as usize] = false;
        self.free_list.push(idx);
        self.pending_removed.push(id);
    }

    /// Returns whether the given handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        id.idx < self.len
            && self.generation[id.idx as usize] == id.generation
            && self.alive[id.idx as usize]
    }

    /// Number of live layers.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// Sets the root of the tree, the layer flushes and dumps start from.
    pub fn set_root(&mut self, root: Option<LayerId>) {
        if let Some(root) = root {
            self.validate(root);
        }
        let idx = root.map_or(INVALID, |id| id.idx);
        if self.root != idx {
            self.root = idx;
            if idx != INVALID {
                self.note_change(idx, ChangeMask::PARENT);
            }
        }
    }

    /// Returns the root of the tree.
    #[must_use]
    pub fn root(&self) -> Option<LayerId> {
        (self.root != INVALID).then(|| self.id_at(self.root))
    }

    // -- Topology API --

    /// Appends `child` to `parent`'s children, detaching it from any
    /// previous parent first.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale or the insertion would create a
    /// cycle.
    pub fn add_child(&mut self, parent: LayerId, child: LayerId) {
        self.insert_child(parent, child, INVALID);
    }

    /// Inserts `child` at `index` among `parent`'s children. An index past the
    /// end appends.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale or the insertion would create a
    /// cycle.
    pub fn add_child_at_index(&mut self, parent: LayerId, child: LayerId, index: usize) {
        self.validate(parent);
        self.validate(child);
        self.release(child.idx);
        let before = self.nth_child(parent.idx, index);
        self.insert_child(parent, child, before);
    }

    /// Inserts `child` directly above (after) `sibling`. If `sibling` is not a
    /// child of `parent`, `child` is appended.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, `child == sibling`, or the insertion would
    /// create a cycle.
    pub fn add_child_above(&mut self, parent: LayerId, child: LayerId, sibling: LayerId) {
        self.validate(parent);
        self.validate(child);
        self.validate(sibling);
        assert!(child != sibling, "cannot insert a layer relative to itself");
        self.release(child.idx);
        let before = if self.is_child_of(sibling.idx, parent.idx) {
            self.next_sibling[sibling.idx as usize]
        } else {
            INVALID
        };
        self.insert_child(parent, child, before);
    }

    /// Inserts `child` directly below (before) `sibling`. If `sibling` is not
    /// a child of `parent`, `child` is appended.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, `child == sibling`, or the insertion would
    /// create a cycle.
    pub fn add_child_below(&mut self, parent: LayerId, child: LayerId, sibling: LayerId) {
        self.validate(parent);
        self.validate(child);
        self.validate(sibling);
        assert!(child != sibling, "cannot insert a layer relative to itself");
        self.release(child.idx);
        let before = if self.is_child_of(sibling.idx, parent.idx) {
            sibling.idx
        } else {
            INVALID
        };
        self.insert_child(parent, child, before);
    }

    /// Puts `new_child` in `old_child`'s place and unparents `old_child`.
    ///
    /// Returns `false` (and changes nothing) if `old_child` is not a child of
    /// `parent`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or the replacement would create a cycle.
    pub fn replace_child(&mut self, parent: LayerId, old_child: LayerId, new_child: LayerId) -> bool {
        self.validate(parent);
        self.validate(old_child);
        self.validate(new_child);
        if !self.is_child_of(old_child.idx, parent.idx) {
            return false;
        }
        if old_child == new_child {
            return true;
        }
        self.release(new_child.idx);
        self.insert_child(parent, new_child, old_child.idx);
        self.release(old_child.idx);
        true
    }

    /// Detaches the layer from its parent. A mask layer is detached from the
    /// layer it masks. No-op for a parentless layer.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn remove_from_parent(&mut self, child: LayerId) {
        self.validate(child);
        if self.parent[child.idx as usize] != INVALID {
            self.release(child.idx);
        }
    }

    /// Unparents every child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn remove_all_children(&mut self, parent: LayerId) {
        self.validate(parent);
        while self.first_child[parent.idx as usize] != INVALID {
            let child = self.first_child[parent.idx as usize];
            self.release(child);
        }
    }

    /// Returns the parent of a layer, if any. For a mask layer this is the
    /// layer it masks.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.parent[id.idx as usize])
    }

    /// Returns an iterator over the direct children of a layer, in paint
    /// order.
    #[must_use]
    pub fn children(&self, id: LayerId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns the number of children.
    #[must_use]
    pub fn child_count(&self, id: LayerId) -> usize {
        self.children(id).count()
    }

    /// Sets or clears the layer whose alpha masks `id`.
    ///
    /// The mask's parent becomes `id` and its effect target is set, but it is
    /// never part of the child list. A previous mask is released.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, or if the mask is `id` itself or one of
    /// its ancestors.
    pub fn set_mask_layer(&mut self, id: LayerId, mask: Option<LayerId>) {
        self.validate(id);
        if let Some(mask) = mask {
            self.validate(mask);
            assert!(mask != id, "a layer cannot mask itself");
            assert!(
                !self.is_ancestor_or_self(mask.idx, id.idx),
                "masking {id:?} with {mask:?} would create a cycle"
            );
        }
        let new = mask.map_or(INVALID, |m| m.idx);
        let idx = id.idx;
        if self.mask[idx as usize] == new {
            return;
        }

        let old = self.mask[idx as usize];
        if old != INVALID {
            self.release(old);
        }
        if new != INVALID {
            self.release(new);
            self.parent[new as usize] = idx;
            self.effect_target[new as usize] = idx;
            self.mask[idx as usize] = new;
            self.note_change(new, ChangeMask::PARENT);
            // Masks follow their target's size.
            let size = self.geometry[idx as usize].size;
            self.update_geometry(new, ChangeMask::SIZE, |g| &mut g.size, size);
        }
        self.note_change(idx, ChangeMask::MASK);
    }

    /// Returns the mask layer, if any.
    #[must_use]
    pub fn mask_layer(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.mask[id.idx as usize])
    }

    /// Sets or clears the layer that paints a reflected copy of `id`.
    ///
    /// The replica is detached from any parent and is never part of a child
    /// list; its effect target is set to `id`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, or if the replica is `id` itself or one
    /// of its ancestors.
    pub fn set_replicated_by_layer(&mut self, id: LayerId, replica: Option<LayerId>) {
        self.validate(id);
        if let Some(replica) = replica {
            self.validate(replica);
            assert!(replica != id, "a layer cannot replicate itself");
            assert!(
                !self.is_ancestor_or_self(replica.idx, id.idx),
                "replicating {id:?} with {replica:?} would create a cycle"
            );
        }
        let new = replica.map_or(INVALID, |r| r.idx);
        let idx = id.idx;
        if self.replica[idx as usize] == new {
            return;
        }

        let old = self.replica[idx as usize];
        if old != INVALID {
            self.release(old);
        }
        if new != INVALID {
            self.release(new);
            self.effect_target[new as usize] = idx;
            self.replica[idx as usize] = new;
            self.note_change(new, ChangeMask::PARENT);
        }
        self.note_change(idx, ChangeMask::REPLICA);
    }

    /// Returns the replica layer, if any.
    #[must_use]
    pub fn replica_layer(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.replica[id.idx as usize])
    }

    /// Returns the layer this mask or replica belongs to.
    #[must_use]
    pub fn effect_target(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.effect_target[id.idx as usize])
    }

    // -- Property getters --

    /// Debug name.
    #[must_use]
    pub fn name(&self, id: LayerId) -> &str {
        self.validate(id);
        &self.name[id.idx as usize]
    }

    /// Placement and transform inputs.
    #[must_use]
    pub fn geometry(&self, id: LayerId) -> &LayerGeometry {
        self.validate(id);
        &self.geometry[id.idx as usize]
    }

    /// Position of the top-left corner in the parent's space.
    #[must_use]
    pub fn position(&self, id: LayerId) -> Point {
        self.geometry(id).position
    }

    /// Size.
    #[must_use]
    pub fn size(&self, id: LayerId) -> Size {
        self.geometry(id).size
    }

    /// Local transform.
    #[must_use]
    pub fn transform(&self, id: LayerId) -> Transform3d {
        self.geometry(id).transform
    }

    /// Opacity.
    #[must_use]
    pub fn opacity(&self, id: LayerId) -> f32 {
        self.validate(id);
        self.opacity[id.idx as usize]
    }

    /// Background color.
    #[must_use]
    pub fn background_color(&self, id: LayerId) -> Color {
        self.validate(id);
        self.background_color[id.idx as usize]
    }

    /// Rendering flags.
    #[must_use]
    pub fn flags(&self, id: LayerId) -> LayerFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Filter chain.
    #[must_use]
    pub fn filters(&self, id: LayerId) -> &FilterOperations {
        self.validate(id);
        &self.filters[id.idx as usize]
    }

    /// Solid-color or image contents.
    #[must_use]
    pub fn contents(&self, id: LayerId) -> &LayerContents {
        self.validate(id);
        &self.contents[id.idx as usize]
    }

    /// Painting phases.
    #[must_use]
    pub fn painting_phases(&self, id: LayerId) -> PaintingPhases {
        self.validate(id);
        self.painting_phases[id.idx as usize]
    }

    /// Animations attached to the layer.
    #[must_use]
    pub fn animations(&self, id: LayerId) -> &Animations {
        self.validate(id);
        &self.animations[id.idx as usize]
    }

    /// Pending repaint region.
    #[must_use]
    pub fn needs_display(&self, id: LayerId) -> &DamageRegion {
        self.validate(id);
        &self.needs_display[id.idx as usize]
    }

    /// Recent repaint rects, oldest first.
    #[must_use]
    pub fn repaint_rects(&self, id: LayerId) -> &[Rect] {
        self.validate(id);
        &self.repaint_rects[id.idx as usize]
    }

    /// Change bits recorded since the last flush.
    #[must_use]
    pub fn pending_changes(&self, id: LayerId) -> ChangeMask {
        self.validate(id);
        self.change_mask[id.idx as usize]
    }

    /// Snapshot of the scalar state.
    #[must_use]
    pub fn state(&self, id: LayerId) -> LayerState {
        self.validate(id);
        let i = id.idx as usize;
        LayerState {
            name: self.name[i].clone(),
            geometry: self.geometry[i],
            opacity: self.opacity[i],
            background_color: self.background_color[i],
            flags: self.flags[i],
            filters: self.filters[i].clone(),
            painting_phases: self.painting_phases[i],
        }
    }

    // -- Mutation API (records changes and notifies) --

    /// Sets the debug name.
    pub fn set_name(&mut self, id: LayerId, name: impl Into<String>) {
        self.validate(id);
        let name = name.into();
        if self.name[id.idx as usize] != name {
            self.name[id.idx as usize] = name;
            self.note_change(id.idx, ChangeMask::NAME);
        }
    }

    /// Sets the position of the top-left corner in the parent's space.
    pub fn set_position(&mut self, id: LayerId, position: Point) {
        self.validate(id);
        self.update_geometry(id.idx, ChangeMask::POSITION, |g| &mut g.position, position);
    }

    /// Sets the anchor point.
    pub fn set_anchor_point(&mut self, id: LayerId, anchor_point: AnchorPoint) {
        self.validate(id);
        self.update_geometry(
            id.idx,
            ChangeMask::ANCHOR_POINT,
            |g| &mut g.anchor_point,
            anchor_point,
        );
    }

    /// Sets the size. A mask layer follows its target's size, and content
    /// drawing layers are invalidated entirely.
    pub fn set_size(&mut self, id: LayerId, size: Size) {
        self.validate(id);
        if !self.update_geometry(id.idx, ChangeMask::SIZE, |g| &mut g.size, size) {
            return;
        }
        let mask = self.mask[id.idx as usize];
        if mask != INVALID {
            self.update_geometry(mask, ChangeMask::SIZE, |g| &mut g.size, size);
        }
        self.invalidate_contents(id.idx);
    }

    /// Sets the origin of the layer's own coordinate space.
    pub fn set_bounds_origin(&mut self, id: LayerId, origin: Point) {
        self.validate(id);
        self.update_geometry(
            id.idx,
            ChangeMask::BOUNDS_ORIGIN,
            |g| &mut g.bounds_origin,
            origin,
        );
    }

    /// Sets the transform applied around the anchor point.
    pub fn set_transform(&mut self, id: LayerId, transform: Transform3d) {
        self.validate(id);
        self.update_geometry(id.idx, ChangeMask::TRANSFORM, |g| &mut g.transform, transform);
    }

    /// Sets the transform applied to children around the layer center.
    pub fn set_children_transform(&mut self, id: LayerId, transform: Transform3d) {
        self.validate(id);
        self.update_geometry(
            id.idx,
            ChangeMask::CHILDREN_TRANSFORM,
            |g| &mut g.children_transform,
            transform,
        );
    }

    /// Sets where solid-color or image contents are drawn.
    pub fn set_contents_rect(&mut self, id: LayerId, rect: Rect) {
        self.validate(id);
        self.update_geometry(id.idx, ChangeMask::CONTENTS_RECT, |g| &mut g.contents_rect, rect);
    }

    /// Sets the device scale of painted content. Invalidates the contents.
    pub fn set_contents_scale(&mut self, id: LayerId, scale: f64) {
        self.validate(id);
        if self.update_geometry(id.idx, ChangeMask::CONTENTS_RECT, |g| &mut g.contents_scale, scale) {
            self.invalidate_contents(id.idx);
        }
    }

    /// Sets the opacity, clamped to `0.0..=1.0`.
    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) {
        self.validate(id);
        let opacity = opacity.clamp(0.0, 1.0);
        if self.opacity[id.idx as usize] != opacity {
            self.opacity[id.idx as usize] = opacity;
            self.note_change(id.idx, ChangeMask::OPACITY);
        }
    }

    /// Sets the background color.
    pub fn set_background_color(&mut self, id: LayerId, color: Color) {
        self.validate(id);
        if self.background_color[id.idx as usize] != color {
            self.background_color[id.idx as usize] = color;
            self.note_change(id.idx, ChangeMask::BACKGROUND_COLOR);
        }
    }

    /// Sets whether the content is fully opaque.
    pub fn set_contents_opaque(&mut self, id: LayerId, value: bool) {
        self.update_flag(id, value, |f| &mut f.contents_opaque);
    }

    /// Sets whether the layer is drawn when facing away.
    pub fn set_backface_visibility(&mut self, id: LayerId, value: bool) {
        self.update_flag(id, value, |f| &mut f.backface_visible);
    }

    /// Sets whether descendants are clipped to the layer bounds.
    pub fn set_masks_to_bounds(&mut self, id: LayerId, value: bool) {
        self.update_flag(id, value, |f| &mut f.masks_to_bounds);
    }

    /// Sets whether descendants keep their depth.
    pub fn set_preserves_3d(&mut self, id: LayerId, value: bool) {
        self.update_flag(id, value, |f| &mut f.preserves_3d);
    }

    /// Sets whether the layer stays fixed to the viewport.
    pub fn set_fixed_to_viewport(&mut self, id: LayerId, value: bool) {
        self.update_flag(id, value, |f| &mut f.fixed_to_viewport);
    }

    /// Sets whether the owner paints content into this layer. Turning it on
    /// invalidates the whole layer.
    pub fn set_draws_content(&mut self, id: LayerId, value: bool) {
        if self.update_flag(id, value, |f| &mut f.draws_content) && value {
            self.invalidate_contents(id.idx);
        }
    }

    /// Sets whether contents are shown. Turning it on invalidates the whole
    /// layer.
    pub fn set_contents_visible(&mut self, id: LayerId, value: bool) {
        if self.update_flag(id, value, |f| &mut f.contents_visible) && value {
            self.invalidate_contents(id.idx);
        }
    }

    /// Sets the painting phases.
    pub fn set_painting_phases(&mut self, id: LayerId, phases: PaintingPhases) {
        self.validate(id);
        if self.painting_phases[id.idx as usize] != phases {
            self.painting_phases[id.idx as usize] = phases;
            self.note_change(id.idx, ChangeMask::FLAGS);
            self.invalidate_contents(id.idx);
        }
    }

    /// Sets the filter chain.
    ///
    /// Returns whether the compositor can apply `filters`. When it cannot,
    /// the layer's existing filters are cleared instead.
    pub fn set_filters(&mut self, id: LayerId, filters: FilterOperations) -> bool {
        self.validate(id);
        let supported = filters.is_empty()
            || (self.config.filters_supported && filters.can_be_composited());
        let idx = id.idx as usize;
        if self.filters[idx] == filters {
            return supported;
        }
        if supported {
            self.filters[idx] = filters;
            self.note_change(id.idx, ChangeMask::FILTERS);
        } else if !self.filters[idx].is_empty() {
            self.filters[idx] = FilterOperations::default();
            self.note_change(id.idx, ChangeMask::FILTERS);
        }
        supported
    }

    /// Shows a solid color in the contents rect, or clears it.
    pub fn set_contents_to_solid_color(&mut self, id: LayerId, color: Option<Color>) {
        let contents = color.map_or(LayerContents::None, LayerContents::SolidColor);
        self.set_contents(id, contents);
    }

    /// Shows an image in the contents rect, or clears it.
    pub fn set_contents_to_image(&mut self, id: LayerId, image: Option<LayerImage>) {
        let contents = image.map_or(LayerContents::None, LayerContents::Image);
        self.set_contents(id, contents);
    }

    fn set_contents(&mut self, id: LayerId, contents: LayerContents) {
        self.validate(id);
        if self.contents[id.idx as usize] != contents {
            self.contents[id.idx as usize] = contents;
            self.note_change(id.idx, ChangeMask::CONTENTS);
        }
    }

    // -- Repaint API --

    /// Marks the whole layer for repaint. Children are not affected.
    pub fn set_needs_display(&mut self, id: LayerId) {
        self.validate(id);
        if !self.can_display(id.idx) {
            return;
        }
        let bounds = self.geometry[id.idx as usize].size.to_rect();
        let region = &mut self.needs_display[id.idx as usize];
        if region.is_full() {
            return;
        }
        region.invalidate_all();
        self.push_repaint_rect(id.idx, bounds);
        self.note_change(id.idx, ChangeMask::DISPLAY);
    }

    /// Marks `rect` (layer space) for repaint. Children are not affected.
    pub fn set_needs_display_in_rect(&mut self, id: LayerId, rect: Rect, clip: DisplayClip) {
        self.validate(id);
        if !self.can_display(id.idx) {
            return;
        }
        let rect = match clip {
            DisplayClip::ClipToLayer => {
                rect.intersect(self.geometry[id.idx as usize].size.to_rect())
            }
            DisplayClip::DoNotClip => rect,
        };
        if rect.is_zero_area() {
            return;
        }
        let region = &mut self.needs_display[id.idx as usize];
        if region.is_full() {
            return;
        }
        region.add(rect);
        self.push_repaint_rect(id.idx, rect);
        self.note_change(id.idx, ChangeMask::DISPLAY);
    }

    /// Takes the pending repaint region, leaving it empty.
    pub fn take_needs_display(&mut self, id: LayerId) -> DamageRegion {
        self.validate(id);
        self.needs_display[id.idx as usize].take()
    }

    /// Clears the repaint history shown by dumps.
    pub fn clear_repaint_rects(&mut self, id: LayerId) {
        self.validate(id);
        self.repaint_rects[id.idx as usize].clear();
    }

    /// Asks the client to paint `rect` (layer space) into `buffer`, whose
    /// top-left pixel corresponds to `rect`'s origin.
    pub fn paint_contents(&mut self, id: LayerId, rect: Rect, buffer: &mut PixelBuffer) {
        self.validate(id);
        let phases = self.painting_phases[id.idx as usize];
        if let Some(client) = self.client.as_deref_mut() {
            let mut context = PaintContext::new(buffer, rect.origin(), rect, phases);
            client.paint_contents(id, &mut context);
        }
    }

    // -- Animation API --

    /// Adds (or replaces by name and property) an animation.
    ///
    /// The start time is `now - time_offset`, so a positive offset starts the
    /// animation part-way through. Rejected animations leave the layer
    /// unchanged.
    pub fn add_animation(
        &mut self,
        id: LayerId,
        name: &str,
        keyframes: KeyframeList,
        box_size: Size,
        timing: Option<&AnimationTiming>,
        time_offset: f64,
        now: f64,
    ) -> Result<(), AnimationRejection> {
        self.validate(id);
        let start_time = now - time_offset;
        let animation = Animation::new(name, keyframes, box_size, timing, start_time)?;
        self.animations[id.idx as usize].add(animation);
        self.pending_animation_starts.push((id, start_time));
        self.note_change(id.idx, ChangeMask::ANIMATIONS);
        Ok(())
    }

    /// Pauses every animation called `name` at `time_offset` into its run.
    ///
    /// Returns `true` if any animation matched.
    pub fn pause_animation(&mut self, id: LayerId, name: &str, time_offset: f64) -> bool {
        self.validate(id);
        let found = self.animations[id.idx as usize].pause(name, time_offset);
        if found {
            self.note_change(id.idx, ChangeMask::ANIMATIONS);
        }
        found
    }

    /// Removes every animation called `name`, whatever its property.
    pub fn remove_animation(&mut self, id: LayerId, name: &str) {
        self.validate(id);
        let before = self.animations[id.idx as usize].len();
        self.animations[id.idx as usize].remove(name);
        if self.animations[id.idx as usize].len() != before {
            self.note_change(id.idx, ChangeMask::ANIMATIONS);
        }
    }

    /// Removes the animation called `name` that animates `property`.
    pub fn remove_animation_of(&mut self, id: LayerId, name: &str, property: AnimatedProperty) {
        self.validate(id);
        let before = self.animations[id.idx as usize].len();
        self.animations[id.idx as usize].remove_property(name, property);
        if self.animations[id.idx as usize].len() != before {
            self.note_change(id.idx, ChangeMask::ANIMATIONS);
        }
    }

    /// Drops animations that finished by `now` so they are not synced
    /// again. Returns the number of layers whose list changed.
    pub fn retire_finished_animations(&mut self, now: f64) -> usize {
        let mut retired = 0;
        for idx in 0..self.len {
            let i = idx as usize;
            if !self.alive[i] || !self.animations[i].retire_finished(now) {
                continue;
            }
            self.note_change(idx, ChangeMask::ANIMATIONS);
            retired += 1;
        }
        retired
    }

    // -- Flush --

    /// Collects everything that changed since the last call and resets the
    /// per-layer change masks.
    ///
    /// Animation start notifications are delivered to the client here.
    pub fn take_changes(&mut self) -> TreeChanges {
        let mut changes = TreeChanges::default();
        self.take_changes_into(&mut changes);
        changes
    }

    /// Like [`take_changes`](Self::take_changes), but reuses a
    /// caller-provided buffer.
    pub fn take_changes_into(&mut self, changes: &mut TreeChanges) {
        changes.clear();

        let added = mem::take(&mut self.pending_added);
        let removed = mem::take(&mut self.pending_removed);
        changes
            .added
            .extend(added.iter().copied().filter(|id| self.is_alive(*id)));
        // A layer created and destroyed between flushes was never reported.
        changes
            .removed
            .extend(removed.iter().copied().filter(|id| !added.contains(id)));

        let topology: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .affected()
            .deterministic()
            .run()
            .collect();
        changes.topology_changed =
            !topology.is_empty() || !changes.added.is_empty() || !changes.removed.is_empty();

        let synced: Vec<u32> = self
            .dirty
            .drain(dirty::SYNC)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in synced {
            if !self.alive[idx as usize] {
                continue;
            }
            let mask = mem::take(&mut self.change_mask[idx as usize]);
            if !mask.is_empty() {
                changes.changed.push((self.id_at(idx), mask));
            }
        }

        for (id, time) in mem::take(&mut self.pending_animation_starts) {
            if !self.is_alive(id) {
                continue;
            }
            if let Some(client) = self.client.as_deref_mut() {
                client.notify_animation_started(id, time);
            }
            changes.animation_starts.push((id, time));
        }
    }

    // -- Raw-index helpers --

    /// Returns the current handle for slot `idx`.
    pub(crate) fn id_at(&self, idx: u32) -> LayerId {
        LayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    fn handle(&self, idx: u32) -> Option<LayerId> {
        (idx != INVALID).then(|| self.id_at(idx))
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    fn validate(&self, id: LayerId) {
        assert!(
            self.is_alive(id),
            "stale LayerId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Records `mask` without notifying the client.
    fn record_change(&mut self, idx: u32, mask: ChangeMask) {
        self.change_mask[idx as usize] |= mask;
        self.dirty.mark(idx, dirty::SYNC);
    }

    /// Records `mask` and raises the backend's notification.
    fn note_change(&mut self, idx: u32, mask: ChangeMask) {
        self.record_change(idx, mask);
        let id = self.id_at(idx);
        let Some(client) = self.client.as_deref_mut() else {
            return;
        };
        match self.config.backend {
            LayerBackend::Scene => {}
            LayerBackend::Direct => client.notify_flush_required(id),
            LayerBackend::Coordinated => client.notify_sync_required(id),
        }
    }

    /// Writes a geometry field. Returns `true` if it changed.
    fn update_geometry<T: PartialEq>(
        &mut self,
        idx: u32,
        bit: ChangeMask,
        field: impl FnOnce(&mut LayerGeometry) -> &mut T,
        value: T,
    ) -> bool {
        let slot = field(&mut self.geometry[idx as usize]);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.note_change(idx, bit);
        true
    }

    /// Writes a flag. Returns `true` if it changed.
    fn update_flag(
        &mut self,
        id: LayerId,
        value: bool,
        field: impl FnOnce(&mut LayerFlags) -> &mut bool,
    ) -> bool {
        self.validate(id);
        let slot = field(&mut self.flags[id.idx as usize]);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.note_change(id.idx, ChangeMask::FLAGS);
        true
    }

    fn can_display(&self, idx: u32) -> bool {
        let flags = self.flags[idx as usize];
        flags.draws_content
            && flags.contents_visible
            && !self.geometry[idx as usize].size.is_zero_area()
    }

    fn invalidate_contents(&mut self, idx: u32) {
        if !self.can_display(idx) {
            return;
        }
        let bounds = self.geometry[idx as usize].size.to_rect();
        self.needs_display[idx as usize].invalidate_all();
        self.push_repaint_rect(idx, bounds);
        self.note_change(idx, ChangeMask::DISPLAY);
    }

    fn push_repaint_rect(&mut self, idx: u32, rect: Rect) {
        let history = &mut self.repaint_rects[idx as usize];
        if history.len() == MAX_REPAINT_HISTORY {
            history.remove(0);
        }
        history.push(rect);
    }

    fn is_child_of(&self, child: u32, parent: u32) -> bool {
        self.parent[child as usize] == parent && self.mask[parent as usize] != child
    }

    /// Returns `true` if `ancestor` is `idx` or one of its ancestors.
    /// Walks parents, stepping from a replica to the layer it replicates.
    fn is_ancestor_or_self(&self, ancestor: u32, mut idx: u32) -> bool {
        while idx != INVALID {
            if idx == ancestor {
                return true;
            }
            idx = match self.parent[idx as usize] {
                INVALID => self.effect_target[idx as usize],
                parent => parent,
            };
        }
        false
    }

    fn nth_child(&self, parent: u32, index: usize) -> u32 {
        let mut child = self.first_child[parent as usize];
        for _ in 0..index {
            if child == INVALID {
                break;
            }
            child = self.next_sibling[child as usize];
        }
        child
    }

    /// Detaches `idx` from every relation it is the dependent side of: its
    /// parent's child list, the layer it masks, or the layer it replicates.
    fn release(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        if p != INVALID {
            if self.mask[p as usize] == idx {
                self.mask[p as usize] = INVALID;
                self.effect_target[idx as usize] = INVALID;
                self.parent[idx as usize] = INVALID;
                self.note_change(p, ChangeMask::MASK);
            } else {
                self.unlink_from_parent(idx);
                self.dirty.mark(p, dirty::TOPOLOGY);
                self.note_change(p, ChangeMask::CHILDREN);
            }
            self.note_change(idx, ChangeMask::PARENT);
        }
        let target = self.effect_target[idx as usize];
        if target != INVALID && self.replica[target as usize] == idx {
            self.replica[target as usize] = INVALID;
            self.effect_target[idx as usize] = INVALID;
            self.note_change(target, ChangeMask::REPLICA);
            self.note_change(idx, ChangeMask::PARENT);
        }
    }

    /// Links `child` under `parent` before `before` (or last when
    /// [`INVALID`]).
    fn insert_child(&mut self, parent: LayerId, child: LayerId, before: u32) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            !self.is_ancestor_or_self(c, p),
            "adding {child:?} under {parent:?} would create a cycle"
        );
        self.release(c);

        self.parent[c as usize] = p;
        if before == INVALID {
            self.prev_sibling[c as usize] = INVALID;
            self.next_sibling[c as usize] = INVALID;
            if self.first_child[p as usize] == INVALID {
                self.first_child[p as usize] = c;
            } else {
                let mut last = self.first_child[p as usize];
                while self.next_sibling[last as usize] != INVALID {
                    last = self.next_sibling[last as usize];
                }
                self.next_sibling[last as usize] = c;
                self.prev_sibling[c as usize] = last;
            }
        } else {
            let prev = self.prev_sibling[before as usize];
            self.next_sibling[c as usize] = before;
            self.prev_sibling[c as usize] = prev;
            if prev != INVALID {
                self.next_sibling[prev as usize] = c;
            } else {
                self.first_child[p as usize] = c;
            }
            self.prev_sibling[before as usize] = c;
        }

        self.dirty.mark(p, dirty::TOPOLOGY);
        self.note_change(p, ChangeMask::CHILDREN);
        self.note_change(c, ChangeMask::PARENT);
    }

    /// Removes `idx` from its parent's child list without touching change
    /// state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}
