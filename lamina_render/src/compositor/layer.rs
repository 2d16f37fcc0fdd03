// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One node of the compositing tree.

use alloc::vec::Vec;

use kurbo::Rect;
use lamina_core::animation::{AnimatedProperty, AnimationClient, Animations};
use lamina_core::color::Color;
use lamina_core::filter::FilterOperations;
use lamina_core::layer::{LayerId, LayerState};
use lamina_core::layer_transform::LayerTransform;
use lamina_core::transform::Transform3d;

use crate::backing_store::TiledBackingStore;
use crate::remote_store::RemoteBackingStore;
use crate::texture::{TextureId, TextureMapper};

/// Where a layer's painted content lives.
#[derive(Debug, Default)]
pub enum Backing {
    /// The layer paints nothing of its own.
    #[default]
    None,
    /// Tiles filled in-process from the layer's paint callback.
    Tiled(TiledBackingStore),
    /// Tiles created and updated by id over the sync protocol.
    Remote(RemoteBackingStore),
}

impl Backing {
    /// Returns `true` for [`Backing::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Texture and content rect used when this layer is a mask.
    #[must_use]
    pub fn mask_texture(&self) -> Option<(TextureId, Rect)> {
        match self {
            Self::None => None,
            Self::Tiled(store) => store.mask_texture(),
            Self::Remote(store) => store.mask_texture(),
        }
    }

    /// Content rect in the store's own space.
    #[must_use]
    pub fn content_rect(&self) -> Rect {
        match self {
            Self::None => Rect::ZERO,
            Self::Tiled(store) => store.rect(),
            Self::Remote(store) => store.size().to_rect(),
        }
    }

    pub(crate) fn release(&mut self, mapper: &mut dyn TextureMapper) {
        match self {
            Self::None => {}
            Self::Tiled(store) => store.release(mapper),
            Self::Remote(store) => store.remove_all_tiles(mapper),
        }
        *self = Self::None;
    }
}

/// Direct contents drawn in the contents rect.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Contents {
    /// None.
    #[default]
    None,
    /// A solid fill.
    SolidColor(Color),
    /// An image from the tree's image registry, by key.
    Image(u64),
}

/// Values written by running animations during one evaluation.
#[derive(Debug, Default)]
pub(crate) struct AnimatedValues {
    pub(crate) transform: Option<Transform3d>,
    pub(crate) opacity: Option<f32>,
    pub(crate) filters: Option<FilterOperations>,
}

impl AnimationClient for AnimatedValues {
    fn set_animated_transform(&mut self, transform: Transform3d) {
        self.transform = Some(transform);
    }

    fn set_animated_opacity(&mut self, opacity: f32) {
        self.opacity = Some(opacity);
    }

    fn set_animated_filters(&mut self, filters: FilterOperations) {
        self.filters = Some(filters);
    }
}

/// A compositing layer: mirrored state plus live textures.
///
/// Relations are slot indices into the owning
/// [`CompositingTree`](super::CompositingTree).
#[derive(Debug)]
pub struct CompositingLayer {
    pub(crate) id: LayerId,
    pub(crate) parent: Option<u32>,
    pub(crate) children: Vec<u32>,
    pub(crate) mask: Option<u32>,
    pub(crate) replica: Option<u32>,
    pub(crate) effect_target: Option<u32>,

    pub(crate) state: LayerState,
    pub(crate) contents: Contents,
    pub(crate) backing: Backing,
    pub(crate) animations: Animations,

    pub(crate) transform: LayerTransform,
    pub(crate) opacity: f32,
    pub(crate) filters: FilterOperations,
    pub(crate) visible: bool,
    pub(crate) center_z: f64,
}

impl CompositingLayer {
    pub(crate) fn new(id: LayerId) -> Self {
        let state = LayerState {
            opacity: 1.0,
            ..LayerState::default()
        };
        Self {
            id,
            parent: None,
            children: Vec::new(),
            mask: None,
            replica: None,
            effect_target: None,
            state,
            contents: Contents::None,
            backing: Backing::None,
            animations: Animations::new(),
            transform: LayerTransform::default(),
            opacity: 1.0,
            filters: FilterOperations::default(),
            visible: true,
            center_z: 0.0,
        }
    }

    /// The scene-graph layer this node mirrors.
    #[must_use]
    pub const fn id(&self) -> LayerId {
        self.id
    }

    /// The mirrored state.
    #[must_use]
    pub const fn state(&self) -> &LayerState {
        &self.state
    }

    /// Direct contents.
    #[must_use]
    pub const fn contents(&self) -> Contents {
        self.contents
    }

    /// Painted-content storage.
    #[must_use]
    pub const fn backing(&self) -> &Backing {
        &self.backing
    }

    /// Animations evaluated at paint time.
    #[must_use]
    pub const fn animations(&self) -> &Animations {
        &self.animations
    }

    /// Current opacity, including animation.
    #[must_use]
    pub const fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Current filters, including animation.
    #[must_use]
    pub const fn filters(&self) -> &FilterOperations {
        &self.filters
    }

    /// Layer space to root space, as of the last transform pass.
    #[must_use]
    pub const fn combined_transform(&self) -> Transform3d {
        self.transform.combined()
    }

    /// Whether the layer faces the viewer with an invertible transform.
    #[must_use]
    pub const fn faces_viewer(&self) -> bool {
        self.visible
    }

    /// Depth of the layer center, set when the parent preserves 3-D.
    #[must_use]
    pub const fn center_z(&self) -> f64 {
        self.center_z
    }

    /// The layer rect in its own space.
    #[must_use]
    pub fn layer_rect(&self) -> Rect {
        self.state.geometry.size.to_rect()
    }

    /// Number of content sources the layer draws itself: painted content
    /// and direct contents.
    pub(crate) fn own_content_count(&self) -> usize {
        usize::from(self.state.flags.draws_content) + usize::from(self.contents != Contents::None)
    }

    /// Copies `state` into the mirror. Returns `true` if geometry that feeds
    /// the combined transform changed.
    pub(crate) fn apply_state(&mut self, state: LayerState) -> bool {
        let geometry = state.geometry;
        let old = &self.state;
        let geometry_changed = old.geometry != geometry
            || old.flags.preserves_3d != state.flags.preserves_3d
            || old.flags.backface_visible != state.flags.backface_visible
            || old.flags.fixed_to_viewport != state.flags.fixed_to_viewport;

        let t = &mut self.transform;
        t.set_position(geometry.position);
        t.set_anchor_point(geometry.anchor_point);
        t.set_size(geometry.size);
        t.set_children_transform(geometry.children_transform);
        t.set_bounds_origin(geometry.bounds_origin);
        t.set_flattening(!state.flags.preserves_3d);
        if !self.animations.has_active_animation_of(AnimatedProperty::Transform) {
            t.set_local_transform(geometry.transform);
        }
        if !self.animations.has_active_animation_of(AnimatedProperty::Opacity) {
            self.opacity = state.opacity;
        }
        if !self.animations.has_active_animation_of(AnimatedProperty::Filter) {
            self.filters = state.filters.clone();
        }
        if let Backing::Remote(store) = &mut self.backing {
            store.set_size(geometry.size);
        }
        self.state = state;
        geometry_changed
    }

    /// Evaluates animations at `now`. Properties without an active animation
    /// fall back to the mirrored base value. Returns `true` if the local
    /// transform changed.
    pub(crate) fn apply_animations(&mut self, now: f64) -> bool {
        if self.animations.is_empty() {
            return false;
        }
        let mut values = AnimatedValues::default();
        self.animations.apply(&mut values, now);

        let transform = match values.transform {
            Some(t) if self.animations.has_active_animation_of(AnimatedProperty::Transform) => t,
            _ => self.state.geometry.transform,
        };
        self.opacity = match values.opacity {
            Some(o) if self.animations.has_active_animation_of(AnimatedProperty::Opacity) => o,
            _ => self.state.opacity,
        };
        self.filters = match values.filters {
            Some(f) if self.animations.has_active_animation_of(AnimatedProperty::Filter) => f,
            _ => self.state.filters.clone(),
        };
        let changed = self.transform.local_transform() != transform;
        self.transform.set_local_transform(transform);
        changed
    }
}
