// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene graph: the retained, platform-independent layer tree that
//! layout code mutates and compositors mirror.
//!
//! A *layer* is a node with:
//!
//! - An identity ([`LayerId`]): a generational handle that becomes stale when
//!   the layer is destroyed, so a dangling reference is detected instead of
//!   silently aliasing a new layer.
//! - Topology: parent, first-child and sibling links forming an ordered
//!   tree. Child order is paint order.
//! - Effect relations: at most one mask layer (whose parent pointer names the
//!   masked layer, although it is never in the child list) and at most one
//!   replica layer. Both record the owning layer as their *effect target*.
//! - Properties grouped into [`LayerGeometry`], [`LayerFlags`], opacity,
//!   background color, filters, [`LayerContents`], painting phases and
//!   animations.
//! - A pending repaint region and a [`ChangeMask`](crate::dirty::ChangeMask)
//!   of what changed since the last flush.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles.
//!
//! # Flushing
//!
//! [`LayerTree::take_changes`] drains the [`SYNC`](crate::dirty::SYNC) dirty
//! channel and returns a [`TreeChanges`] listing created, destroyed and
//! changed layers with their masks. Layers that did not change are not
//! visited.

mod changes;
mod client;
mod dump;
mod id;
mod properties;
mod store;
mod traverse;

pub use changes::TreeChanges;
pub use client::{LayerClient, PaintContext, PaintingPhases};
pub use dump::{DumpFlags, LayerTreeText};
pub use id::{INVALID, LayerId};
pub use properties::{
    DisplayClip, LayerContents, LayerFlags, LayerGeometry, LayerImage, LayerState,
};
pub use store::{LayerBackend, LayerTree, LayerTreeConfig};
pub use traverse::Children;
