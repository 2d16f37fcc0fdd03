// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The contract between a [`LayerTree`] and whatever mirrors it.
//!
//! Two mirrors exist in the crate family:
//!
//! - **Direct**: `lamina_render`'s direct compositor copies changed layers
//!   straight into a compositing tree in the same thread, painting dirty
//!   content into tiled backing stores as it goes.
//! - **Coordinated**: `lamina_sync`'s coordinator encodes the same changes
//!   as protocol commands for a renderer that owns the textures, possibly on
//!   another thread.
//!
//! Both implement [`Presenter`], so a frame loop and its tests can be written
//! once against either.

use crate::layer::{LayerTree, TreeChanges};

/// Applies one flush worth of scene-graph changes to a mirror.
///
/// # Frame loop pseudocode
///
/// ```rust,ignore
/// fn on_frame(now: f64) {
///     // Mutate: layout code updates the scene graph.
///     tree.set_position(layer, point);
///     tree.set_needs_display(layer);
///
///     // Flush: collect what changed since the last frame.
///     let changes = tree.take_changes();
///
///     // Present: mirror the changes, then paint.
///     presenter.apply(&mut tree, &changes);
/// }
/// ```
pub trait Presenter {
    /// Mirrors `changes`, reading current values from `tree`.
    ///
    /// The tree is mutable so that dirty regions can be taken and content
    /// painted through the tree's client.
    fn apply(&mut self, tree: &mut LayerTree, changes: &TreeChanges);
}
