// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What a [`LayerTree`](super::LayerTree) flush hands to the sync pass.

use alloc::vec::Vec;

use super::id::LayerId;
use crate::dirty::ChangeMask;

/// The set of changes produced by a single
/// [`LayerTree::take_changes`](super::LayerTree::take_changes) call.
///
/// Layers whose change mask is empty are not listed: a sync pass only visits
/// what changed.
#[derive(Clone, Debug, Default)]
pub struct TreeChanges {
    /// Layers created since the last flush and still alive.
    pub added: Vec<LayerId>,
    /// Layers destroyed since the last flush that the previous flush
    /// reported. Handles are stale; use them as keys only.
    pub removed: Vec<LayerId>,
    /// Live layers with pending changes, in slot order.
    pub changed: Vec<(LayerId, ChangeMask)>,
    /// Animations that started, with their start time.
    pub animation_starts: Vec<(LayerId, f64)>,
    /// Whether a child list changed or a layer was created or destroyed.
    pub topology_changed: bool,
}

impl TreeChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.changed.clear();
        self.animation_starts.clear();
        self.topology_changed = false;
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.animation_starts.is_empty()
            && !self.topology_changed
    }

    /// Returns the change mask recorded for `id`, if any.
    #[must_use]
    pub fn mask_of(&self, id: LayerId) -> Option<ChangeMask> {
        self.changed
            .iter()
            .find(|(changed, _)| *changed == id)
            .map(|(_, mask)| *mask)
    }

    /// Expands change masks into per-field trace records.
    #[cfg(feature = "trace-rich")]
    #[must_use]
    pub fn layer_changes(&self) -> Vec<crate::trace::LayerChange> {
        use crate::trace::{LayerChange, LayerField};

        const FIELDS: [(ChangeMask, LayerField); 8] = [
            (ChangeMask::GEOMETRY, LayerField::Geometry),
            (ChangeMask::OPACITY, LayerField::Opacity),
            (
                ChangeMask::CONTENTS.union(ChangeMask::BACKGROUND_COLOR),
                LayerField::Contents,
            ),
            (ChangeMask::FLAGS, LayerField::Flags),
            (
                ChangeMask::MASK.union(ChangeMask::REPLICA),
                LayerField::Effects,
            ),
            (ChangeMask::FILTERS, LayerField::Filters),
            (ChangeMask::ANIMATIONS, LayerField::Animations),
            (ChangeMask::CHILDREN, LayerField::Children),
        ];

        let mut out = Vec::new();
        for &(id, mask) in &self.changed {
            for (bits, field) in FIELDS {
                if mask.intersects(bits) {
                    out.push(LayerChange {
                        layer_index: id.index(),
                        field,
                    });
                }
            }
        }
        out
    }
}
