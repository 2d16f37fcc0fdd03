// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference-counted image backings on the content side.
//!
//! Layers showing the same image (by key) share one backing. The backing is
//! created and uploaded when the first layer shows the image and removed when
//! the last one stops.

use std::collections::BTreeMap;

use lamina_core::layer::{LayerId, LayerImage};
use lamina_core::pixels::PixelBuffer;

use crate::command::{CommandBatch, ImageBackingId, SyncCommand};

/// Images larger than this in either dimension are painted into the layer's
/// tiles instead of getting a backing.
pub const MAX_IMAGE_DIMENSION: u32 = 2000;

/// Returns `true` if `pixels` fits within `max_dimension` on both axes and
/// is not empty.
#[must_use]
pub fn is_directly_compositable(pixels: &PixelBuffer, max_dimension: u32) -> bool {
    let (w, h) = (pixels.width(), pixels.height());
    w > 0 && h > 0 && w <= max_dimension && h <= max_dimension
}

#[derive(Debug)]
struct Entry {
    id: ImageBackingId,
    refs: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ImageBackings {
    by_key: BTreeMap<u64, Entry>,
    by_layer: BTreeMap<LayerId, u64>,
    next_id: u64,
}

impl ImageBackings {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of live backings.
    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    /// The backing `layer` currently shows.
    pub(crate) fn backing_of(&self, layer: LayerId) -> Option<ImageBackingId> {
        let key = self.by_layer.get(&layer)?;
        self.by_key.get(key).map(|e| e.id)
    }

    /// Points `layer` at `image`, creating or releasing backings as needed.
    pub(crate) fn set_layer_image(
        &mut self,
        layer: LayerId,
        image: Option<&LayerImage>,
        batch: &mut CommandBatch,
    ) -> Option<ImageBackingId> {
        let new_key = image.map(|i| i.key);
        if self.by_layer.get(&layer).copied() == new_key {
            return self.backing_of(layer);
        }
        self.remove_layer(layer, batch);
        let image = image?;

        let entry = self.by_key.entry(image.key).or_insert_with(|| {
            let id = ImageBackingId(self.next_id);
            self.next_id += 1;
            batch.push(SyncCommand::CreateImageBacking(id));
            batch.push(SyncCommand::UpdateImageBacking {
                image: id,
                buffer: image.pixels.clone(),
            });
            Entry { id, refs: 0 }
        });
        entry.refs += 1;
        self.by_layer.insert(layer, image.key);
        Some(entry.id)
    }

    /// Drops `layer`'s reference, removing the backing if it was the last.
    pub(crate) fn remove_layer(&mut self, layer: LayerId, batch: &mut CommandBatch) {
        let Some(key) = self.by_layer.remove(&layer) else {
            return;
        };
        let Some(entry) = self.by_key.get_mut(&key) else {
            return;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            batch.push(SyncCommand::RemoveImageBacking(entry.id));
            self.by_key.remove(&key);
        }
    }

    /// Forgets every backing without emitting removals; the renderer already
    /// dropped them.
    pub(crate) fn forget_all(&mut self) {
        self.by_key.clear();
        self.by_layer.clear();
    }
}
