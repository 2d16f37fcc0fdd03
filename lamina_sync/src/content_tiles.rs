// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The content-side tile grid of one layer.
//!
//! The grid mirrors the renderer's remote backing store by tile id. Damage
//! is painted once per dirty rect and the resulting buffer is shared by
//! every tile update it overlaps.

use std::sync::Arc;

use kurbo::{Point, Rect, Size};
use lamina_core::layer::{LayerId, LayerImage};
use lamina_core::pixels::PixelBuffer;
use lamina_core::tiling::tile_rects;

use crate::command::{CommandBatch, SyncCommand, TileId, TileUpdate};

#[derive(Debug, Default)]
pub(crate) struct ContentTiles {
    size: Size,
    tiles: Vec<(TileId, Rect)>,
    next_id: u32,
}

impl ContentTiles {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Lays out the grid for `size`. Tiles whose rect survives keep their id.
    ///
    /// Returns `true` if any tile was created, in which case the whole
    /// layer must be repainted.
    pub(crate) fn resize(
        &mut self,
        layer: LayerId,
        size: Size,
        tile_size: Size,
        batch: &mut CommandBatch,
    ) -> bool {
        if size == self.size && !self.tiles.is_empty() {
            return false;
        }
        self.size = size;
        let mut wanted = tile_rects(size, tile_size);
        let mut kept = Vec::with_capacity(wanted.len());
        for (id, rect) in self.tiles.drain(..) {
            match wanted.iter().position(|r| *r == rect) {
                Some(pos) => {
                    wanted.remove(pos);
                    kept.push((id, rect));
                }
                None => batch.push(SyncCommand::RemoveTile { layer, tile: id }),
            }
        }
        let created = !wanted.is_empty();
        for rect in wanted {
            let id = TileId(self.next_id);
            self.next_id += 1;
            batch.push(SyncCommand::CreateTile {
                layer,
                tile: id,
                scale: 1.0,
            });
            kept.push((id, rect));
        }
        self.tiles = kept;
        created
    }

    /// Paints each dirty rect through `paint` and sends the pixels to every
    /// tile it overlaps. Returns the number of tile updates.
    pub(crate) fn update(
        &mut self,
        layer: LayerId,
        dirty: &[Rect],
        mut paint: impl FnMut(Rect, &mut PixelBuffer),
        batch: &mut CommandBatch,
    ) -> usize {
        let mut updates = 0;
        for &rect in dirty {
            let mut buffer = PixelBuffer::for_size(rect.size());
            paint(rect, &mut buffer);
            let buffer = Arc::new(buffer);
            for &(id, tile_rect) in &self.tiles {
                let overlap = rect.intersect(tile_rect);
                if overlap.is_zero_area() {
                    continue;
                }
                batch.push(SyncCommand::UpdateTile {
                    layer,
                    tile: id,
                    update: TileUpdate {
                        source_rect: overlap - rect.origin().to_vec2(),
                        tile_rect,
                        buffer: buffer.clone(),
                        offset: Point::new(overlap.x0 - tile_rect.x0, overlap.y0 - tile_rect.y0),
                    },
                });
                updates += 1;
            }
        }
        updates
    }

    /// Removes every tile.
    pub(crate) fn clear(&mut self, layer: LayerId, batch: &mut CommandBatch) {
        for (id, _) in self.tiles.drain(..) {
            batch.push(SyncCommand::RemoveTile { layer, tile: id });
        }
        self.size = Size::ZERO;
    }
}

/// Draws `image` stretched over `contents_rect` into `buffer`, whose
/// top-left pixel is `dirty`'s origin. Nearest sampling.
#[expect(
    clippy::cast_possible_truncation,
    reason = "sample points lie inside the contents rect, so coordinates fit the image"
)]
pub(crate) fn draw_image(
    buffer: &mut PixelBuffer,
    dirty: Rect,
    image: &LayerImage,
    contents_rect: Rect,
) {
    let pixels = &image.pixels;
    if contents_rect.is_zero_area() || pixels.is_empty() {
        return;
    }
    let sx = f64::from(pixels.width()) / contents_rect.width();
    let sy = f64::from(pixels.height()) / contents_rect.height();
    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            let p = Point::new(
                dirty.x0 + f64::from(x) + 0.5,
                dirty.y0 + f64::from(y) + 0.5,
            );
            if !contents_rect.contains(p) {
                continue;
            }
            let u = ((p.x - contents_rect.x0) * sx) as u32;
            let v = ((p.y - contents_rect.y0) * sy) as u32;
            buffer.set(x, y, pixels.get(u, v));
        }
    }
}
