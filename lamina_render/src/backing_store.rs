// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A layer's rasterized content held as a grid of tiles.
//!
//! Resizing diffs the wanted tile rects against the current tiles. Exact
//! matches are kept; other wanted rects recycle a stale tile before a new
//! one is allocated. Stale tiles left over are only destroyed while the
//! store holds more than the erase threshold, so a layer that oscillates by
//! a few pixels reuses the same tile objects instead of churning them.
//! Retained stale tiles are parked as spares and are not painted.

use alloc::vec::Vec;

use kurbo::{Rect, Size};
use lamina_core::pixels::PixelBuffer;
use lamina_core::tiling::{TilingConfig, tile_rects};
use lamina_core::transform::Transform3d;

use crate::texture::{MaskInput, TextureId, TextureMapper};
use crate::tile::{Tile, TileUpload};

/// What a resize did to the tile set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileChurn {
    /// Tiles whose rect was already wanted.
    pub kept: usize,
    /// Stale tiles given a new rect.
    pub recycled: usize,
    /// Tiles allocated.
    pub created: usize,
    /// Stale tiles destroyed.
    pub removed: usize,
}

/// Counts from one [`TiledBackingStore::update_contents`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Tiles that received pixels.
    pub uploaded: usize,
    /// Tiles left blank because no texture could be allocated.
    pub exhausted: usize,
}

/// Tiled texture storage for one layer.
#[derive(Debug)]
pub struct TiledBackingStore {
    config: TilingConfig,
    size: Size,
    tiles: Vec<Tile>,
    spares: Vec<Tile>,
}

impl TiledBackingStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new(config: TilingConfig) -> Self {
        Self {
            config,
            size: Size::ZERO,
            tiles: Vec::new(),
            spares: Vec::new(),
        }
    }

    /// Content size the tiles cover.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// The content rect at the origin.
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.size.to_rect()
    }

    /// Tiles in paint order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Tiles alive, painted or parked.
    #[must_use]
    pub fn live_tile_count(&self) -> usize {
        self.tiles.len() + self.spares.len()
    }

    /// Rebuilds the tile grid for `content_size`. No-op if the size is
    /// unchanged.
    pub fn resize_or_rebuild(
        &mut self,
        mapper: &mut dyn TextureMapper,
        content_size: Size,
        has_alpha: bool,
    ) -> TileChurn {
        let mut churn = TileChurn::default();
        if content_size == self.size {
            return churn;
        }
        self.size = content_size;
        let tile_size = self.config.tile_size(mapper.max_texture_size());
        let mut wanted = tile_rects(content_size, tile_size);

        // Split current tiles into those that stay and those that are stale.
        let mut stale = core::mem::take(&mut self.spares);
        let mut kept = Vec::with_capacity(self.tiles.len());
        for tile in self.tiles.drain(..) {
            match wanted.iter().position(|r| *r == tile.rect()) {
                Some(pos) => {
                    wanted.remove(pos);
                    kept.push(tile);
                }
                None => stale.push(tile),
            }
        }
        churn.kept = kept.len();

        for rect in wanted {
            match stale.pop() {
                Some(mut tile) => {
                    tile.set_rect(rect);
                    if let Some(texture) = tile.texture() {
                        mapper.reset_texture(texture, rect.size(), has_alpha);
                    }
                    kept.push(tile);
                    churn.recycled += 1;
                }
                None => {
                    kept.push(Tile::new(rect));
                    churn.created += 1;
                }
            }
        }

        // Keep the grid in row-major order so paint order is stable.
        kept.sort_by(|a, b| {
            let (ra, rb) = (a.rect(), b.rect());
            ra.y0.total_cmp(&rb.y0).then(ra.x0.total_cmp(&rb.x0))
        });
        self.tiles = kept;

        while !stale.is_empty() && self.tiles.len() + stale.len() > self.config.erase_threshold {
            if let Some(mut tile) = stale.pop() {
                tile.release(mapper);
                churn.removed += 1;
            }
        }
        self.spares = stale;
        churn
    }

    /// Uploads `source`, whose top-left pixel is `dirty_rect`'s origin in
    /// content space, into every tile it overlaps.
    pub fn update_contents(
        &mut self,
        mapper: &mut dyn TextureMapper,
        source: &PixelBuffer,
        dirty_rect: Rect,
        has_alpha: bool,
    ) -> UploadStats {
        let mut stats = UploadStats::default();
        for tile in &mut self.tiles {
            match tile.update_contents(mapper, source, dirty_rect, has_alpha) {
                TileUpload::Uploaded => stats.uploaded += 1,
                TileUpload::Exhausted => stats.exhausted += 1,
                TileUpload::Skipped => {}
            }
        }
        stats
    }

    /// Draws every tile with a texture, stretching the content rect over
    /// `target_rect`.
    pub fn paint(
        &self,
        mapper: &mut dyn TextureMapper,
        target_rect: Rect,
        transform: &Transform3d,
        opacity: f32,
        mask: Option<&MaskInput>,
    ) {
        if self.tiles.is_empty() {
            return;
        }
        let adjusted = *transform * Transform3d::rect_to_rect(self.rect(), target_rect);
        for tile in &self.tiles {
            tile.paint(mapper, &adjusted, opacity, mask);
        }
    }

    /// The first tile's texture and rect, used when the store serves as a
    /// mask.
    #[must_use]
    pub fn mask_texture(&self) -> Option<(TextureId, Rect)> {
        let tile = self.tiles.first()?;
        Some((tile.texture()?, tile.rect()))
    }

    /// Frees every texture and forgets the size.
    pub fn release(&mut self, mapper: &mut dyn TextureMapper) {
        for tile in self.tiles.iter_mut().chain(self.spares.iter_mut()) {
            tile.release(mapper);
        }
        self.tiles.clear();
        self.spares.clear();
        self.size = Size::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RecordingTextureMapper;

    fn store(dim: f64) -> TiledBackingStore {
        TiledBackingStore::new(TilingConfig::with_tile_dimension(dim))
    }

    fn area(rects: impl Iterator<Item = Rect>) -> f64 {
        rects.map(|r| r.area()).sum()
    }

    #[test]
    fn tiles_cover_content_exactly() {
        let mut m = RecordingTextureMapper::new();
        for (w, h) in [(50.0, 30.0), (100.0, 100.0), (250.0, 130.0), (301.0, 99.0)] {
            let mut s = store(100.0);
            s.resize_or_rebuild(&mut m, Size::new(w, h), true);
            let rects: Vec<Rect> = s.tiles().iter().map(Tile::rect).collect();
            let bounds = rects.iter().copied().reduce(|a, b| a.union(b)).unwrap();
            assert_eq!(bounds, Rect::new(0.0, 0.0, w, h));
            assert!((area(rects.iter().copied()) - w * h).abs() < 1e-9, "no overlap");
            for (i, a) in rects.iter().enumerate() {
                for b in &rects[i + 1..] {
                    assert!(a.intersect(*b).is_zero_area(), "{a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn zero_size_has_no_tiles() {
        let mut m = RecordingTextureMapper::new();
        let mut s = store(100.0);
        s.resize_or_rebuild(&mut m, Size::new(0.0, 50.0), true);
        assert!(s.tiles().is_empty());
    }

    #[test]
    fn wide_layer_grid() {
        let mut m = RecordingTextureMapper::new();
        let mut s = store(1024.0);
        s.resize_or_rebuild(&mut m, Size::new(2048.0, 1030.0), true);
        let rects: Vec<Rect> = s.tiles().iter().map(Tile::rect).collect();
        assert_eq!(
            rects,
            alloc::vec![
                Rect::new(0.0, 0.0, 1024.0, 1024.0),
                Rect::new(1024.0, 0.0, 2048.0, 1024.0),
                Rect::new(0.0, 1024.0, 1024.0, 1030.0),
                Rect::new(1024.0, 1024.0, 2048.0, 1030.0),
            ]
        );
    }

    #[test]
    fn small_resize_recycles_and_keeps_threshold() {
        let mut m = RecordingTextureMapper::new();
        let mut s = store(100.0);
        // 3×3 grid with a thin last row and column.
        s.resize_or_rebuild(&mut m, Size::new(250.0, 250.0), true);
        assert_eq!(s.live_tile_count(), 9);
        let churn = s.resize_or_rebuild(&mut m, Size::new(251.0, 250.0), true);
        // The last column changed width: 3 stale, 3 wanted.
        assert_eq!(churn.kept, 6);
        assert_eq!(churn.recycled, 3);
        assert_eq!(churn.created, 0);
        assert_eq!(churn.removed, 0);

        let churn = s.resize_or_rebuild(&mut m, Size::new(150.0, 150.0), true);
        assert_eq!(churn.kept, 1);
        assert_eq!(s.tiles().len(), 4);
        assert!(s.live_tile_count() >= TilingConfig::DEFAULT.erase_threshold);
        assert!(churn.recycled >= 3);
    }

    #[test]
    fn spares_are_reused_later() {
        let mut m = RecordingTextureMapper::new();
        let mut s = store(100.0);
        s.resize_or_rebuild(&mut m, Size::new(300.0, 300.0), true);
        s.resize_or_rebuild(&mut m, Size::new(100.0, 100.0), true);
        assert_eq!(s.tiles().len(), 1);
        assert_eq!(s.live_tile_count(), 6);
        let churn = s.resize_or_rebuild(&mut m, Size::new(300.0, 100.0), true);
        assert_eq!(churn.recycled, 2);
        assert_eq!(churn.created, 0);
    }

    #[test]
    fn same_size_is_noop() {
        let mut m = RecordingTextureMapper::new();
        let mut s = store(100.0);
        s.resize_or_rebuild(&mut m, Size::new(120.0, 80.0), true);
        let churn = s.resize_or_rebuild(&mut m, Size::new(120.0, 80.0), true);
        assert_eq!(churn, TileChurn::default());
    }

    #[test]
    fn update_and_paint_touch_overlapping_tiles() {
        let mut m = RecordingTextureMapper::new();
        let mut s = store(100.0);
        s.resize_or_rebuild(&mut m, Size::new(200.0, 100.0), true);
        let buffer = PixelBuffer::new(20, 20);
        let stats = s.update_contents(&mut m, &buffer, Rect::new(90.0, 10.0, 110.0, 30.0), true);
        assert_eq!(stats.uploaded, 2);
        let stats = s.update_contents(&mut m, &buffer, Rect::new(0.0, 0.0, 20.0, 20.0), true);
        assert_eq!(stats.uploaded, 1);

        s.paint(&mut m, Rect::new(0.0, 0.0, 200.0, 100.0), &Transform3d::IDENTITY, 1.0, None);
        assert_eq!(m.plan().items.len(), 2);
    }

    #[test]
    fn paint_stretches_to_target_rect() {
        let mut m = RecordingTextureMapper::new();
        let mut s = store(100.0);
        s.resize_or_rebuild(&mut m, Size::new(50.0, 50.0), true);
        let buffer = PixelBuffer::new(50, 50);
        s.update_contents(&mut m, &buffer, s.rect(), true);
        s.paint(&mut m, Rect::new(0.0, 0.0, 100.0, 100.0), &Transform3d::IDENTITY, 1.0, None);
        let item = &m.plan().items[0];
        let mapped = item.transform.map_rect(item.rect);
        assert_eq!(mapped, Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn release_frees_textures() {
        let mut m = RecordingTextureMapper::new();
        let mut s = store(100.0);
        s.resize_or_rebuild(&mut m, Size::new(200.0, 200.0), true);
        let buffer = PixelBuffer::new(200, 200);
        s.update_contents(&mut m, &buffer, s.rect(), true);
        assert_eq!(m.live_textures(), 4);
        s.release(&mut m);
        assert_eq!(m.live_textures(), 0);
        assert!(s.tiles().is_empty());
    }
}
