// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A backing store whose tiles are created, updated and removed by id from
//! the other side of the sync protocol.
//!
//! Updates are staged: [`update_tile`](RemoteBackingStore::update_tile)
//! only records the buffer, and [`commit`](RemoteBackingStore::commit)
//! uploads every staged buffer once per frame. Several updates to one tile
//! within a frame are applied together, in arrival order, at that commit.
//! Removals are deferred to the same commit.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::{Point, Rect, Size};
use lamina_core::pixels::PixelBuffer;
use lamina_core::transform::Transform3d;

use crate::texture::{MaskInput, TextureId, TextureMapper};
use crate::tile::Tile;

/// Tiles at another scale are hidden under current-scale tiles once opacity
/// drops below this.
const PREVIOUS_SCALE_OPACITY: f32 = 0.95;

/// A pixel update waiting for the next commit.
#[derive(Clone, Debug)]
pub struct StagedUpdate {
    /// Shared pixels from the content side.
    pub buffer: Arc<PixelBuffer>,
    /// Rect to read from `buffer`.
    pub source_rect: Rect,
    /// The tile's rect in content pixels at the tile's scale.
    pub tile_rect: Rect,
    /// Where `source_rect` lands inside the tile.
    pub offset: Point,
}

#[derive(Debug)]
struct RemoteTile {
    tile: Tile,
    scale: f64,
    staged: Vec<StagedUpdate>,
}

impl RemoteTile {
    /// Uploads the staged buffers, oldest first.
    ///
    /// The newest update decides the tile's rect. Older updates laid out
    /// against a different rect are dropped.
    fn swap_buffers(&mut self, mapper: &mut dyn TextureMapper) -> bool {
        let staged = core::mem::take(&mut self.staged);
        let Some(last) = staged.last() else {
            return false;
        };
        let tile_rect = last.tile_rect;
        let has_alpha = staged.iter().any(|u| u.buffer.has_alpha());
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        let rect = Rect::new(
            tile_rect.x0 / scale,
            tile_rect.y0 / scale,
            tile_rect.x1 / scale,
            tile_rect.y1 / scale,
        );
        let mut should_reset = self.tile.rect() != rect;
        self.tile.set_rect(rect);
        let size = tile_rect.size();
        let texture = match self.tile.texture() {
            Some(texture) => texture,
            None => {
                let Some(texture) = mapper.create_texture(size, has_alpha) else {
                    return false;
                };
                self.tile.set_texture(texture);
                should_reset = true;
                texture
            }
        };
        // An opaque patch can land in a texture with alpha without a reset.
        if should_reset
            || mapper.texture_size(texture) != Some(size)
            || (has_alpha && !mapper.texture_has_alpha(texture))
        {
            mapper.reset_texture(texture, size, has_alpha);
        }
        for update in staged.iter().filter(|u| u.tile_rect == tile_rect) {
            mapper.update_texture(texture, &update.buffer, update.source_rect, update.offset);
        }
        true
    }
}

/// Counts from one [`RemoteBackingStore::commit`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Tiles uploaded.
    pub updated: u32,
    /// Tiles destroyed.
    pub removed: u32,
}

/// Id-keyed tile storage fed by remote tile commands.
#[derive(Debug, Default)]
pub struct RemoteBackingStore {
    tiles: BTreeMap<u32, RemoteTile>,
    to_remove: BTreeSet<u32>,
    size: Size,
    scale: f64,
}

impl RemoteBackingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            ..Self::default()
        }
    }

    /// Returns `true` if the store has no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of tiles, including ones pending removal.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Content size in layer space.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Sets the content size the tiles are laid out in.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    /// Creates tile `id` at `scale`; the newest scale becomes current.
    pub fn create_tile(&mut self, id: u32, scale: f64) {
        self.scale = scale;
        self.to_remove.remove(&id);
        self.tiles.insert(
            id,
            RemoteTile {
                tile: Tile::new(Rect::ZERO),
                scale,
                staged: Vec::new(),
            },
        );
    }

    /// Marks tile `id` for removal at the next commit.
    pub fn remove_tile(&mut self, id: u32) {
        self.to_remove.insert(id);
    }

    /// Frees every tile now.
    pub fn remove_all_tiles(&mut self, mapper: &mut dyn TextureMapper) {
        for (_, mut remote) in core::mem::take(&mut self.tiles) {
            remote.tile.release(mapper);
        }
        self.to_remove.clear();
    }

    /// Stages an update for tile `id`. Unknown ids are ignored.
    pub fn update_tile(&mut self, id: u32, update: StagedUpdate) -> bool {
        match self.tiles.get_mut(&id) {
            Some(remote) => {
                remote.staged.push(update);
                true
            }
            None => false,
        }
    }

    /// Applies deferred removals and uploads staged updates.
    pub fn commit(&mut self, mapper: &mut dyn TextureMapper) -> CommitStats {
        let mut stats = CommitStats::default();
        for id in core::mem::take(&mut self.to_remove) {
            if let Some(mut remote) = self.tiles.remove(&id) {
                remote.tile.release(mapper);
                stats.removed += 1;
            }
        }
        for remote in self.tiles.values_mut() {
            if remote.swap_buffers(mapper) {
                stats.updated += 1;
            }
        }
        stats
    }

    /// Draws tiles, stretching the content rect over `target_rect`.
    ///
    /// Tiles from a previous scale are drawn first, under current-scale
    /// tiles, and are dropped where they would show through translucent
    /// current tiles.
    pub fn paint(
        &self,
        mapper: &mut dyn TextureMapper,
        target_rect: Rect,
        transform: &Transform3d,
        opacity: f32,
        mask: Option<&MaskInput>,
    ) {
        if self.tiles.is_empty() || self.size.is_zero_area() {
            return;
        }
        let mut current = Vec::new();
        let mut covered: Option<Rect> = None;
        for remote in self.tiles.values() {
            if remote.tile.texture().is_some() && remote.scale == self.scale {
                let rect = remote.tile.rect();
                covered = Some(covered.map_or(rect, |c| c.union(rect)));
                current.push(&remote.tile);
            }
        }
        let previous: Vec<&Tile> = self
            .tiles
            .values()
            .filter(|r| r.tile.texture().is_some() && r.scale != self.scale)
            .filter(|r| {
                opacity >= PREVIOUS_SCALE_OPACITY
                    || covered.is_none_or(|c| c.intersect(r.tile.rect()).is_zero_area())
            })
            .map(|r| &r.tile)
            .collect();
        let adjusted = *transform * Transform3d::rect_to_rect(self.size.to_rect(), target_rect);
        for tile in previous.into_iter().chain(current) {
            tile.paint(mapper, &adjusted, opacity, mask);
        }
    }

    /// The lowest-id tile's texture and rect, used when the store serves as
    /// a mask.
    #[must_use]
    pub fn mask_texture(&self) -> Option<(TextureId, Rect)> {
        let remote = self.tiles.values().next()?;
        Some((remote.tile.texture()?, remote.tile.rect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RecordingTextureMapper;
    use crate::software::SoftwareTextureMapper;
    use lamina_core::color::Color;

    fn update(tile_rect: Rect) -> StagedUpdate {
        let (w, h) = (tile_rect.width() as u32, tile_rect.height() as u32);
        StagedUpdate {
            buffer: Arc::new(PixelBuffer::filled(w, h, Color::WHITE)),
            source_rect: Rect::new(0.0, 0.0, f64::from(w), f64::from(h)),
            tile_rect,
            offset: Point::ZERO,
        }
    }

    #[test]
    fn updates_wait_for_commit() {
        let mut m = RecordingTextureMapper::new();
        let mut s = RemoteBackingStore::new();
        s.set_size(Size::new(100.0, 100.0));
        s.create_tile(1, 1.0);
        assert!(s.update_tile(1, update(Rect::new(0.0, 0.0, 100.0, 100.0))));
        assert!(s.update_tile(1, update(Rect::new(0.0, 0.0, 100.0, 100.0))));
        assert_eq!(m.uploads(), 0);
        let stats = s.commit(&mut m);
        assert_eq!(stats.updated, 1);
        assert_eq!(m.uploads(), 2);
        assert!(s.mask_texture().is_some());

        // Nothing left to upload on the next frame.
        assert_eq!(s.commit(&mut m).updated, 0);
        assert_eq!(m.uploads(), 2);
    }

    fn patch(at: Point) -> StagedUpdate {
        StagedUpdate {
            buffer: Arc::new(PixelBuffer::filled(10, 10, Color::WHITE)),
            source_rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            tile_rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            offset: at,
        }
    }

    #[test]
    fn partial_updates_in_one_frame_all_land() {
        let mut m = SoftwareTextureMapper::new(100, 100);
        let mut s = RemoteBackingStore::new();
        s.set_size(Size::new(100.0, 100.0));
        s.create_tile(1, 1.0);
        s.update_tile(1, patch(Point::ZERO));
        s.update_tile(1, patch(Point::new(50.0, 50.0)));
        assert_eq!(s.commit(&mut m).updated, 1);

        let (texture, _) = s.mask_texture().unwrap();
        let pixels = m.texture_pixels(texture).unwrap();
        let white = Color::WHITE.premultiply();
        assert_eq!(pixels.get(5, 5), white);
        assert_eq!(pixels.get(55, 55), white);
        assert_eq!(pixels.get(30, 30).a, 0);
    }

    #[test]
    fn later_frame_keeps_earlier_pixels() {
        let mut m = SoftwareTextureMapper::new(100, 100);
        let mut s = RemoteBackingStore::new();
        s.set_size(Size::new(100.0, 100.0));
        s.create_tile(1, 1.0);
        s.update_tile(1, patch(Point::ZERO));
        s.commit(&mut m);
        s.update_tile(1, patch(Point::new(50.0, 50.0)));
        s.commit(&mut m);

        let (texture, _) = s.mask_texture().unwrap();
        let pixels = m.texture_pixels(texture).unwrap();
        assert_eq!(pixels.get(5, 5), Color::WHITE.premultiply());
        assert_eq!(pixels.get(55, 55), Color::WHITE.premultiply());
    }

    #[test]
    fn unknown_tile_update_is_ignored() {
        let mut s = RemoteBackingStore::new();
        assert!(!s.update_tile(7, update(Rect::new(0.0, 0.0, 1.0, 1.0))));
    }

    #[test]
    fn removal_is_deferred() {
        let mut m = RecordingTextureMapper::new();
        let mut s = RemoteBackingStore::new();
        s.set_size(Size::new(10.0, 10.0));
        s.create_tile(1, 1.0);
        s.update_tile(1, update(Rect::new(0.0, 0.0, 10.0, 10.0)));
        s.commit(&mut m);
        s.remove_tile(1);
        assert_eq!(s.tile_count(), 1);
        let stats = s.commit(&mut m);
        assert_eq!(stats.removed, 1);
        assert!(s.is_empty());
        assert_eq!(m.live_textures(), 0);
    }

    #[test]
    fn scaled_tiles_map_back_to_layer_space() {
        let mut m = RecordingTextureMapper::new();
        let mut s = RemoteBackingStore::new();
        s.set_size(Size::new(50.0, 50.0));
        s.create_tile(1, 2.0);
        s.update_tile(1, update(Rect::new(0.0, 0.0, 100.0, 100.0)));
        s.commit(&mut m);
        s.paint(&mut m, Rect::new(0.0, 0.0, 50.0, 50.0), &Transform3d::IDENTITY, 1.0, None);
        let item = &m.plan().items[0];
        assert_eq!(item.rect, Rect::new(0.0, 0.0, 50.0, 50.0));
    }

    #[test]
    fn previous_scale_hidden_when_translucent() {
        let mut m = RecordingTextureMapper::new();
        let mut s = RemoteBackingStore::new();
        s.set_size(Size::new(10.0, 10.0));
        s.create_tile(1, 1.0);
        s.update_tile(1, update(Rect::new(0.0, 0.0, 10.0, 10.0)));
        s.create_tile(2, 2.0);
        s.update_tile(2, update(Rect::new(0.0, 0.0, 20.0, 20.0)));
        s.commit(&mut m);

        s.paint(&mut m, Rect::new(0.0, 0.0, 10.0, 10.0), &Transform3d::IDENTITY, 1.0, None);
        assert_eq!(m.plan().items.len(), 2);
        m.begin_frame();
        s.paint(&mut m, Rect::new(0.0, 0.0, 10.0, 10.0), &Transform3d::IDENTITY, 0.5, None);
        assert_eq!(m.plan().items.len(), 1);
    }
}
