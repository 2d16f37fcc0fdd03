// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile grid arithmetic shared by the local and remote backing stores.

use alloc::vec::Vec;

use kurbo::{Rect, Size};

/// Tile grid parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilingConfig {
    /// Maximum tile edge length in pixels.
    pub tile_dimension: f64,
    /// Stale tiles are only deleted while the store holds more than this
    /// many tiles.
    pub erase_threshold: usize,
}

impl TilingConfig {
    /// 1024-pixel tiles; keep up to six stale tiles around for reuse.
    pub const DEFAULT: Self = Self {
        tile_dimension: 1024.0,
        erase_threshold: 6,
    };

    /// Creates a config with the given tile edge and the default threshold.
    #[must_use]
    pub const fn with_tile_dimension(tile_dimension: f64) -> Self {
        Self {
            tile_dimension,
            ..Self::DEFAULT
        }
    }

    /// Tile size clamped to what a texture of `max_texture` can hold.
    #[must_use]
    pub fn tile_size(&self, max_texture: Size) -> Size {
        Size::new(
            self.tile_dimension.min(max_texture.width).max(1.0),
            self.tile_dimension.min(max_texture.height).max(1.0),
        )
    }
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Partitions a `content` area into row-major tiles of at most `tile`.
///
/// Edge tiles are clipped to the content, so their size may be smaller.
#[must_use]
pub fn tile_rects(content: Size, tile: Size) -> Vec<Rect> {
    let mut out = Vec::new();
    if content.width <= 0.0 || content.height <= 0.0 || tile.width <= 0.0 || tile.height <= 0.0 {
        return out;
    }
    let mut y = 0.0;
    while y < content.height {
        let h = tile.height.min(content.height - y);
        let mut x = 0.0;
        while x < content.width {
            let w = tile.width.min(content.width - x);
            out.push(Rect::new(x, y, x + w, y + h));
            x += tile.width;
        }
        y += tile.height;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_multiple_has_full_tiles() {
        let tiles = tile_rects(Size::new(2048.0, 1024.0), Size::new(1024.0, 1024.0));
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1], Rect::new(1024.0, 0.0, 2048.0, 1024.0));
    }

    #[test]
    fn partial_row_adds_thin_tiles() {
        let tiles = tile_rects(Size::new(2048.0, 1030.0), Size::new(1024.0, 1024.0));
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[2], Rect::new(0.0, 1024.0, 1024.0, 1030.0));
        assert_eq!(tiles[3].height(), 6.0);
    }

    #[test]
    fn empty_content_has_no_tiles() {
        assert!(tile_rects(Size::ZERO, Size::new(256.0, 256.0)).is_empty());
    }

    #[test]
    fn tile_size_respects_texture_limit() {
        let cfg = TilingConfig::DEFAULT;
        assert_eq!(cfg.tile_size(Size::new(512.0, 4096.0)), Size::new(512.0, 1024.0));
    }
}
