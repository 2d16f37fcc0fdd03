// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One rectangle of a layer's content and the texture that holds it.

use kurbo::{Point, Rect};
use lamina_core::pixels::PixelBuffer;
use lamina_core::transform::Transform3d;

use crate::texture::{MaskInput, TextureId, TextureMapper};

/// Outcome of uploading into a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileUpload {
    /// The dirty rect missed the tile.
    Skipped,
    /// Pixels were copied.
    Uploaded,
    /// No texture could be allocated; the tile paints nothing.
    Exhausted,
}

/// A content tile in layer space.
///
/// The texture is allocated lazily on first upload and is reset whenever
/// the tile's rect, size or alpha requirement changes.
#[derive(Debug)]
pub struct Tile {
    rect: Rect,
    texture: Option<TextureId>,
    needs_reset: bool,
}

impl Tile {
    /// Creates a tile covering `rect` with no texture.
    #[must_use]
    pub const fn new(rect: Rect) -> Self {
        Self {
            rect,
            texture: None,
            needs_reset: false,
        }
    }

    /// The tile rect in content space.
    #[must_use]
    pub const fn rect(&self) -> Rect {
        self.rect
    }

    /// The tile's texture, if allocated.
    #[must_use]
    pub const fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Moves the tile to `rect`; the texture is reset on the next upload.
    pub fn set_rect(&mut self, rect: Rect) {
        if self.rect != rect {
            self.rect = rect;
            self.needs_reset = true;
        }
    }

    /// Adopts a texture allocated by the owning store.
    pub(crate) fn set_texture(&mut self, texture: TextureId) {
        self.texture = Some(texture);
        self.needs_reset = false;
    }

    /// Copies the part of `source` that overlaps the tile.
    ///
    /// `source`'s top-left pixel corresponds to `dirty_rect`'s origin in
    /// content space.
    pub fn update_contents(
        &mut self,
        mapper: &mut dyn TextureMapper,
        source: &PixelBuffer,
        dirty_rect: Rect,
        has_alpha: bool,
    ) -> TileUpload {
        let target = self.rect.intersect(dirty_rect);
        if target.is_zero_area() {
            return TileUpload::Skipped;
        }
        let source_rect = target - dirty_rect.origin().to_vec2();
        let local = target - self.rect.origin().to_vec2();
        let size = self.rect.size();

        let texture = match self.texture {
            Some(texture) => texture,
            None => {
                let Some(texture) = mapper.create_texture(size, has_alpha) else {
                    return TileUpload::Exhausted;
                };
                self.texture = Some(texture);
                self.needs_reset = false;
                texture
            }
        };
        if self.needs_reset
            || mapper.texture_size(texture) != Some(size)
            || mapper.texture_has_alpha(texture) != has_alpha
        {
            mapper.reset_texture(texture, size, has_alpha);
            self.needs_reset = false;
        }
        mapper.update_texture(texture, source, source_rect, Point::new(local.x0, local.y0));
        TileUpload::Uploaded
    }

    /// Draws the tile's texture at its rect.
    pub fn paint(
        &self,
        mapper: &mut dyn TextureMapper,
        transform: &Transform3d,
        opacity: f32,
        mask: Option<&MaskInput>,
    ) {
        if let Some(texture) = self.texture {
            mapper.draw_texture(texture, self.rect, transform, opacity, mask);
        }
    }

    /// Frees the texture.
    pub fn release(&mut self, mapper: &mut dyn TextureMapper) {
        if let Some(texture) = self.texture.take() {
            mapper.release_texture(texture);
        }
    }
}
