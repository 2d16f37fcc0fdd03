// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pooled offscreen surfaces for intermediate compositing passes.
//!
//! A surface is handed out to one owner at a time and goes back to the pool
//! on release instead of being destroyed. Pooled textures are matched by
//! size, so the pool is tied to the viewport size: changing it drops every
//! idle surface.

use alloc::vec::Vec;

use kurbo::Size;

use crate::texture::{TextureId, TextureMapper};

/// Idle surfaces unused for more than this many frames are freed by
/// [`SurfacePool::collect`].
const MAX_IDLE_FRAMES: u64 = 180;

#[derive(Debug)]
struct PoolEntry {
    texture: TextureId,
    size: Size,
    in_use: bool,
    last_used: u64,
}

/// An acquired surface. Return it with [`SurfacePool::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "surfaces must be released back to the pool"]
pub struct PooledSurface {
    texture: TextureId,
}

impl PooledSurface {
    /// The surface's texture.
    #[must_use]
    pub const fn texture(&self) -> TextureId {
        self.texture
    }
}

/// Reuses intermediate surfaces across frames.
#[derive(Debug, Default)]
pub struct SurfacePool {
    entries: Vec<PoolEntry>,
    viewport: Size,
    frame: u64,
}

impl SurfacePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pooled surfaces, idle or in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is pooled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of surfaces currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.entries.iter().filter(|e| e.in_use).count()
    }

    /// Records the viewport size; a change frees every idle surface.
    pub fn set_viewport_size(&mut self, mapper: &mut dyn TextureMapper, size: Size) {
        if self.viewport == size {
            return;
        }
        self.viewport = size;
        self.entries.retain(|e| {
            if e.in_use {
                return true;
            }
            mapper.release_texture(e.texture);
            false
        });
    }

    /// Hands out a cleared surface of `size`, or `None` if no texture can be
    /// allocated.
    pub fn acquire(&mut self, mapper: &mut dyn TextureMapper, size: Size) -> Option<PooledSurface> {
        let frame = self.frame;
        if let Some(entry) = self.entries.iter_mut().find(|e| !e.in_use && e.size == size) {
            entry.in_use = true;
            entry.last_used = frame;
            mapper.reset_texture(entry.texture, size, true);
            return Some(PooledSurface {
                texture: entry.texture,
            });
        }
        let texture = mapper.create_texture(size, true)?;
        self.entries.push(PoolEntry {
            texture,
            size,
            in_use: true,
            last_used: frame,
        });
        Some(PooledSurface { texture })
    }

    /// Returns `surface` to the pool.
    pub fn release(&mut self, surface: PooledSurface) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.texture == surface.texture) {
            entry.in_use = false;
        }
    }

    /// Advances the frame counter and frees surfaces idle for too long.
    pub fn collect(&mut self, mapper: &mut dyn TextureMapper) {
        self.frame += 1;
        let frame = self.frame;
        self.entries.retain(|e| {
            if e.in_use || frame - e.last_used <= MAX_IDLE_FRAMES {
                return true;
            }
            mapper.release_texture(e.texture);
            false
        });
    }

    /// Frees every idle surface.
    pub fn purge(&mut self, mapper: &mut dyn TextureMapper) {
        self.entries.retain(|e| {
            if e.in_use {
                return true;
            }
            mapper.release_texture(e.texture);
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RecordingTextureMapper;

    #[test]
    fn released_surface_is_reused() {
        let mut m = RecordingTextureMapper::new();
        let mut pool = SurfacePool::new();
        let a = pool.acquire(&mut m, Size::new(10.0, 10.0)).unwrap();
        let texture = a.texture();
        let b = pool.acquire(&mut m, Size::new(10.0, 10.0)).unwrap();
        assert_ne!(b.texture(), texture, "in-use surfaces are exclusive");
        pool.release(a);
        let c = pool.acquire(&mut m, Size::new(10.0, 10.0)).unwrap();
        assert_eq!(c.texture(), texture);
        assert_eq!(pool.len(), 2);
        pool.release(b);
        pool.release(c);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn viewport_change_invalidates_idle_surfaces() {
        let mut m = RecordingTextureMapper::new();
        let mut pool = SurfacePool::new();
        pool.set_viewport_size(&mut m, Size::new(800.0, 600.0));
        let a = pool.acquire(&mut m, Size::new(10.0, 10.0)).unwrap();
        let b = pool.acquire(&mut m, Size::new(20.0, 10.0)).unwrap();
        pool.release(a);
        pool.set_viewport_size(&mut m, Size::new(1024.0, 768.0));
        assert_eq!(pool.len(), 1);
        assert_eq!(m.live_textures(), 1);
        pool.release(b);
        pool.purge(&mut m);
        assert!(pool.is_empty());
    }

    #[test]
    fn idle_surfaces_expire() {
        let mut m = RecordingTextureMapper::new();
        let mut pool = SurfacePool::new();
        let a = pool.acquire(&mut m, Size::new(10.0, 10.0)).unwrap();
        pool.release(a);
        for _ in 0..=MAX_IDLE_FRAMES {
            pool.collect(&mut m);
        }
        assert!(pool.is_empty());
        assert_eq!(m.live_textures(), 0);
    }

    #[test]
    fn exhaustion_yields_none() {
        let mut m = RecordingTextureMapper::with_texture_limit(0);
        let mut pool = SurfacePool::new();
        assert!(pool.acquire(&mut m, Size::new(10.0, 10.0)).is_none());
    }
}
