// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A CPU [`TextureMapper`] that rasterizes into [`PixelBuffer`]s.
//!
//! Every draw is inverse-mapped: for each device pixel inside the projected
//! bounds, the pixel center is projected back through the inverse transform
//! and sampled with nearest filtering. Draws through a singular transform are
//! skipped. Clips are kept per surface as transformed rects, so a clip pushed
//! on one surface does not affect draws into another.
//!
//! A texture budget simulates allocation failure: once
//! [`SoftwareConfig::max_textures`] textures are alive,
//! [`create_texture`](TextureMapper::create_texture) returns `None`.

mod filters;

use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect, Size};
use lamina_core::color::{Color, PremulRgba};
use lamina_core::filter::FilterOperations;
use lamina_core::pixels::{PixelBuffer, pixel_bounds};
use lamina_core::transform::Transform3d;

use crate::texture::{MaskInput, TextureId, TextureMapper};

/// Limits of a [`SoftwareTextureMapper`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftwareConfig {
    /// Largest texture edge.
    pub max_texture_size: Size,
    /// Maximum number of live textures; `None` for no limit.
    pub max_textures: Option<usize>,
}

impl SoftwareConfig {
    /// 4096-pixel textures, no count limit.
    pub const DEFAULT: Self = Self {
        max_texture_size: Size::new(4096.0, 4096.0),
        max_textures: None,
    };
}

impl Default for SoftwareConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Counters for one frame of drawing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapperStats {
    /// Textured and solid draws issued.
    pub draw_calls: u32,
    /// Surface binds.
    pub surface_binds: u32,
    /// Filter chains applied.
    pub filter_passes: u32,
}

#[derive(Clone, Debug)]
struct SoftTexture {
    pixels: PixelBuffer,
    has_alpha: bool,
}

#[derive(Clone, Copy, Debug)]
struct ClipEntry {
    surface: Option<TextureId>,
    inverse: Transform3d,
    rect: Rect,
    bounds: Rect,
}

/// Software rasterizer implementing [`TextureMapper`].
#[derive(Debug)]
pub struct SoftwareTextureMapper {
    config: SoftwareConfig,
    target: PixelBuffer,
    textures: Vec<Option<SoftTexture>>,
    free: Vec<usize>,
    live: usize,
    bound: Option<TextureId>,
    clips: Vec<ClipEntry>,
    stats: MapperStats,
}

impl SoftwareTextureMapper {
    /// Creates a mapper whose default target is `width × height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_config(width, height, SoftwareConfig::DEFAULT)
    }

    /// Creates a mapper with explicit limits.
    #[must_use]
    pub fn with_config(width: u32, height: u32, config: SoftwareConfig) -> Self {
        Self {
            config,
            target: PixelBuffer::new(width, height),
            textures: Vec::new(),
            free: Vec::new(),
            live: 0,
            bound: None,
            clips: Vec::new(),
            stats: MapperStats::default(),
        }
    }

    /// The default target.
    #[must_use]
    pub fn target(&self) -> &PixelBuffer {
        &self.target
    }

    /// Replaces the default target with a cleared buffer of the given size.
    pub fn resize_target(&mut self, width: u32, height: u32) {
        self.target = PixelBuffer::new(width, height);
    }

    /// Pixels of `texture`, if it exists.
    #[must_use]
    pub fn texture_pixels(&self, texture: TextureId) -> Option<&PixelBuffer> {
        self.slot(texture).map(|t| &t.pixels)
    }

    /// Number of live textures.
    #[must_use]
    pub const fn live_textures(&self) -> usize {
        self.live
    }

    /// Counters since the last [`begin_frame`](TextureMapper::begin_frame).
    #[must_use]
    pub const fn stats(&self) -> MapperStats {
        self.stats
    }

    fn slot(&self, texture: TextureId) -> Option<&SoftTexture> {
        self.textures.get(texture.0 as usize)?.as_ref()
    }

    fn slot_mut(&mut self, texture: TextureId) -> Option<&mut SoftTexture> {
        self.textures.get_mut(texture.0 as usize)?.as_mut()
    }

    /// Takes the bound surface's buffer out so it can be drawn into while
    /// other textures are read.
    fn take_bound(&mut self) -> Option<PixelBuffer> {
        match self.bound {
            None => Some(core::mem::replace(&mut self.target, PixelBuffer::new(0, 0))),
            Some(id) => self
                .slot_mut(id)
                .map(|t| core::mem::replace(&mut t.pixels, PixelBuffer::new(0, 0))),
        }
    }

    fn restore_bound(&mut self, buffer: PixelBuffer) {
        match self.bound {
            None => self.target = buffer,
            Some(id) => {
                if let Some(t) = self.slot_mut(id) {
                    t.pixels = buffer;
                }
            }
        }
    }

    fn active_clips(&self) -> impl Iterator<Item = &ClipEntry> {
        let bound = self.bound;
        self.clips.iter().filter(move |c| c.surface == bound)
    }

    /// Shades every surface pixel whose center lands inside `rect`.
    ///
    /// `shade` receives the point in `rect`'s space and the pixel center in
    /// surface space.
    fn rasterize(
        &mut self,
        rect: Rect,
        transform: &Transform3d,
        mut shade: impl FnMut(&Self, Point, Point) -> Option<PremulRgba>,
    ) {
        if rect.is_zero_area() {
            return;
        }
        let Some(inverse) = transform.inverse() else {
            return;
        };
        let Some(mut buffer) = self.take_bound() else {
            return;
        };
        let mut bounds = transform.map_rect(rect).intersect(buffer.bounds());
        let clips: Vec<ClipEntry> = self.active_clips().copied().collect();
        for clip in &clips {
            bounds = bounds.intersect(clip.bounds);
        }
        let (x0, y0, x1, y1) = pixel_bounds(bounds, buffer.width(), buffer.height());
        for y in y0..y1 {
            for x in x0..x1 {
                let center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if !clips.iter().all(|c| inside(c.rect, c.inverse.project_point(center))) {
                    continue;
                }
                let Some(local) = inverse.project_point(center) else {
                    continue;
                };
                if !inside(rect, Some(local)) {
                    continue;
                }
                if let Some(color) = shade(&*self, local, center) {
                    buffer.set(x, y, color.over(buffer.get(x, y)));
                }
            }
        }
        self.restore_bound(buffer);
        self.stats.draw_calls += 1;
    }

    fn mask_coverage(&self, mask: &MaskInput, inverse: Option<&Transform3d>, center: Point) -> f32 {
        let (Some(texture), Some(inverse)) = (self.slot(mask.texture), inverse) else {
            return 0.0;
        };
        match inverse.project_point(center) {
            Some(p) if inside(mask.rect, Some(p)) => {
                f32::from(sample(&texture.pixels, mask.rect, p).a) / 255.0
            }
            _ => 0.0,
        }
    }
}

fn inside(rect: Rect, point: Option<Point>) -> bool {
    point.is_some_and(|p| p.x >= rect.x0 && p.x < rect.x1 && p.y >= rect.y0 && p.y < rect.y1)
}

/// Nearest sample of `pixels` stretched over `rect` at `p`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to the buffer right after the cast"
)]
fn sample(pixels: &PixelBuffer, rect: Rect, p: Point) -> PremulRgba {
    let u = (p.x - rect.x0) / rect.width() * f64::from(pixels.width());
    let v = (p.y - rect.y0) / rect.height() * f64::from(pixels.height());
    let x = (u.floor().max(0.0) as u32).min(pixels.width().saturating_sub(1));
    let y = (v.floor().max(0.0) as u32).min(pixels.height().saturating_sub(1));
    pixels.get(x, y)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "float to int casts saturate"
)]
fn pixel_size(size: Size) -> (u32, u32) {
    let dim = |v: f64| if v.is_finite() && v > 0.0 { v.ceil() as u32 } else { 0 };
    (dim(size.width), dim(size.height))
}

impl TextureMapper for SoftwareTextureMapper {
    fn create_texture(&mut self, size: Size, has_alpha: bool) -> Option<TextureId> {
        if self.config.max_textures.is_some_and(|max| self.live >= max) {
            return None;
        }
        let max = self.config.max_texture_size;
        if size.width > max.width || size.height > max.height {
            return None;
        }
        let (w, h) = pixel_size(size);
        let texture = SoftTexture {
            pixels: PixelBuffer::new(w, h),
            has_alpha,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.textures[index] = Some(texture);
                index
            }
            None => {
                self.textures.push(Some(texture));
                self.textures.len() - 1
            }
        };
        self.live += 1;
        Some(TextureId(index as u64))
    }

    fn reset_texture(&mut self, texture: TextureId, size: Size, has_alpha: bool) {
        let (w, h) = pixel_size(size);
        if let Some(t) = self.slot_mut(texture) {
            t.pixels = PixelBuffer::new(w, h);
            t.has_alpha = has_alpha;
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        let index = texture.0 as usize;
        if let Some(slot) = self.textures.get_mut(index) {
            if slot.take().is_some() {
                self.free.push(index);
                self.live -= 1;
                self.clips.retain(|c| c.surface != Some(texture));
                if self.bound == Some(texture) {
                    self.bound = None;
                }
            }
        }
    }

    fn texture_size(&self, texture: TextureId) -> Option<Size> {
        self.slot(texture).map(|t| {
            Size::new(f64::from(t.pixels.width()), f64::from(t.pixels.height()))
        })
    }

    fn texture_has_alpha(&self, texture: TextureId) -> bool {
        self.slot(texture).is_some_and(|t| t.has_alpha)
    }

    fn max_texture_size(&self) -> Size {
        self.config.max_texture_size
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        source: &PixelBuffer,
        source_rect: Rect,
        target: Point,
    ) {
        if let Some(t) = self.slot_mut(texture) {
            t.pixels.copy_from(source, source_rect, target);
        }
    }

    fn bind_surface(&mut self, surface: Option<TextureId>) {
        self.bound = surface.filter(|id| self.slot(*id).is_some());
        self.stats.surface_binds += 1;
    }

    fn draw_texture(
        &mut self,
        texture: TextureId,
        target_rect: Rect,
        transform: &Transform3d,
        opacity: f32,
        mask: Option<&MaskInput>,
    ) {
        if self.bound == Some(texture) || self.slot(texture).is_none() {
            return;
        }
        let mask_inverse = mask.and_then(|m| m.transform.inverse());
        self.rasterize(target_rect, transform, |this, local, center| {
            let pixels = &this.slot(texture)?.pixels;
            let mut color = sample(pixels, target_rect, local).scale(opacity);
            if let Some(mask) = mask {
                color = color.scale(this.mask_coverage(mask, mask_inverse.as_ref(), center));
            }
            Some(color)
        });
    }

    fn draw_solid_color(&mut self, rect: Rect, transform: &Transform3d, color: Color) {
        let pixel = color.premultiply();
        self.rasterize(rect, transform, |_, _, _| Some(pixel));
    }

    fn begin_clip(&mut self, transform: &Transform3d, rect: Rect) {
        // A singular clip hides everything drawn inside it.
        let (inverse, bounds) = match transform.inverse() {
            Some(inverse) => (inverse, transform.map_rect(rect)),
            None => (Transform3d::IDENTITY, Rect::ZERO),
        };
        self.clips.push(ClipEntry {
            surface: self.bound,
            inverse,
            rect: if bounds.is_zero_area() { Rect::ZERO } else { rect },
            bounds,
        });
    }

    fn end_clip(&mut self) {
        let bound = self.bound;
        if let Some(pos) = self.clips.iter().rposition(|c| c.surface == bound) {
            self.clips.remove(pos);
        }
    }

    fn apply_filters(
        &mut self,
        source: TextureId,
        target: TextureId,
        filters: &FilterOperations,
    ) -> bool {
        if source == target {
            return false;
        }
        let Some(input) = self.slot(source) else {
            return false;
        };
        let output = filters::apply_chain(&input.pixels, filters);
        let Some(t) = self.slot_mut(target) else {
            return false;
        };
        t.pixels = output;
        t.has_alpha = true;
        self.stats.filter_passes += 1;
        true
    }

    fn begin_frame(&mut self) {
        self.stats = MapperStats::default();
        self.bound = None;
        self.clips.clear();
        self.target.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use lamina_core::filter::FilterOperation;

    fn red() -> Color {
        Color::rgb(255, 0, 0)
    }

    #[test]
    fn solid_color_respects_transform() {
        let mut m = SoftwareTextureMapper::new(10, 10);
        m.begin_frame();
        m.draw_solid_color(
            Rect::new(0.0, 0.0, 2.0, 2.0),
            &Transform3d::from_translation(4.0, 4.0, 0.0),
            red(),
        );
        assert_eq!(m.target().get(3, 3).a, 0);
        assert_eq!(m.target().get(4, 4), red().premultiply());
        assert_eq!(m.target().get(5, 5), red().premultiply());
        assert_eq!(m.target().get(6, 6).a, 0);
        assert_eq!(m.stats().draw_calls, 1);
    }

    #[test]
    fn texture_scales_to_target_rect() {
        let mut m = SoftwareTextureMapper::new(8, 8);
        let tex = m.create_texture(Size::new(2.0, 2.0), true).unwrap();
        let mut src = PixelBuffer::new(2, 2);
        src.set(1, 1, Color::WHITE.premultiply());
        m.update_texture(tex, &src, src.bounds(), Point::ZERO);
        m.draw_texture(
            tex,
            Rect::new(0.0, 0.0, 8.0, 8.0),
            &Transform3d::IDENTITY,
            1.0,
            None,
        );
        assert_eq!(m.target().get(1, 1).a, 0);
        assert_eq!(m.target().get(6, 6).a, 255);
    }

    #[test]
    fn clip_limits_drawing() {
        let mut m = SoftwareTextureMapper::new(10, 10);
        m.begin_clip(&Transform3d::IDENTITY, Rect::new(0.0, 0.0, 5.0, 10.0));
        m.draw_solid_color(Rect::new(0.0, 0.0, 10.0, 10.0), &Transform3d::IDENTITY, red());
        m.end_clip();
        assert_eq!(m.target().get(4, 4).a, 255);
        assert_eq!(m.target().get(5, 4).a, 0);
    }

    #[test]
    fn clip_is_per_surface() {
        let mut m = SoftwareTextureMapper::new(10, 10);
        let surface = m.create_texture(Size::new(10.0, 10.0), true).unwrap();
        m.begin_clip(&Transform3d::IDENTITY, Rect::new(0.0, 0.0, 1.0, 1.0));
        m.bind_surface(Some(surface));
        m.draw_solid_color(Rect::new(0.0, 0.0, 10.0, 10.0), &Transform3d::IDENTITY, red());
        assert_eq!(m.texture_pixels(surface).unwrap().get(5, 5).a, 255);
    }

    #[test]
    fn mask_scales_alpha() {
        let mut m = SoftwareTextureMapper::new(4, 1);
        let tex = m.create_texture(Size::new(1.0, 1.0), false).unwrap();
        m.update_texture(tex, &PixelBuffer::filled(1, 1, Color::WHITE), Rect::new(0.0, 0.0, 1.0, 1.0), Point::ZERO);
        let mask_tex = m.create_texture(Size::new(2.0, 1.0), true).unwrap();
        let mut mask_pixels = PixelBuffer::new(2, 1);
        mask_pixels.set(0, 0, Color::BLACK.premultiply());
        m.update_texture(mask_tex, &mask_pixels, mask_pixels.bounds(), Point::ZERO);
        let mask = MaskInput {
            texture: mask_tex,
            rect: Rect::new(0.0, 0.0, 4.0, 1.0),
            transform: Transform3d::IDENTITY,
        };
        m.draw_texture(tex, Rect::new(0.0, 0.0, 4.0, 1.0), &Transform3d::IDENTITY, 1.0, Some(&mask));
        assert_eq!(m.target().get(0, 0).a, 255);
        assert_eq!(m.target().get(3, 0).a, 0);
    }

    #[test]
    fn singular_transform_draws_nothing() {
        let mut m = SoftwareTextureMapper::new(4, 4);
        m.draw_solid_color(
            Rect::new(0.0, 0.0, 4.0, 4.0),
            &Transform3d::from_scale(0.0, 1.0, 1.0),
            red(),
        );
        assert_eq!(m.stats().draw_calls, 0);
        assert!(m.target().pixels().iter().all(|p| p.a == 0));
    }

    #[test]
    fn budget_exhaustion_returns_none() {
        let config = SoftwareConfig {
            max_textures: Some(1),
            ..SoftwareConfig::DEFAULT
        };
        let mut m = SoftwareTextureMapper::with_config(4, 4, config);
        let a = m.create_texture(Size::new(1.0, 1.0), true);
        assert!(a.is_some());
        assert!(m.create_texture(Size::new(1.0, 1.0), true).is_none());
        m.release_texture(a.unwrap());
        assert!(m.create_texture(Size::new(1.0, 1.0), true).is_some());
    }

    #[test]
    fn filters_write_target() {
        let mut m = SoftwareTextureMapper::new(1, 1);
        let src = m.create_texture(Size::new(1.0, 1.0), true).unwrap();
        let dst = m.create_texture(Size::new(1.0, 1.0), true).unwrap();
        m.update_texture(src, &PixelBuffer::filled(1, 1, Color::BLACK), Rect::new(0.0, 0.0, 1.0, 1.0), Point::ZERO);
        let ok = m.apply_filters(src, dst, &FilterOperations::new(vec![FilterOperation::Invert(1.0)]));
        assert!(ok);
        assert_eq!(m.texture_pixels(dst).unwrap().get(0, 0), Color::WHITE.premultiply());
    }
}
