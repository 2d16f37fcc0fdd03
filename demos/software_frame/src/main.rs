// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draws one animated scene through both compositing paths.
//!
//! The same layer tree is built twice. One copy is mirrored by a
//! [`DirectCompositor`]; the other is flushed by a [`Coordinator`] into a
//! [`LayerTreeRenderer`]. Both draw into a [`SoftwareTextureMapper`]. Halfway
//! through, the renderer purges its textures and resumes, which makes the
//! coordinator resend tiles and images.
//!
//! Events go to a [`PrettyPrintSink`] on stdout and to a [`RecorderSink`]
//! that is exported as `trace.json`. The final tree is written to
//! `layers.json`.

use std::fs::File;
use std::io::{self, BufWriter};

use kurbo::{Point, Rect, Size};
use lamina_core::animation::{
    AnimatedProperty, AnimationTiming, AnimationValue, Direction, IterationCount, Keyframe,
    KeyframeList,
};
use lamina_core::backend::Presenter;
use lamina_core::color::Color;
use lamina_core::layer::{LayerClient, LayerId, LayerImage, LayerTree, PaintContext};
use lamina_core::pixels::PixelBuffer;
use lamina_core::trace::{
    CommitEvent, DamageRect, FlushEvent, FrameSummary, LayerChange, PaintEvent, PhaseBeginEvent,
    PhaseEndEvent, TileEvent, TraceSink, Tracer,
};
use lamina_core::transform_ops::{TransformOperation, TransformOperations};
use lamina_debug::pretty::PrettyPrintSink;
use lamina_debug::recorder::RecorderSink;
use lamina_render::{CompositorConfig, DirectCompositor, SoftwareTextureMapper};
use lamina_sync::{Coordinator, CoordinatorConfig, LayerTreeRenderer, channel};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const FRAME_COUNT: u32 = 60;
const FRAME_INTERVAL: f64 = 1.0 / 60.0;
const PURGE_FRAME: u32 = 30;

/// Paints a checkerboard into every layer that draws content.
struct Checkerboard;

impl LayerClient for Checkerboard {
    fn paint_contents(&mut self, _layer: LayerId, context: &mut PaintContext<'_>) {
        const CELL: f64 = 20.0;
        let dirty = context.dirty_rect();
        let (light, dark) = (Color::rgb(230, 230, 240), Color::rgb(60, 70, 120));
        let mut y = (dirty.y0 / CELL).floor() * CELL;
        while y < dirty.y1 {
            let mut x = (dirty.x0 / CELL).floor() * CELL;
            while x < dirty.x1 {
                let even = ((x / CELL) + (y / CELL)).rem_euclid(2.0) < 1.0;
                let color = if even { light } else { dark };
                context.fill_rect(Rect::new(x, y, x + CELL, y + CELL), color);
                x += CELL;
            }
            y += CELL;
        }
    }
}

/// Forwards every event to two sinks.
struct Tee<'a> {
    first: &'a mut dyn TraceSink,
    second: &'a mut dyn TraceSink,
}

impl TraceSink for Tee<'_> {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.first.on_phase_begin(e);
        self.second.on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.first.on_phase_end(e);
        self.second.on_phase_end(e);
    }

    fn on_flush(&mut self, e: &FlushEvent) {
        self.first.on_flush(e);
        self.second.on_flush(e);
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.first.on_commit(e);
        self.second.on_commit(e);
    }

    fn on_paint(&mut self, e: &PaintEvent) {
        self.first.on_paint(e);
        self.second.on_paint(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.first.on_frame_summary(s);
        self.second.on_frame_summary(s);
    }

    fn on_layer_changes(&mut self, frame_index: u64, changes: &[LayerChange]) {
        self.first.on_layer_changes(frame_index, changes);
        self.second.on_layer_changes(frame_index, changes);
    }

    fn on_tile_events(&mut self, frame_index: u64, events: &[TileEvent]) {
        self.first.on_tile_events(frame_index, events);
        self.second.on_tile_events(frame_index, events);
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        self.first.on_damage_rects(frame_index, rects);
        self.second.on_damage_rects(frame_index, rects);
    }
}

/// Builds the scene: a backdrop, a spinning painted card with a solid badge,
/// and a pulsing image.
fn build_scene() -> LayerTree {
    let mut tree = LayerTree::new();
    tree.set_client(Box::new(Checkerboard));

    let root = tree.create_layer();
    tree.set_name(root, "root");
    tree.set_size(root, Size::new(f64::from(WIDTH), f64::from(HEIGHT)));
    tree.set_background_color(root, Color::rgb(24, 24, 32));
    tree.set_root(Some(root));

    let card = tree.create_layer();
    tree.set_name(card, "card");
    tree.set_position(card, Point::new(80.0, 60.0));
    tree.set_size(card, Size::new(300.0, 200.0));
    tree.set_draws_content(card, true);
    tree.set_needs_display(card);
    tree.add_child(root, card);

    let badge = tree.create_layer();
    tree.set_name(badge, "badge");
    tree.set_position(badge, Point::new(240.0, 150.0));
    tree.set_size(badge, Size::new(48.0, 48.0));
    tree.set_contents_rect(badge, Rect::new(0.0, 0.0, 48.0, 48.0));
    tree.set_contents_to_solid_color(badge, Some(Color::rgb(220, 60, 60)));
    tree.add_child(card, badge);

    let photo = tree.create_layer();
    tree.set_name(photo, "photo");
    tree.set_position(photo, Point::new(420.0, 280.0));
    tree.set_size(photo, Size::new(160.0, 120.0));
    tree.set_contents_rect(photo, Rect::new(0.0, 0.0, 160.0, 120.0));
    tree.set_contents_to_image(photo, Some(LayerImage::new(1, gradient(32, 24))));
    tree.add_child(root, photo);

    let spin = KeyframeList::new(AnimatedProperty::Transform)
        .with(Keyframe::new(
            0.0,
            AnimationValue::Transform(TransformOperations::new(vec![TransformOperation::rotate(
                0.0,
            )])),
        ))
        .with(Keyframe::new(
            1.0,
            AnimationValue::Transform(TransformOperations::new(vec![TransformOperation::rotate(
                360.0,
            )])),
        ));
    let timing = AnimationTiming::new(2.0).with_iterations(IterationCount::Infinite);
    if let Err(rejection) =
        tree.add_animation(card, "spin", spin, tree.size(card), Some(&timing), 0.0, 0.0)
    {
        eprintln!("spin rejected: {rejection}");
    }

    let pulse = KeyframeList::new(AnimatedProperty::Opacity)
        .with(Keyframe::new(0.0, AnimationValue::Opacity(1.0)))
        .with(Keyframe::new(1.0, AnimationValue::Opacity(0.3)));
    let timing = AnimationTiming::new(0.5)
        .with_iterations(IterationCount::Infinite)
        .with_direction(Direction::Alternate);
    if let Err(rejection) =
        tree.add_animation(photo, "pulse", pulse, tree.size(photo), Some(&timing), 0.0, 0.0)
    {
        eprintln!("pulse rejected: {rejection}");
    }

    tree
}

fn gradient(width: u32, height: u32) -> PixelBuffer {
    let mut pixels = PixelBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let r = u8::try_from(x * 255 / width.max(1)).unwrap_or(u8::MAX);
            let g = u8::try_from(y * 255 / height.max(1)).unwrap_or(u8::MAX);
            pixels.set(x, y, Color::rgb(r, g, 160).premultiply());
        }
    }
    pixels
}

fn matching_pixels(a: &PixelBuffer, b: &PixelBuffer) -> usize {
    a.pixels()
        .iter()
        .zip(b.pixels())
        .filter(|(a, b)| a == b)
        .count()
}

fn main() -> io::Result<()> {
    let mut pretty = PrettyPrintSink::new(Box::new(io::stdout()));
    let mut recorder = RecorderSink::new();

    let mut direct_tree = build_scene();
    let mut direct = DirectCompositor::new(
        SoftwareTextureMapper::new(WIDTH, HEIGHT),
        CompositorConfig::DEFAULT,
    );

    let mut synced_tree = build_scene();
    let (sender, receiver) = channel();
    let mut coordinator = Coordinator::new(sender, CoordinatorConfig::DEFAULT);
    let mut renderer = LayerTreeRenderer::new(
        receiver,
        SoftwareTextureMapper::new(WIDTH, HEIGHT),
        CompositorConfig::DEFAULT,
    );

    for frame in 0..FRAME_COUNT {
        let now = f64::from(frame) * FRAME_INTERVAL;
        let mut tee = Tee {
            first: &mut pretty,
            second: &mut recorder,
        };
        let mut tracer = Tracer::new(&mut tee);

        direct_tree.retire_finished_animations(now);
        let changes = direct_tree.take_changes();
        direct.apply(&mut direct_tree, &changes);
        direct.render(now, &mut tracer);

        if frame == PURGE_FRAME {
            renderer.purge_resources();
            renderer.set_active(true);
        }
        coordinator.flush(&mut synced_tree, now, &mut tracer);
        renderer.paint_to_current(now, &mut tracer);
    }

    let total = WIDTH as usize * HEIGHT as usize;
    let same = matching_pixels(direct.mapper().target(), renderer.mapper().target());
    println!(
        "{FRAME_COUNT} frames; {same}/{total} pixels match between direct and synced paths; \
         {} image backings",
        coordinator.image_backing_count(),
    );

    let mut writer = BufWriter::new(File::create("trace.json")?);
    lamina_debug::chrome::export(recorder.as_bytes(), &mut writer)?;
    let mut writer = BufWriter::new(File::create("layers.json")?);
    lamina_debug::snapshot::write_snapshot(&synced_tree, &mut writer)?;
    println!("Wrote trace.json and layers.json");
    Ok(())
}
