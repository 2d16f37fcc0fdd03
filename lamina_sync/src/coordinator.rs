// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The content side of the sync protocol.
//!
//! A [`Coordinator`] turns one flush of a [`LayerTree`] into one command
//! batch. Only layers listed as changed are visited. Per layer, the child
//! list is encoded before the state record, the state record before tiles,
//! and animations last; [`CommandBatch`] keeps that order across layers.
//!
//! Flushes are paced by the renderer: after sending a batch the coordinator
//! waits until the renderer has painted it before [`flush`](Coordinator::flush)
//! sends the next one.

use std::collections::BTreeMap;

use kurbo::{Rect, Size};
use lamina_core::backend::Presenter;
use lamina_core::dirty::ChangeMask;
use lamina_core::layer::{LayerContents, LayerId, LayerImage, LayerTree, TreeChanges};
use lamina_core::tiling::TilingConfig;
use lamina_core::trace::{FlushEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer};

use crate::command::{CommandBatch, LayerStateRecord, RemoteContents, SyncCommand};
use crate::content_tiles::{ContentTiles, draw_image};
use crate::image_backing::{ImageBackings, MAX_IMAGE_DIMENSION, is_directly_compositable};
use crate::queue::{CommandSender, Disconnected, RendererEvent};
use crate::viewport::{ViewportLimiter, ViewportState};

/// Content-side tunables.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinatorConfig {
    /// Grid used for layer content tiles.
    pub tiling: TilingConfig,
    /// Largest image edge composited through an image backing.
    pub max_image_dimension: u32,
}

impl CoordinatorConfig {
    /// Default tiling and a 2000-pixel image limit.
    pub const DEFAULT: Self = Self {
        tiling: TilingConfig::DEFAULT,
        max_image_dimension: MAX_IMAGE_DIMENSION,
    };
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Counts from the last encoded flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Layers visited.
    pub layers_synced: usize,
    /// Records sent.
    pub commands: usize,
    /// Tile updates among them.
    pub tile_updates: usize,
}

/// Encodes scene-graph changes as sync commands.
#[derive(Debug)]
pub struct Coordinator {
    config: CoordinatorConfig,
    sender: CommandSender,
    content: BTreeMap<LayerId, ContentTiles>,
    images: ImageBackings,
    viewport: ViewportLimiter,
    pending_viewport: Option<ViewportState>,
    root: Option<LayerId>,
    waiting_for_frame: bool,
    needs_resync: bool,
    disconnected: bool,
    frame_index: u64,
    last_flush: FlushStats,
}

impl Coordinator {
    /// Creates a coordinator sending through `sender`.
    #[must_use]
    pub fn new(sender: CommandSender, config: CoordinatorConfig) -> Self {
        Self {
            config,
            sender,
            content: BTreeMap::new(),
            images: ImageBackings::new(),
            viewport: ViewportLimiter::new(),
            pending_viewport: None,
            root: None,
            waiting_for_frame: false,
            needs_resync: false,
            disconnected: false,
            frame_index: 0,
            last_flush: FlushStats::default(),
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Counts from the last batch sent.
    #[must_use]
    pub const fn last_flush(&self) -> FlushStats {
        self.last_flush
    }

    /// Number of live image backings.
    #[must_use]
    pub fn image_backing_count(&self) -> usize {
        self.images.len()
    }

    /// Number of content tiles of `layer`.
    #[must_use]
    pub fn tile_count(&self, layer: LayerId) -> usize {
        self.content.get(&layer).map_or(0, ContentTiles::tile_count)
    }

    /// Returns `true` once a send failed because the renderer is gone.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Returns `true` while the last batch has not been painted.
    pub fn is_waiting_for_frame(&mut self) -> bool {
        self.poll_events();
        self.waiting_for_frame
    }

    /// Queues a viewport update for the next flush unless it matches the
    /// last one sent. Returns `true` if it was queued.
    pub fn set_viewport(&mut self, state: ViewportState) -> bool {
        if !self.viewport.should_send(&state) {
            return false;
        }
        self.pending_viewport = Some(state);
        true
    }

    /// Takes the tree's changes and sends them, unless the renderer has not
    /// finished the previous frame. Animations finished by `now` are
    /// dropped from the tree first.
    ///
    /// Returns `false` if nothing was sent.
    pub fn flush(&mut self, tree: &mut LayerTree, now: f64, tracer: &mut Tracer<'_>) -> bool {
        if self.is_waiting_for_frame() || self.disconnected {
            return false;
        }
        let frame_index = self.frame_index;
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::Flush,
            timestamp: now,
        });
        tree.retire_finished_animations(now);
        let changes = tree.take_changes();
        self.apply(tree, &changes);
        let stats = self.last_flush;
        tracer.flush(&FlushEvent {
            frame_index,
            layers_synced: u32::try_from(stats.layers_synced).unwrap_or(u32::MAX),
            commands: u32::try_from(stats.commands).unwrap_or(u32::MAX),
        });
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::Flush,
            timestamp: now,
        });
        self.frame_index += 1;
        !self.disconnected
    }

    fn poll_events(&mut self) {
        for event in self.sender.take_events() {
            match event {
                RendererEvent::FrameCompleted => self.waiting_for_frame = false,
                RendererEvent::ResourcesPurged => {
                    self.needs_resync = true;
                    self.waiting_for_frame = false;
                }
            }
        }
    }

    fn send(&mut self, batch: CommandBatch) -> Result<(), Disconnected> {
        self.sender.send(batch.finish())
    }

    fn encode(&mut self, tree: &mut LayerTree, changes: &TreeChanges) -> CommandBatch {
        let mut batch = CommandBatch::new();
        let mut stats = FlushStats::default();

        if !changes.removed.is_empty() {
            for &id in &changes.removed {
                // The renderer frees the tiles with the layer.
                self.content.remove(&id);
                self.images.remove_layer(id, &mut batch);
            }
            batch.push(SyncCommand::DeleteLayers(changes.removed.clone()));
        }
        if !changes.added.is_empty() {
            batch.push(SyncCommand::CreateLayers(changes.added.clone()));
        }
        let root = tree.root();
        if root != self.root {
            batch.push(SyncCommand::SetRootLayer(root));
            self.root = root;
        }

        if self.needs_resync {
            self.needs_resync = false;
            stats.tile_updates += self.resync_resources(tree, &mut batch);
        }

        for &(id, mask) in &changes.changed {
            if !tree.is_alive(id) {
                continue;
            }
            stats.layers_synced += 1;
            stats.tile_updates += self.sync_layer(tree, id, mask, &mut batch);
        }

        if let Some(viewport) = self.pending_viewport.take() {
            batch.push(SyncCommand::ViewportState(viewport));
        }
        batch.push(SyncCommand::FrameDone);
        stats.commands = batch.len();
        self.last_flush = stats;
        batch
    }

    fn sync_layer(
        &mut self,
        tree: &mut LayerTree,
        id: LayerId,
        mask: ChangeMask,
        batch: &mut CommandBatch,
    ) -> usize {
        if mask.contains(ChangeMask::CHILDREN) {
            batch.push(SyncCommand::LayerChildren {
                layer: id,
                children: tree.children(id).collect(),
            });
        }
        if mask.contains(ChangeMask::CONTENTS) {
            let image = self.composited_image(tree, id).cloned();
            self.images.set_layer_image(id, image.as_ref(), batch);
        }
        if mask.intersects(ChangeMask::STATE) {
            batch.push(SyncCommand::LayerState(Box::new(self.state_record(tree, id, mask))));
        }
        if mask.contains(ChangeMask::FILTERS) {
            batch.push(SyncCommand::FilterSet {
                layer: id,
                filters: tree.filters(id).clone(),
            });
        }
        if mask.contains(ChangeMask::ANIMATIONS) {
            batch.push(SyncCommand::AnimationSet {
                layer: id,
                animations: tree.animations(id).clone(),
            });
        }
        let force = mask.contains(ChangeMask::CONTENTS);
        self.sync_tiles(tree, id, force, batch)
    }

    /// The image `id` shows through an image backing, if any.
    fn composited_image<'a>(&self, tree: &'a LayerTree, id: LayerId) -> Option<&'a LayerImage> {
        match tree.contents(id) {
            LayerContents::Image(image)
                if is_directly_compositable(&image.pixels, self.config.max_image_dimension) =>
            {
                Some(image)
            }
            _ => None,
        }
    }

    /// An image too large for a backing, painted into the tiles instead.
    fn oversized_image(&self, tree: &LayerTree, id: LayerId) -> Option<LayerImage> {
        match tree.contents(id) {
            LayerContents::Image(image)
                if !is_directly_compositable(&image.pixels, self.config.max_image_dimension) =>
            {
                Some(image.clone())
            }
            _ => None,
        }
    }

    fn state_record(&self, tree: &LayerTree, id: LayerId, mask: ChangeMask) -> LayerStateRecord {
        let contents = match tree.contents(id) {
            LayerContents::None => RemoteContents::None,
            LayerContents::SolidColor(color) => RemoteContents::SolidColor(*color),
            LayerContents::Image(_) => self
                .images
                .backing_of(id)
                .map_or(RemoteContents::None, RemoteContents::Image),
        };
        LayerStateRecord {
            id,
            changes: mask,
            state: tree.state(id),
            parent: tree.parent(id),
            mask: tree.mask_layer(id),
            replica: tree.replica_layer(id),
            contents,
        }
    }

    /// Keeps `id`'s tile grid matching its size and sends its damage.
    /// Returns the number of tile updates.
    fn sync_tiles(
        &mut self,
        tree: &mut LayerTree,
        id: LayerId,
        force: bool,
        batch: &mut CommandBatch,
    ) -> usize {
        let state = tree.state(id);
        let size = state.geometry.size;
        let image = self.oversized_image(tree, id);
        if !(state.flags.draws_content || image.is_some()) || size.is_zero_area() {
            if let Some(mut tiles) = self.content.remove(&id) {
                tiles.clear(id, batch);
            }
            tree.take_needs_display(id);
            return 0;
        }

        let tiling = self.config.tiling;
        let tile_size = Size::new(tiling.tile_dimension, tiling.tile_dimension);
        let tiles = self.content.entry(id).or_insert_with(ContentTiles::new);
        let relaid = tiles.resize(id, size, tile_size, batch);
        let mut damage = tree.take_needs_display(id);
        if relaid || (force && image.is_some()) {
            damage.invalidate_all();
        }

        let bounds = size.to_rect();
        let dirty: Vec<Rect> = damage
            .resolve(bounds)
            .into_iter()
            .map(|r| r.intersect(bounds).expand())
            .filter(|r| r.width() >= 1.0 && r.height() >= 1.0)
            .collect();
        let contents_rect = state.geometry.contents_rect;
        tiles.update(
            id,
            &dirty,
            |rect, buffer| {
                if state.flags.draws_content {
                    tree.paint_contents(id, rect, buffer);
                }
                if let Some(image) = &image {
                    draw_image(buffer, rect, image, contents_rect);
                }
            },
            batch,
        )
    }

    /// Re-sends every image and tile reachable from the root after the
    /// renderer dropped its textures.
    fn resync_resources(&mut self, tree: &mut LayerTree, batch: &mut CommandBatch) -> usize {
        self.images.forget_all();
        self.content.clear();
        let mut updates = 0;
        let mut stack: Vec<LayerId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            stack.extend(tree.children(id));
            stack.extend(tree.mask_layer(id));
            stack.extend(tree.replica_layer(id));
            if !matches!(tree.contents(id), LayerContents::None) {
                let image = self.composited_image(tree, id).cloned();
                self.images.set_layer_image(id, image.as_ref(), batch);
                let record = self.state_record(tree, id, ChangeMask::CONTENTS);
                batch.push(SyncCommand::LayerState(Box::new(record)));
            }
            updates += self.sync_tiles(tree, id, true, batch);
        }
        updates
    }
}

impl Presenter for Coordinator {
    fn apply(&mut self, tree: &mut LayerTree, changes: &TreeChanges) {
        self.poll_events();
        let batch = self.encode(tree, changes);
        if self.send(batch).is_err() {
            self.disconnected = true;
            return;
        }
        self.waiting_for_frame = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::is_structurally_ordered;
    use crate::queue::{CommandReceiver, channel};
    use kurbo::{Point, Vec2};
    use lamina_core::color::Color;
    use lamina_core::layer::{LayerClient, PaintContext};
    use lamina_core::pixels::PixelBuffer;

    struct White;

    impl LayerClient for White {
        fn paint_contents(&mut self, _layer: LayerId, context: &mut PaintContext<'_>) {
            context.fill_rect(Rect::new(0.0, 0.0, 1e4, 1e4), Color::WHITE);
        }
    }

    fn setup() -> (Coordinator, CommandReceiver, LayerTree) {
        let (tx, rx) = channel();
        let mut tree = LayerTree::new();
        tree.set_client(Box::new(White));
        (Coordinator::new(tx, CoordinatorConfig::DEFAULT), rx, tree)
    }

    fn flush(
        coordinator: &mut Coordinator,
        rx: &mut CommandReceiver,
        tree: &mut LayerTree,
    ) -> Vec<SyncCommand> {
        assert!(coordinator.flush(tree, 0.0, &mut Tracer::none()));
        let commands = rx.drain();
        rx.notify(RendererEvent::FrameCompleted).unwrap();
        commands
    }

    #[test]
    fn new_tree_is_sent_in_structural_order() {
        let (mut coordinator, mut rx, mut tree) = setup();
        let root = tree.create_layer();
        let child = tree.create_layer();
        tree.set_size(child, Size::new(10.0, 10.0));
        tree.set_draws_content(child, true);
        tree.add_child(root, child);
        tree.set_root(Some(root));

        let commands = flush(&mut coordinator, &mut rx, &mut tree);
        assert!(is_structurally_ordered(&commands));
        assert!(matches!(&commands[0], SyncCommand::CreateLayers(ids) if ids.len() == 2));
        assert!(commands.iter().any(|c| matches!(
            c,
            SyncCommand::LayerChildren { layer, children } if *layer == root && children == &[child]
        )));
        assert!(commands.iter().any(|c| matches!(c, SyncCommand::CreateTile { .. })));
        assert!(commands.iter().any(|c| matches!(c, SyncCommand::UpdateTile { .. })));
        assert!(matches!(commands.last(), Some(SyncCommand::FrameDone)));
        assert_eq!(coordinator.tile_count(child), 1);
    }

    #[test]
    fn unchanged_layers_are_skipped() {
        let (mut coordinator, mut rx, mut tree) = setup();
        let root = tree.create_layer();
        tree.set_root(Some(root));
        flush(&mut coordinator, &mut rx, &mut tree);

        let commands = flush(&mut coordinator, &mut rx, &mut tree);
        assert!(matches!(commands[..], [SyncCommand::FrameDone]));
        assert_eq!(coordinator.last_flush().layers_synced, 0);

        tree.set_position(root, Point::new(1.0, 0.0));
        let commands = flush(&mut coordinator, &mut rx, &mut tree);
        let [SyncCommand::LayerState(record), SyncCommand::FrameDone] = &commands[..] else {
            panic!("expected one state record");
        };
        assert!(record.changes.contains(ChangeMask::POSITION));
        assert_eq!(record.state.geometry.position, Point::new(1.0, 0.0));
    }

    #[test]
    fn flush_waits_for_the_renderer() {
        let (mut coordinator, mut rx, mut tree) = setup();
        tree.create_layer();
        assert!(coordinator.flush(&mut tree, 0.0, &mut Tracer::none()));
        assert!(!coordinator.flush(&mut tree, 0.0, &mut Tracer::none()));
        rx.drain();
        rx.notify(RendererEvent::FrameCompleted).unwrap();
        assert!(coordinator.flush(&mut tree, 0.0, &mut Tracer::none()));
    }

    #[test]
    fn small_images_get_a_backing_and_large_ones_get_tiles() {
        let (mut coordinator, mut rx, mut tree) = setup();
        let small = tree.create_layer();
        let large = tree.create_layer();
        tree.set_size(large, Size::new(10.0, 10.0));
        tree.set_contents_rect(large, Rect::new(0.0, 0.0, 10.0, 10.0));
        tree.set_contents_to_image(
            small,
            Some(LayerImage::new(1, PixelBuffer::filled(4, 4, Color::BLACK))),
        );
        tree.set_contents_to_image(
            large,
            Some(LayerImage::new(2, PixelBuffer::new(MAX_IMAGE_DIMENSION + 1, 1))),
        );

        let commands = flush(&mut coordinator, &mut rx, &mut tree);
        assert_eq!(coordinator.image_backing_count(), 1);
        assert_eq!(coordinator.tile_count(small), 0);
        assert_eq!(coordinator.tile_count(large), 1);
        let small_contents = commands.iter().find_map(|c| match c {
            SyncCommand::LayerState(r) if r.id == small => Some(r.contents),
            _ => None,
        });
        assert!(matches!(small_contents, Some(RemoteContents::Image(_))));
    }

    #[test]
    fn destroyed_layers_release_their_images() {
        let (mut coordinator, mut rx, mut tree) = setup();
        let layer = tree.create_layer();
        tree.set_contents_to_image(
            layer,
            Some(LayerImage::new(1, PixelBuffer::filled(4, 4, Color::BLACK))),
        );
        flush(&mut coordinator, &mut rx, &mut tree);

        tree.destroy_layer(layer);
        let commands = flush(&mut coordinator, &mut rx, &mut tree);
        assert!(commands.iter().any(|c| matches!(c, SyncCommand::DeleteLayers(_))));
        assert!(commands.iter().any(|c| matches!(c, SyncCommand::RemoveImageBacking(_))));
        assert_eq!(coordinator.image_backing_count(), 0);
    }

    #[test]
    fn viewport_is_sent_once() {
        let (mut coordinator, mut rx, mut tree) = setup();
        let viewport = ViewportState {
            visible_rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            scale: 1.0,
            trajectory: Vec2::ZERO,
        };
        assert!(coordinator.set_viewport(viewport));
        assert!(!coordinator.set_viewport(viewport));
        let commands = flush(&mut coordinator, &mut rx, &mut tree);
        assert!(matches!(commands[..], [SyncCommand::ViewportState(_), SyncCommand::FrameDone]));
    }

    #[test]
    fn purge_resends_tiles() {
        let (mut coordinator, mut rx, mut tree) = setup();
        let root = tree.create_layer();
        tree.set_size(root, Size::new(10.0, 10.0));
        tree.set_draws_content(root, true);
        tree.set_root(Some(root));
        flush(&mut coordinator, &mut rx, &mut tree);

        rx.notify(RendererEvent::ResourcesPurged).unwrap();
        let commands = flush(&mut coordinator, &mut rx, &mut tree);
        assert!(commands.iter().any(|c| matches!(c, SyncCommand::CreateTile { .. })));
        assert!(commands.iter().any(|c| matches!(c, SyncCommand::UpdateTile { .. })));
    }

    #[test]
    fn finished_animation_is_sent_as_an_empty_set() {
        use lamina_core::animation::{
            AnimatedProperty, AnimationTiming, AnimationValue, Keyframe, KeyframeList,
        };

        let (mut coordinator, mut rx, mut tree) = setup();
        let root = tree.create_layer();
        tree.set_root(Some(root));
        let fade = KeyframeList::new(AnimatedProperty::Opacity)
            .with(Keyframe::new(0.0, AnimationValue::Opacity(0.0)))
            .with(Keyframe::new(1.0, AnimationValue::Opacity(1.0)));
        let timing = AnimationTiming::new(1.0);
        tree.add_animation(root, "fade", fade, Size::ZERO, Some(&timing), 0.0, 0.0)
            .unwrap();
        let commands = flush(&mut coordinator, &mut rx, &mut tree);
        assert!(commands.iter().any(
            |c| matches!(c, SyncCommand::AnimationSet { animations, .. } if animations.len() == 1)
        ));

        assert!(coordinator.flush(&mut tree, 2.0, &mut Tracer::none()));
        let commands = rx.drain();
        assert!(commands.iter().any(
            |c| matches!(c, SyncCommand::AnimationSet { animations, .. } if animations.is_empty())
        ));
        assert!(tree.animations(root).is_empty());
    }

    #[test]
    fn dropped_renderer_stops_flushing() {
        let (mut coordinator, rx, mut tree) = setup();
        drop(rx);
        tree.create_layer();
        assert!(!coordinator.flush(&mut tree, 0.0, &mut Tracer::none()));
        assert!(coordinator.is_disconnected());
    }
}
