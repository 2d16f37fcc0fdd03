// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The renderer side of the sync protocol.
//!
//! A [`LayerTreeRenderer`] owns the compositing tree and every texture. At
//! the start of each paint it drains the command queue, applies the records
//! in order, then commits staged tile and image pixels once before drawing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lamina_core::dirty::ChangeMask;
use lamina_core::layer::LayerId;
use lamina_core::pixels::PixelBuffer;
use lamina_core::trace::{
    CommitEvent, PaintEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer,
};
use lamina_render::remote_store::{RemoteBackingStore, StagedUpdate};
use lamina_render::{
    Backing, CompositingTree, CompositorConfig, Contents, PaintStats, TextureMapper,
};

use crate::command::{ImageBackingId, LayerStateRecord, RemoteContents, SyncCommand};
use crate::queue::{CommandReceiver, RendererEvent};
use crate::viewport::ViewportState;

/// Applies sync commands to a [`CompositingTree`] and paints it.
#[derive(Debug)]
pub struct LayerTreeRenderer<M> {
    receiver: CommandReceiver,
    tree: CompositingTree,
    mapper: M,
    remote_layers: BTreeSet<LayerId>,
    staged_images: BTreeMap<ImageBackingId, Arc<PixelBuffer>>,
    tiles_created: u32,
    viewport: Option<ViewportState>,
    frames_pending: usize,
    active: bool,
    frame_index: u64,
}

impl<M: TextureMapper> LayerTreeRenderer<M> {
    /// Creates an active renderer reading from `receiver`.
    pub fn new(receiver: CommandReceiver, mapper: M, config: CompositorConfig) -> Self {
        Self {
            receiver,
            tree: CompositingTree::new(config),
            mapper,
            remote_layers: BTreeSet::new(),
            staged_images: BTreeMap::new(),
            tiles_created: 0,
            viewport: None,
            frames_pending: 0,
            active: true,
            frame_index: 0,
        }
    }

    /// The mirrored tree.
    #[must_use]
    pub const fn tree(&self) -> &CompositingTree {
        &self.tree
    }

    /// The texture mapper.
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// The texture mapper, mutably.
    pub fn mapper_mut(&mut self) -> &mut M {
        &mut self.mapper
    }

    /// The last viewport the content side reported.
    #[must_use]
    pub const fn viewport(&self) -> Option<&ViewportState> {
        self.viewport.as_ref()
    }

    /// Whether frames are painted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Drains the queue and applies every record. Returns the number applied.
    pub fn sync_remote_content(&mut self) -> usize {
        let commands = self.receiver.drain();
        let count = commands.len();
        for command in commands {
            self.apply_command(command);
        }
        count
    }

    /// Applies one record. References to layers the tree does not know are
    /// skipped.
    pub fn apply_command(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::CreateLayers(ids) => {
                for id in ids {
                    self.tree.create_layer(id);
                }
            }
            SyncCommand::DeleteLayers(ids) => {
                for id in ids {
                    self.tree.destroy_layer(&mut self.mapper, id);
                    self.remote_layers.remove(&id);
                }
            }
            SyncCommand::SetRootLayer(root) => self.tree.set_root(root),
            SyncCommand::LayerChildren { layer, children } => {
                self.tree.set_children(layer, &children);
            }
            SyncCommand::LayerState(record) => self.apply_state(*record),
            SyncCommand::FilterSet { layer, filters } => {
                if let Some(mut state) = self.tree.layer(layer).map(|l| l.state().clone()) {
                    state.filters = filters;
                    self.tree.set_state(layer, state);
                }
            }
            SyncCommand::AnimationSet { layer, animations } => {
                self.tree.set_animations(layer, animations);
            }
            SyncCommand::CreateTile { layer, tile, scale } => {
                if let Some(store) = self.remote_store(layer) {
                    store.create_tile(tile.0, scale);
                    self.tiles_created += 1;
                }
            }
            SyncCommand::UpdateTile {
                layer,
                tile,
                update,
            } => {
                if let Some(Backing::Remote(store)) = self.tree.backing_mut(layer) {
                    store.update_tile(
                        tile.0,
                        StagedUpdate {
                            buffer: update.buffer,
                            source_rect: update.source_rect,
                            tile_rect: update.tile_rect,
                            offset: update.offset,
                        },
                    );
                }
            }
            SyncCommand::RemoveTile { layer, tile } => {
                if let Some(Backing::Remote(store)) = self.tree.backing_mut(layer) {
                    store.remove_tile(tile.0);
                }
            }
            SyncCommand::CreateImageBacking(_) => {}
            SyncCommand::UpdateImageBacking { image, buffer } => {
                self.staged_images.insert(image, buffer);
            }
            SyncCommand::RemoveImageBacking(image) => {
                self.staged_images.remove(&image);
                self.tree.remove_image(&mut self.mapper, image.0);
            }
            SyncCommand::ViewportState(viewport) => {
                self.tree
                    .set_viewport_size(&mut self.mapper, viewport.visible_rect.size());
                self.viewport = Some(viewport);
            }
            SyncCommand::FrameDone => self.frames_pending += 1,
        }
    }

    fn apply_state(&mut self, record: LayerStateRecord) {
        let id = record.id;
        if !self.tree.contains(id) {
            return;
        }
        self.tree.set_state(id, record.state);
        if record.changes.contains(ChangeMask::MASK) {
            self.tree.set_mask(id, record.mask);
        }
        if record.changes.contains(ChangeMask::REPLICA) {
            self.tree.set_replica(id, record.replica);
        }
        if record.changes.contains(ChangeMask::CONTENTS) {
            let contents = match record.contents {
                RemoteContents::None => Contents::None,
                RemoteContents::SolidColor(color) => Contents::SolidColor(color),
                RemoteContents::Image(image) => Contents::Image(image.0),
            };
            self.tree.set_contents(id, contents);
        }
    }

    /// The layer's remote store, created on first use.
    fn remote_store(&mut self, layer: LayerId) -> Option<&mut RemoteBackingStore> {
        let size = self.tree.layer(layer)?.state().geometry.size;
        if !matches!(self.tree.layer(layer)?.backing(), Backing::Remote(_)) {
            let mut store = RemoteBackingStore::new();
            store.set_size(size);
            self.tree
                .set_backing(&mut self.mapper, layer, Backing::Remote(store));
        }
        self.remote_layers.insert(layer);
        match self.tree.backing_mut(layer) {
            Some(Backing::Remote(store)) => Some(store),
            _ => None,
        }
    }

    /// Uploads every staged tile and image. Runs once per frame.
    pub fn commit_tile_operations(&mut self, tracer: &mut Tracer<'_>) -> CommitEvent {
        let mut event = CommitEvent {
            frame_index: self.frame_index,
            tiles_created: core::mem::take(&mut self.tiles_created),
            tiles_updated: 0,
            tiles_removed: 0,
            images_updated: 0,
        };
        for &layer in &self.remote_layers {
            if let Some(Backing::Remote(store)) = self.tree.backing_mut(layer) {
                let stats = store.commit(&mut self.mapper);
                event.tiles_updated += stats.updated;
                event.tiles_removed += stats.removed;
            }
        }
        for (image, pixels) in core::mem::take(&mut self.staged_images) {
            self.tree.set_image(&mut self.mapper, image.0, &pixels);
            event.images_updated += 1;
        }
        tracer.commit(&event);
        event
    }

    /// Syncs, commits and paints one frame at `now`, then tells the content
    /// side the frame is done.
    ///
    /// Returns `None` while inactive.
    pub fn paint_to_current(&mut self, now: f64, tracer: &mut Tracer<'_>) -> Option<PaintStats> {
        if !self.active {
            return None;
        }
        let frame_index = self.frame_index;
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::Sync,
            timestamp: now,
        });
        self.sync_remote_content();
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::Sync,
            timestamp: now,
        });

        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::Commit,
            timestamp: now,
        });
        self.commit_tile_operations(tracer);
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::Commit,
            timestamp: now,
        });

        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::Paint,
            timestamp: now,
        });
        let running = self.tree.apply_animations(now);
        let stats = self.tree.paint(&mut self.mapper);
        tracer.paint(&PaintEvent {
            frame_index,
            layers_painted: stats.layers_painted,
            draw_calls: stats.draw_calls,
            intermediate_surfaces: stats.intermediate_surfaces,
            animations_running: running,
        });
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::Paint,
            timestamp: now,
        });

        self.render_next_frame();
        self.frame_index += 1;
        Some(stats)
    }

    /// Acknowledges every painted frame marker so the content side flushes
    /// again.
    fn render_next_frame(&mut self) {
        for _ in 0..core::mem::take(&mut self.frames_pending) {
            if self.receiver.notify(RendererEvent::FrameCompleted).is_err() {
                break;
            }
        }
    }

    /// Frees every texture and stops painting. Layers stay mirrored; the
    /// content side is asked to send tiles and images again.
    ///
    /// Call with the content side's tree locked, so no flush interleaves.
    pub fn purge_resources(&mut self) {
        self.tree.release_textures(&mut self.mapper);
        self.staged_images.clear();
        self.active = false;
        let _ = self.receiver.notify(RendererEvent::ResourcesPurged);
    }

    /// Resumes or pauses painting. Resuming releases a content side that is
    /// waiting for a frame.
    ///
    /// Call with the content side's tree locked, so no flush interleaves.
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        if active {
            self.frames_pending = 0;
            let _ = self.receiver.notify(RendererEvent::FrameCompleted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{TileId, TileUpdate};
    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use crate::queue::channel;
    use kurbo::{Point, Rect, Size};
    use lamina_core::color::Color;
    use lamina_core::layer::{LayerClient, LayerImage, LayerTree, PaintContext};
    use lamina_render::SoftwareTextureMapper;

    struct Solid(Color);

    impl LayerClient for Solid {
        fn paint_contents(&mut self, _layer: LayerId, context: &mut PaintContext<'_>) {
            context.fill_rect(Rect::new(0.0, 0.0, 1e4, 1e4), self.0);
        }
    }

    fn pipeline() -> (
        LayerTree,
        Coordinator,
        LayerTreeRenderer<SoftwareTextureMapper>,
    ) {
        let (tx, rx) = channel();
        let mut tree = LayerTree::new();
        tree.set_client(Box::new(Solid(Color::rgb(0, 0, 255))));
        let coordinator = Coordinator::new(tx, CoordinatorConfig::DEFAULT);
        let renderer = LayerTreeRenderer::new(
            rx,
            SoftwareTextureMapper::new(32, 32),
            CompositorConfig::DEFAULT,
        );
        (tree, coordinator, renderer)
    }

    fn frame(
        tree: &mut LayerTree,
        coordinator: &mut Coordinator,
        renderer: &mut LayerTreeRenderer<SoftwareTextureMapper>,
    ) -> Option<PaintStats> {
        coordinator.flush(tree, 0.0, &mut Tracer::none());
        renderer.paint_to_current(0.0, &mut Tracer::none())
    }

    fn simple_scene(tree: &mut LayerTree) -> (LayerId, LayerId) {
        let root = tree.create_layer();
        tree.set_size(root, Size::new(32.0, 32.0));
        let child = tree.create_layer();
        tree.set_position(child, Point::new(8.0, 8.0));
        tree.set_size(child, Size::new(8.0, 8.0));
        tree.set_draws_content(child, true);
        tree.add_child(root, child);
        tree.set_root(Some(root));
        (root, child)
    }

    #[test]
    fn remote_tiles_reach_the_target() {
        let (mut tree, mut coordinator, mut renderer) = pipeline();
        let (root, child) = simple_scene(&mut tree);
        let stats = frame(&mut tree, &mut coordinator, &mut renderer).unwrap();

        assert_eq!(renderer.tree().root(), Some(root));
        assert_eq!(renderer.tree().children(root), [child]);
        assert!(stats.draw_calls >= 1);
        let target = renderer.mapper().target();
        assert_eq!(target.get(10, 10), Color::rgb(0, 0, 255).premultiply());
        assert_eq!(target.get(2, 2).a, 0);
    }

    #[test]
    fn painting_releases_the_coordinator() {
        let (mut tree, mut coordinator, mut renderer) = pipeline();
        simple_scene(&mut tree);
        assert!(coordinator.flush(&mut tree, 0.0, &mut Tracer::none()));
        assert!(coordinator.is_waiting_for_frame());
        renderer.paint_to_current(0.0, &mut Tracer::none());
        assert!(!coordinator.is_waiting_for_frame());
    }

    #[test]
    fn tile_updates_wait_for_commit() {
        let (_, _, mut renderer) = pipeline();
        let layer = LayerId::from_raw(1);
        renderer.apply_command(SyncCommand::CreateLayers(vec![layer]));
        renderer.apply_command(SyncCommand::CreateTile {
            layer,
            tile: TileId(0),
            scale: 1.0,
        });
        let rect = Rect::new(0.0, 0.0, 4.0, 4.0);
        for _ in 0..3 {
            renderer.apply_command(SyncCommand::UpdateTile {
                layer,
                tile: TileId(0),
                update: TileUpdate {
                    source_rect: rect,
                    tile_rect: rect,
                    buffer: Arc::new(PixelBuffer::filled(4, 4, Color::WHITE)),
                    offset: Point::ZERO,
                },
            });
        }
        let event = renderer.commit_tile_operations(&mut Tracer::none());
        assert_eq!(event.tiles_created, 1);
        assert_eq!(event.tiles_updated, 1, "updates to one tile coalesce");
        let event = renderer.commit_tile_operations(&mut Tracer::none());
        assert_eq!(event.tiles_updated, 0);
    }

    #[test]
    fn dangling_references_are_skipped() {
        let (_, _, mut renderer) = pipeline();
        let parent = LayerId::from_raw(1);
        let ghost = LayerId::from_raw(2);
        renderer.apply_command(SyncCommand::CreateLayers(vec![parent]));
        renderer.apply_command(SyncCommand::LayerChildren {
            layer: parent,
            children: vec![ghost],
        });
        renderer.apply_command(SyncCommand::CreateTile {
            layer: ghost,
            tile: TileId(0),
            scale: 1.0,
        });
        assert!(renderer.tree().children(parent).is_empty());
        assert!(!renderer.tree().contains(ghost));
    }

    #[test]
    fn image_backings_are_uploaded_at_commit() {
        let (mut tree, mut coordinator, mut renderer) = pipeline();
        let root = tree.create_layer();
        tree.set_size(root, Size::new(4.0, 4.0));
        tree.set_contents_rect(root, Rect::new(0.0, 0.0, 4.0, 4.0));
        tree.set_contents_to_image(
            root,
            Some(LayerImage::new(3, PixelBuffer::filled(4, 4, Color::WHITE))),
        );
        tree.set_root(Some(root));
        frame(&mut tree, &mut coordinator, &mut renderer);

        assert_eq!(renderer.tree().image_count(), 1);
        assert_eq!(renderer.mapper().target().get(1, 1), Color::WHITE.premultiply());

        tree.set_contents_to_image(root, None);
        frame(&mut tree, &mut coordinator, &mut renderer);
        assert_eq!(renderer.tree().image_count(), 0);
    }

    #[test]
    fn purge_and_reactivate_restores_content() {
        let (mut tree, mut coordinator, mut renderer) = pipeline();
        let (_, child) = simple_scene(&mut tree);
        frame(&mut tree, &mut coordinator, &mut renderer);

        renderer.purge_resources();
        assert!(!renderer.is_active());
        assert!(frame(&mut tree, &mut coordinator, &mut renderer).is_none());

        renderer.set_active(true);
        frame(&mut tree, &mut coordinator, &mut renderer);
        assert!(matches!(
            renderer.tree().layer(child).map(|l| l.backing()),
            Some(Backing::Remote(store)) if store.tile_count() == 1
        ));
        let target = renderer.mapper().target();
        assert_eq!(target.get(10, 10), Color::rgb(0, 0, 255).premultiply());
    }

    #[test]
    fn deleted_layers_leave_the_mirror() {
        let (mut tree, mut coordinator, mut renderer) = pipeline();
        let (root, child) = simple_scene(&mut tree);
        frame(&mut tree, &mut coordinator, &mut renderer);

        tree.destroy_layer(child);
        frame(&mut tree, &mut coordinator, &mut renderer);
        assert!(!renderer.tree().contains(child));
        assert!(renderer.tree().children(root).is_empty());
    }
}
