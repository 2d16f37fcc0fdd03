// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Same-thread mirroring of a scene graph into a compositing tree.

use alloc::vec::Vec;

use kurbo::{Rect, Size};
use lamina_core::backend::Presenter;
use lamina_core::dirty::ChangeMask;
use lamina_core::layer::{LayerContents, LayerId, LayerTree, TreeChanges};
use lamina_core::pixels::PixelBuffer;
use lamina_core::trace::{PaintEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer};

use super::paint::PaintStats;
use super::{Backing, CompositingTree, CompositorConfig, Contents};
use crate::backing_store::{TileChurn, TiledBackingStore};
use crate::texture::TextureMapper;

/// A [`Presenter`] that owns a [`CompositingTree`] and the texture mapper it
/// paints with.
///
/// Painted content is pulled from the scene graph's client during
/// [`apply`](Presenter::apply) and uploaded into tiled backing stores, so
/// a frame is `apply` followed by [`render`](Self::render).
#[derive(Debug)]
pub struct DirectCompositor<M> {
    tree: CompositingTree,
    mapper: M,
    frame_index: u64,
}

impl<M: TextureMapper> DirectCompositor<M> {
    /// Creates an empty compositor drawing through `mapper`.
    pub fn new(mapper: M, config: CompositorConfig) -> Self {
        Self {
            tree: CompositingTree::new(config),
            mapper,
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

    /// Index of the next frame [`render`](Self::render) draws.
    #[must_use]
    pub const fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Records the viewport size used to key pooled surfaces.
    pub fn set_viewport_size(&mut self, size: Size) {
        self.tree.set_viewport_size(&mut self.mapper, size);
    }

    /// Frees every texture while keeping the mirrored layers.
    pub fn release_textures(&mut self) {
        self.tree.release_textures(&mut self.mapper);
    }

    /// Evaluates animations at `now` and draws the tree.
    pub fn render(&mut self, now: f64, tracer: &mut Tracer<'_>) -> PaintStats {
        let frame_index = self.frame_index;
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
        self.frame_index += 1;
        stats
    }

    fn sync_contents(&mut self, tree: &LayerTree, id: LayerId) {
        let contents = match tree.contents(id) {
            LayerContents::None => Contents::None,
            LayerContents::SolidColor(color) => Contents::SolidColor(*color),
            LayerContents::Image(image) => {
                if !self.tree.has_image(image.key) {
                    self.tree.set_image(&mut self.mapper, image.key, &image.pixels);
                }
                Contents::Image(image.key)
            }
        };
        self.tree.set_contents(id, contents);
    }

    /// Keeps the layer's tiles matching its size and repaints the damage.
    fn sync_backing(&mut self, tree: &mut LayerTree, id: LayerId) {
        let state = tree.state(id);
        let size = state.geometry.size;
        if !state.flags.draws_content || size.is_zero_area() {
            if self.tree.layer(id).is_some_and(|l| !l.backing().is_none()) {
                self.tree.set_backing(&mut self.mapper, id, Backing::None);
            }
            tree.take_needs_display(id);
            return;
        }

        let tiling = self.tree.config().tiling;
        let has_store = matches!(
            self.tree.layer(id).map(|l| l.backing()),
            Some(Backing::Tiled(_))
        );
        if !has_store {
            let store = TiledBackingStore::new(tiling);
            self.tree.set_backing(&mut self.mapper, id, Backing::Tiled(store));
        }
        let Some(Backing::Tiled(store)) = self.tree.backing_mut(id) else {
            return;
        };

        let has_alpha = !state.flags.contents_opaque;
        let churn = store.resize_or_rebuild(&mut self.mapper, size, has_alpha);
        let mut damage = tree.take_needs_display(id);
        if churn != TileChurn::default() {
            // Tiles moved or were created; nothing in them is valid.
            damage.invalidate_all();
        }

        let bounds = size.to_rect();
        let rects: Vec<Rect> = damage
            .resolve(bounds)
            .into_iter()
            .map(|r| r.intersect(bounds).expand())
            .filter(|r| r.width() >= 1.0 && r.height() >= 1.0)
            .collect();
        for rect in rects {
            let mut buffer = PixelBuffer::for_size(rect.size());
            tree.paint_contents(id, rect, &mut buffer);
            let Some(Backing::Tiled(store)) = self.tree.backing_mut(id) else {
                return;
            };
            store.update_contents(&mut self.mapper, &buffer, rect, has_alpha);
        }
    }
}

impl<M: TextureMapper> Presenter for DirectCompositor<M> {
    fn apply(&mut self, tree: &mut LayerTree, changes: &TreeChanges) {
        for &id in &changes.removed {
            self.tree.destroy_layer(&mut self.mapper, id);
        }
        for &id in &changes.added {
            self.tree.create_layer(id);
        }

        // Relations first, so state applied below lands in the right subtree.
        for &(id, mask) in &changes.changed {
            if !tree.is_alive(id) {
                continue;
            }
            self.tree.create_layer(id);
            if mask.contains(ChangeMask::CHILDREN) {
                let children: Vec<LayerId> = tree.children(id).collect();
                self.tree.set_children(id, &children);
            }
        }
        for &(id, mask) in &changes.changed {
            if !tree.is_alive(id) {
                continue;
            }
            if mask.contains(ChangeMask::MASK) {
                self.tree.set_mask(id, tree.mask_layer(id));
            }
            if mask.contains(ChangeMask::REPLICA) {
                self.tree.set_replica(id, tree.replica_layer(id));
            }
        }

        let mut contents_changed = false;
        for &(id, mask) in &changes.changed {
            if !tree.is_alive(id) {
                continue;
            }
            if mask.intersects(ChangeMask::STATE | ChangeMask::FILTERS) {
                self.tree.set_state(id, tree.state(id));
            }
            if mask.contains(ChangeMask::ANIMATIONS) {
                self.tree.set_animations(id, tree.animations(id).clone());
            }
            if mask.contains(ChangeMask::CONTENTS) {
                self.sync_contents(tree, id);
                contents_changed = true;
            }
            self.sync_backing(tree, id);
        }

        self.tree.set_root(tree.root());
        if contents_changed || !changes.removed.is_empty() {
            self.tree.prune_images(&mut self.mapper);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use core::cell::Cell;

    use kurbo::{Point, Rect, Size};
    use lamina_core::backend::Presenter;
    use lamina_core::color::Color;
    use lamina_core::layer::{LayerClient, LayerId, LayerImage, LayerTree, PaintContext};
    use lamina_core::pixels::PixelBuffer;
    use lamina_core::trace::Tracer;

    use super::DirectCompositor;
    use crate::compositor::{Backing, CompositorConfig, Contents};
    use crate::software::SoftwareTextureMapper;

    /// Fills whatever it is asked to paint and counts the calls.
    struct Fill {
        color: Color,
        calls: Rc<Cell<usize>>,
    }

    impl LayerClient for Fill {
        fn paint_contents(&mut self, _layer: LayerId, context: &mut PaintContext<'_>) {
            self.calls.set(self.calls.get() + 1);
            context.fill_rect(Rect::new(-1e4, -1e4, 1e4, 1e4), self.color);
        }
    }

    fn scene(color: Color) -> (LayerTree, LayerId, LayerId, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let mut tree = LayerTree::new();
        tree.set_client(Box::new(Fill {
            color,
            calls: calls.clone(),
        }));
        let root = tree.create_layer();
        tree.set_size(root, Size::new(40.0, 40.0));
        let child = tree.create_layer();
        tree.set_position(child, Point::new(10.0, 10.0));
        tree.set_size(child, Size::new(20.0, 20.0));
        tree.set_draws_content(child, true);
        tree.add_child(root, child);
        tree.set_root(Some(root));
        (tree, root, child, calls)
    }

    fn frame(compositor: &mut DirectCompositor<SoftwareTextureMapper>, tree: &mut LayerTree) {
        let changes = tree.take_changes();
        compositor.apply(tree, &changes);
        compositor.render(0.0, &mut Tracer::none());
    }

    #[test]
    fn painted_content_reaches_the_target() {
        let (mut tree, root, child, calls) = scene(Color::rgb(255, 0, 0));
        let mut compositor =
            DirectCompositor::new(SoftwareTextureMapper::new(40, 40), CompositorConfig::DEFAULT);
        frame(&mut compositor, &mut tree);

        assert_eq!(compositor.tree().root(), Some(root));
        assert_eq!(compositor.tree().children(root), [child]);
        assert!(matches!(
            compositor.tree().layer(child).map(|l| l.backing()),
            Some(Backing::Tiled(_))
        ));
        assert_eq!(calls.get(), 1);

        let target = compositor.mapper().target();
        assert_eq!(target.get(15, 15), Color::rgb(255, 0, 0).premultiply());
        assert_eq!(target.get(5, 5).a, 0);
    }

    #[test]
    fn clean_layers_are_not_repainted() {
        let (mut tree, _, child, calls) = scene(Color::WHITE);
        let mut compositor =
            DirectCompositor::new(SoftwareTextureMapper::new(40, 40), CompositorConfig::DEFAULT);
        frame(&mut compositor, &mut tree);
        frame(&mut compositor, &mut tree);
        assert_eq!(calls.get(), 1);

        tree.set_needs_display(child);
        frame(&mut compositor, &mut tree);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn dropping_draws_content_frees_the_backing() {
        let (mut tree, _, child, _) = scene(Color::WHITE);
        let mut compositor =
            DirectCompositor::new(SoftwareTextureMapper::new(40, 40), CompositorConfig::DEFAULT);
        frame(&mut compositor, &mut tree);

        tree.set_draws_content(child, false);
        frame(&mut compositor, &mut tree);
        assert!(compositor.tree().layer(child).unwrap().backing().is_none());
    }

    #[test]
    fn destroyed_layers_leave_the_mirror() {
        let (mut tree, root, child, _) = scene(Color::WHITE);
        let mut compositor =
            DirectCompositor::new(SoftwareTextureMapper::new(40, 40), CompositorConfig::DEFAULT);
        frame(&mut compositor, &mut tree);

        tree.destroy_layer(child);
        frame(&mut compositor, &mut tree);
        assert!(!compositor.tree().contains(child));
        assert!(compositor.tree().children(root).is_empty());
    }

    #[test]
    fn images_are_registered_once_and_pruned() {
        let (mut tree, _, child, _) = scene(Color::WHITE);
        let image = LayerImage::new(7, PixelBuffer::filled(4, 4, Color::BLACK));
        tree.set_contents_to_image(child, Some(image));
        let mut compositor =
            DirectCompositor::new(SoftwareTextureMapper::new(40, 40), CompositorConfig::DEFAULT);
        frame(&mut compositor, &mut tree);
        assert_eq!(
            compositor.tree().layer(child).unwrap().contents(),
            Contents::Image(7)
        );
        assert_eq!(compositor.tree().image_count(), 1);

        tree.set_contents_to_image(child, None);
        frame(&mut compositor, &mut tree);
        assert_eq!(compositor.tree().image_count(), 0);
    }
}
