// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Combined-transform recomputation for dirty subtrees.

use alloc::vec::Vec;

use lamina_core::dirty;
use lamina_core::transform::Transform3d;

use super::CompositingTree;

impl CompositingTree {
    /// Recomputes combined transforms, facing and center depth of every
    /// layer whose geometry or ancestry changed.
    ///
    /// Returns the number of layers recomputed.
    pub fn update_transforms(&mut self) -> usize {
        let dirty: Vec<u32> = self
            .dirty
            .drain(dirty::TRANSFORM)
            .affected()
            .deterministic()
            .run()
            .collect();
        let mut count = 0;
        for idx in dirty {
            let Some(layer) = self.get(idx) else {
                continue;
            };
            // Masks and replicas are positioned relative to their target.
            let (mut parent_transform, parent_preserves_3d) =
                match (layer.effect_target, layer.parent) {
                    (Some(target), _) => match self.get(target) {
                        Some(t) => (t.transform.combined(), false),
                        None => (Transform3d::IDENTITY, false),
                    },
                    (None, Some(parent)) => match self.get(parent) {
                        Some(p) => (
                            p.transform.combined_for_children(),
                            p.state.flags.preserves_3d,
                        ),
                        None => (Transform3d::IDENTITY, false),
                    },
                    (None, None) => (Transform3d::IDENTITY, false),
                };
            if layer.state.flags.fixed_to_viewport {
                parent_transform =
                    parent_transform.pre_translate(self.scroll_delta.x, self.scroll_delta.y, 0.0);
            }

            let Some(layer) = self.slot_mut(idx) else {
                continue;
            };
            layer.transform.combine(&parent_transform);
            let combined = layer.transform.combined();
            layer.visible = match combined.inverse() {
                Some(inverse) => layer.state.flags.backface_visible || inverse.m33() >= 0.0,
                None => false,
            };
            layer.center_z = if parent_preserves_3d {
                let size = layer.state.geometry.size;
                combined.map_point3([size.width / 2.0, size.height / 2.0, 0.0])[2]
            } else {
                0.0
            };
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{id, sized};
    use super::super::{CompositingTree, Contents};
    use kurbo::{Point, Vec2};
    use lamina_core::color::Color;
    use lamina_core::layer_transform::AnchorPoint;
    use lamina_core::transform::Transform3d;

    const EPS: f64 = 1e-9;

    #[test]
    fn child_center_lands_in_parent_space() {
        let mut tree = CompositingTree::default();
        tree.create_layer(id(0));
        tree.create_layer(id(1));
        tree.set_state(id(0), sized(200.0, 200.0));
        let mut child = sized(100.0, 100.0);
        child.geometry.position = Point::new(10.0, 10.0);
        child.geometry.anchor_point = AnchorPoint::new(0.5, 0.5, 0.0);
        tree.set_state(id(1), child);
        tree.set_children(id(0), &[id(1)]);
        tree.update_transforms();

        let combined = tree.layer(id(1)).unwrap().combined_transform();
        let center = combined.map_point(Point::new(50.0, 50.0));
        assert!((center.x - 60.0).abs() < EPS);
        assert!((center.y - 60.0).abs() < EPS);
    }

    #[test]
    fn only_dirty_subtrees_are_recomputed() {
        let mut tree = CompositingTree::default();
        for n in 0..3 {
            tree.create_layer(id(n));
            tree.set_state(id(n), sized(10.0, 10.0));
        }
        tree.set_children(id(0), &[id(1)]);
        tree.update_transforms();
        assert_eq!(tree.update_transforms(), 0);

        let mut moved = sized(10.0, 10.0);
        moved.geometry.position = Point::new(5.0, 0.0);
        tree.set_state(id(1), moved);
        assert_eq!(tree.update_transforms(), 1);
    }

    #[test]
    fn parent_move_propagates_to_children() {
        let mut tree = CompositingTree::default();
        tree.create_layer(id(0));
        tree.create_layer(id(1));
        tree.set_children(id(0), &[id(1)]);
        tree.update_transforms();

        let mut moved = sized(10.0, 10.0);
        moved.geometry.position = Point::new(7.0, 3.0);
        tree.set_state(id(0), moved);
        tree.update_transforms();
        let origin = tree
            .layer(id(1))
            .unwrap()
            .combined_transform()
            .map_point(Point::ZERO);
        assert!((origin.x - 7.0).abs() < EPS);
        assert!((origin.y - 3.0).abs() < EPS);
    }

    #[test]
    fn back_facing_layer_is_hidden_unless_backface_visible() {
        let mut tree = CompositingTree::default();
        tree.create_layer(id(0));
        let mut state = sized(10.0, 10.0);
        state.geometry.transform = Transform3d::from_rotation(0.0, 1.0, 0.0, core::f64::consts::PI);
        state.flags.backface_visible = false;
        tree.set_state(id(0), state.clone());
        tree.update_transforms();
        assert!(!tree.layer(id(0)).unwrap().faces_viewer());

        state.flags.backface_visible = true;
        tree.set_state(id(0), state);
        tree.update_transforms();
        assert!(tree.layer(id(0)).unwrap().faces_viewer());
    }

    #[test]
    fn singular_transform_is_not_facing() {
        let mut tree = CompositingTree::default();
        tree.create_layer(id(0));
        let mut state = sized(10.0, 10.0);
        state.geometry.transform = Transform3d::from_scale(0.0, 1.0, 1.0);
        tree.set_state(id(0), state);
        tree.update_transforms();
        assert!(!tree.layer(id(0)).unwrap().faces_viewer());
    }

    #[test]
    fn mask_follows_its_target() {
        let mut tree = CompositingTree::default();
        tree.create_layer(id(0));
        tree.create_layer(id(1));
        let mut target = sized(10.0, 10.0);
        target.geometry.position = Point::new(20.0, 0.0);
        tree.set_state(id(0), target);
        tree.set_state(id(1), sized(10.0, 10.0));
        tree.set_mask(id(0), Some(id(1)));
        tree.update_transforms();
        let origin = tree
            .layer(id(1))
            .unwrap()
            .combined_transform()
            .map_point(Point::ZERO);
        assert!((origin.x - 20.0).abs() < EPS);
    }

    #[test]
    fn center_depth_is_set_under_preserve_3d() {
        let mut tree = CompositingTree::default();
        tree.create_layer(id(0));
        tree.create_layer(id(1));
        let mut parent = sized(10.0, 10.0);
        parent.flags.preserves_3d = true;
        tree.set_state(id(0), parent);
        let mut child = sized(10.0, 10.0);
        child.geometry.transform = Transform3d::from_translation(0.0, 0.0, 25.0);
        tree.set_state(id(1), child);
        tree.set_contents(id(1), Contents::SolidColor(Color::WHITE));
        tree.set_children(id(0), &[id(1)]);
        tree.update_transforms();
        assert!((tree.layer(id(1)).unwrap().center_z() - 25.0).abs() < EPS);
    }

    #[test]
    fn fixed_layers_counter_scroll() {
        let mut tree = CompositingTree::default();
        tree.create_layer(id(0));
        let mut state = sized(10.0, 10.0);
        state.flags.fixed_to_viewport = true;
        tree.set_state(id(0), state);
        tree.set_scroll_delta(Vec2::new(0.0, 40.0));
        tree.update_transforms();
        let origin = tree
            .layer(id(0))
            .unwrap()
            .combined_transform()
            .map_point(Point::ZERO);
        assert!((origin.y - 40.0).abs() < EPS);
    }

    #[test]
    fn toggling_fixed_flag_alone_recomputes_transform() {
        let mut tree = CompositingTree::default();
        tree.create_layer(id(0));
        let mut state = sized(10.0, 10.0);
        tree.set_state(id(0), state.clone());
        tree.set_scroll_delta(Vec2::new(0.0, 40.0));
        tree.update_transforms();
        let origin = |tree: &CompositingTree| {
            tree.layer(id(0))
                .unwrap()
                .combined_transform()
                .map_point(Point::ZERO)
        };
        assert!(origin(&tree).y.abs() < EPS);

        state.flags.fixed_to_viewport = true;
        tree.set_state(id(0), state.clone());
        assert_eq!(tree.update_transforms(), 1);
        assert!((origin(&tree).y - 40.0).abs() < EPS);

        state.flags.fixed_to_viewport = false;
        tree.set_state(id(0), state);
        tree.update_transforms();
        assert!(origin(&tree).y.abs() < EPS);
    }
}
