// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic text dump of a layer tree for diagnostics and tests.

use alloc::string::{String, ToString};
use core::fmt;

use kurbo::{Rect, Size};

use super::id::{INVALID, LayerId};
use super::properties::LayerContents;
use super::store::LayerTree;
use crate::layer_transform::{AnchorPoint, LayerTransform};
use crate::tiling::{TilingConfig, tile_rects};
use crate::transform::Transform3d;

/// Optional sections of a [`LayerTreeText`] dump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DumpFlags {
    /// Print slot indices and generations.
    pub debug_ids: bool,
    /// Print each layer's bounds mapped into root space.
    pub visible_rects: bool,
    /// Print the tile grid a backing store would use.
    pub tile_caches: bool,
    /// Print the repaint history.
    pub repaint_rects: bool,
    /// Print painting phases.
    pub painting_phases: bool,
    /// Print solid-color and image contents.
    pub content_layers: bool,
}

impl DumpFlags {
    /// Every optional section.
    pub const ALL: Self = Self {
        debug_ids: true,
        visible_rects: true,
        tile_caches: true,
        repaint_rects: true,
        painting_phases: true,
        content_layers: true,
    };
}

/// Displays the subtree under `root`.
///
/// Only non-default properties are printed, so the output for an unchanged
/// tree is stable across runs.
#[derive(Debug)]
pub struct LayerTreeText<'a> {
    tree: &'a LayerTree,
    root: LayerId,
    flags: DumpFlags,
}

impl<'a> LayerTreeText<'a> {
    /// Creates a dump of the subtree under `root`.
    #[must_use]
    pub fn new(tree: &'a LayerTree, root: LayerId, flags: DumpFlags) -> Self {
        Self { tree, root, flags }
    }
}

impl fmt::Display for LayerTreeText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tree.is_alive(self.root) {
            return writeln!(f, "(stale {:?})", self.root);
        }
        write_layer(f, self.tree, self.root.idx, 0, self.flags, &Transform3d::IDENTITY)
    }
}

impl LayerTree {
    /// Returns a text dump of the subtree under `root`, or of the tree root
    /// when `root` is `None`. Empty if there is no such layer.
    #[must_use]
    pub fn layer_tree_as_text(&self, root: Option<LayerId>, flags: DumpFlags) -> String {
        match root.or_else(|| self.root()) {
            Some(root) => LayerTreeText::new(self, root, flags).to_string(),
            None => String::new(),
        }
    }
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("  ")?;
    }
    Ok(())
}

fn write_rect(f: &mut fmt::Formatter<'_>, rect: Rect) -> fmt::Result {
    write!(
        f,
        "{:.2} {:.2} {:.2} {:.2}",
        rect.x0,
        rect.y0,
        rect.width(),
        rect.height()
    )
}

fn write_matrix(
    f: &mut fmt::Formatter<'_>,
    depth: usize,
    label: &str,
    m: &Transform3d,
) -> fmt::Result {
    indent(f, depth)?;
    write!(f, "({label} ")?;
    for col in &m.cols {
        write!(
            f,
            "[{:.2} {:.2} {:.2} {:.2}] ",
            col[0], col[1], col[2], col[3]
        )?;
    }
    writeln!(f, ")")
}

fn write_layer(
    f: &mut fmt::Formatter<'_>,
    tree: &LayerTree,
    idx: u32,
    depth: usize,
    flags: DumpFlags,
    parent_transform: &Transform3d,
) -> fmt::Result {
    let i = idx as usize;
    let geometry = &tree.geometry[i];
    let layer_flags = tree.flags[i];

    indent(f, depth)?;
    f.write_str("(Layer")?;
    if !tree.name[i].is_empty() {
        write!(f, " \"{}\"", tree.name[i])?;
    }
    if flags.debug_ids {
        write!(f, " {:?}", tree.id_at(idx))?;
    }
    writeln!(f)?;
    let d = depth + 1;

    if geometry.position.x != 0.0 || geometry.position.y != 0.0 {
        indent(f, d)?;
        writeln!(
            f,
            "(position {:.2} {:.2})",
            geometry.position.x, geometry.position.y
        )?;
    }
    if geometry.bounds_origin.x != 0.0 || geometry.bounds_origin.y != 0.0 {
        indent(f, d)?;
        writeln!(
            f,
            "(boundsOrigin {:.2} {:.2})",
            geometry.bounds_origin.x, geometry.bounds_origin.y
        )?;
    }
    if geometry.anchor_point != AnchorPoint::CENTER {
        indent(f, d)?;
        let a = geometry.anchor_point;
        writeln!(f, "(anchor {:.2} {:.2} {:.2})", a.x, a.y, a.z)?;
    }
    if geometry.size != Size::ZERO {
        indent(f, d)?;
        writeln!(
            f,
            "(bounds {:.2} {:.2})",
            geometry.size.width, geometry.size.height
        )?;
    }
    if tree.opacity[i] != 1.0 {
        indent(f, d)?;
        writeln!(f, "(opacity {:.2})", tree.opacity[i])?;
    }
    let bool_flags = [
        (layer_flags.contents_opaque, "(contentsOpaque 1)"),
        (layer_flags.preserves_3d, "(preserves3D 1)"),
        (layer_flags.draws_content, "(drawsContent 1)"),
        (!layer_flags.contents_visible, "(contentsVisible 0)"),
        (!layer_flags.backface_visible, "(backfaceVisibility hidden)"),
        (layer_flags.masks_to_bounds, "(masksToBounds 1)"),
        (layer_flags.fixed_to_viewport, "(fixedToViewport 1)"),
    ];
    for (set, text) in bool_flags {
        if set {
            indent(f, d)?;
            writeln!(f, "{text}")?;
        }
    }
    if !geometry.transform.is_identity() {
        write_matrix(f, d, "transform", &geometry.transform)?;
    }
    if !geometry.children_transform.is_identity() {
        write_matrix(f, d, "childrenTransform", &geometry.children_transform)?;
    }
    if !tree.filters[i].is_empty() {
        indent(f, d)?;
        writeln!(f, "(filters {})", tree.filters[i].operations().len())?;
    }
    let bg = tree.background_color[i];
    if !bg.is_transparent() {
        indent(f, d)?;
        writeln!(
            f,
            "(backgroundColor #{:02x}{:02x}{:02x}{:02x})",
            bg.r, bg.g, bg.b, bg.a
        )?;
    }
    if flags.content_layers {
        match &tree.contents[i] {
            LayerContents::None => {}
            LayerContents::SolidColor(c) => {
                indent(f, d)?;
                writeln!(
                    f,
                    "(contents solidColor #{:02x}{:02x}{:02x}{:02x})",
                    c.r, c.g, c.b, c.a
                )?;
            }
            LayerContents::Image(image) => {
                indent(f, d)?;
                writeln!(
                    f,
                    "(contents image {} {}x{})",
                    image.key,
                    image.pixels.width(),
                    image.pixels.height()
                )?;
            }
        }
    }

    let mut transform = LayerTransform::default();
    transform.set_position(geometry.position);
    transform.set_anchor_point(geometry.anchor_point);
    transform.set_size(geometry.size);
    transform.set_bounds_origin(geometry.bounds_origin);
    transform.set_local_transform(geometry.transform);
    transform.set_children_transform(geometry.children_transform);
    transform.set_flattening(!layer_flags.preserves_3d);
    transform.combine(parent_transform);

    if flags.visible_rects {
        indent(f, d)?;
        f.write_str("(visible rect ")?;
        write_rect(f, transform.combined().map_rect(transform.bounds()))?;
        writeln!(f, ")")?;
    }
    if flags.tile_caches && layer_flags.draws_content {
        let dim = TilingConfig::DEFAULT.tile_dimension;
        let scaled = Size::new(
            geometry.size.width * geometry.contents_scale,
            geometry.size.height * geometry.contents_scale,
        );
        indent(f, d)?;
        writeln!(
            f,
            "(tiles {})",
            tile_rects(scaled, Size::new(dim, dim)).len()
        )?;
    }
    if flags.repaint_rects && !tree.repaint_rects[i].is_empty() {
        indent(f, d)?;
        writeln!(f, "(repaint rects")?;
        for rect in &tree.repaint_rects[i] {
            indent(f, d + 1)?;
            f.write_str("(rect ")?;
            write_rect(f, *rect)?;
            writeln!(f, ")")?;
        }
        indent(f, d)?;
        writeln!(f, ")")?;
    }
    if flags.painting_phases {
        indent(f, d)?;
        writeln!(f, "(paintingPhases {:?})", tree.painting_phases[i])?;
    }

    let replica = tree.replica[i];
    if replica != INVALID {
        indent(f, d)?;
        writeln!(f, "(replica layer")?;
        write_layer(f, tree, replica, d + 1, flags, &transform.combined())?;
        indent(f, d)?;
        writeln!(f, ")")?;
    }
    let mask = tree.mask[i];
    if mask != INVALID {
        indent(f, d)?;
        writeln!(f, "(mask layer")?;
        write_layer(f, tree, mask, d + 1, flags, &transform.combined())?;
        indent(f, d)?;
        writeln!(f, ")")?;
    }

    let count = tree.children(tree.id_at(idx)).count();
    if count > 0 {
        indent(f, d)?;
        writeln!(f, "(children {count}")?;
        let mut child = tree.first_child[i];
        while child != INVALID {
            write_layer(
                f,
                tree,
                child,
                d + 1,
                flags,
                &transform.combined_for_children(),
            )?;
            child = tree.next_sibling[child as usize];
        }
        indent(f, d)?;
        writeln!(f, ")")?;
    }

    indent(f, depth)?;
    writeln!(f, ")")
}
