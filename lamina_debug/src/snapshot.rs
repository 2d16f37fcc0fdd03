// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON snapshots of a layer tree.
//!
//! Unlike the text dump in `lamina_core`, every property is written, so a
//! snapshot can be diffed field by field between two frames.

use std::io::{self, Write};

use kurbo::Rect;
use lamina_core::color::Color;
use lamina_core::layer::{LayerContents, LayerId, LayerTree};
use lamina_core::transform::Transform3d;
use serde_json::{Map, Value, json};

/// Returns a JSON object describing the subtree under `root`, or
/// [`Value::Null`] if `root` is not alive.
#[must_use]
pub fn layer_snapshot(tree: &LayerTree, root: LayerId) -> Value {
    if !tree.is_alive(root) {
        return Value::Null;
    }
    let geometry = tree.geometry(root);
    let flags = tree.flags(root);

    let mut object = Map::new();
    object.insert("id".into(), json!(root.to_raw()));
    if !tree.name(root).is_empty() {
        object.insert("name".into(), json!(tree.name(root)));
    }
    object.insert(
        "position".into(),
        json!([geometry.position.x, geometry.position.y]),
    );
    object.insert(
        "anchor".into(),
        json!([
            geometry.anchor_point.x,
            geometry.anchor_point.y,
            geometry.anchor_point.z
        ]),
    );
    object.insert(
        "size".into(),
        json!([geometry.size.width, geometry.size.height]),
    );
    object.insert(
        "bounds_origin".into(),
        json!([geometry.bounds_origin.x, geometry.bounds_origin.y]),
    );
    object.insert("transform".into(), matrix(&geometry.transform));
    object.insert(
        "children_transform".into(),
        matrix(&geometry.children_transform),
    );
    object.insert("contents_rect".into(), rect(geometry.contents_rect));
    object.insert("contents_scale".into(), json!(geometry.contents_scale));
    object.insert("opacity".into(), json!(tree.opacity(root)));
    object.insert(
        "background_color".into(),
        color(tree.background_color(root)),
    );
    object.insert(
        "flags".into(),
        json!({
            "contents_opaque": flags.contents_opaque,
            "backface_visible": flags.backface_visible,
            "masks_to_bounds": flags.masks_to_bounds,
            "draws_content": flags.draws_content,
            "contents_visible": flags.contents_visible,
            "preserves_3d": flags.preserves_3d,
            "fixed_to_viewport": flags.fixed_to_viewport,
        }),
    );
    object.insert("contents".into(), contents(tree.contents(root)));
    object.insert(
        "filters".into(),
        Value::Array(
            tree.filters(root)
                .operations()
                .iter()
                .map(|op| json!(format!("{:?}", op.kind())))
                .collect(),
        ),
    );
    object.insert(
        "animations".into(),
        Value::Array(
            tree.animations(root)
                .iter()
                .map(|a| {
                    json!({
                        "name": a.name(),
                        "property": a.property().name(),
                        "active": a.is_active(),
                    })
                })
                .collect(),
        ),
    );
    if let Some(mask) = tree.mask_layer(root) {
        object.insert("mask".into(), layer_snapshot(tree, mask));
    }
    if let Some(replica) = tree.replica_layer(root) {
        object.insert("replica".into(), layer_snapshot(tree, replica));
    }
    object.insert(
        "children".into(),
        Value::Array(
            tree.children(root)
                .map(|child| layer_snapshot(tree, child))
                .collect(),
        ),
    );
    Value::Object(object)
}

/// Snapshots the whole tree, from its root.
#[must_use]
pub fn tree_snapshot(tree: &LayerTree) -> Value {
    json!({
        "layers": tree.live_count(),
        "root": tree.root().map_or(Value::Null, |root| layer_snapshot(tree, root)),
    })
}

/// Writes [`tree_snapshot`] as pretty-printed JSON.
pub fn write_snapshot(tree: &LayerTree, writer: &mut dyn Write) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, &tree_snapshot(tree))?;
    Ok(())
}

fn matrix(m: &Transform3d) -> Value {
    if m.is_identity() {
        return json!("identity");
    }
    json!(m.cols)
}

fn rect(r: Rect) -> Value {
    json!([r.x0, r.y0, r.width(), r.height()])
}

fn color(c: Color) -> Value {
    json!(format!("#{:02x}{:02x}{:02x}{:02x}", c.r, c.g, c.b, c.a))
}

fn contents(contents: &LayerContents) -> Value {
    match contents {
        LayerContents::None => Value::Null,
        LayerContents::SolidColor(c) => json!({ "solid_color": color(*c) }),
        LayerContents::Image(image) => json!({
            "image": image.key,
            "width": image.pixels.width(),
            "height": image.pixels.height(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Point, Size};
    use lamina_core::layer::LayerImage;
    use lamina_core::pixels::PixelBuffer;

    #[test]
    fn nested_layers_appear_as_children() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        let child = tree.create_layer();
        tree.set_name(child, "child");
        tree.add_child(root, child);
        tree.set_position(child, Point::new(4.0, 8.0));
        tree.set_size(child, Size::new(10.0, 20.0));
        tree.set_root(Some(root));

        let snapshot = tree_snapshot(&tree);
        assert_eq!(snapshot["layers"], 2);
        let child = &snapshot["root"]["children"][0];
        assert_eq!(child["name"], "child");
        assert_eq!(child["position"], json!([4.0, 8.0]));
        assert_eq!(child["size"], json!([10.0, 20.0]));
        assert_eq!(child["transform"], "identity");
    }

    #[test]
    fn mask_and_contents_are_described() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        let mask = tree.create_layer();
        tree.set_mask_layer(root, Some(mask));
        tree.set_contents_to_image(root, Some(LayerImage::new(9, PixelBuffer::new(3, 2))));

        let snapshot = layer_snapshot(&tree, root);
        assert_eq!(snapshot["contents"]["image"], 9);
        assert_eq!(snapshot["contents"]["width"], 3);
        assert!(snapshot["mask"].is_object());
        assert_eq!(snapshot["mask"]["id"], mask.to_raw());
    }

    #[test]
    fn dead_layers_and_empty_trees_are_null() {
        let mut tree = LayerTree::new();
        assert!(tree_snapshot(&tree)["root"].is_null());
        let layer = tree.create_layer();
        tree.destroy_layer(layer);
        assert!(layer_snapshot(&tree, layer).is_null());
    }

    #[test]
    fn snapshot_writes_json() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        tree.set_root(Some(root));
        let mut out = Vec::new();
        write_snapshot(&tree, &mut out).unwrap();
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["layers"], 1);
    }
}
