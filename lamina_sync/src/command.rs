// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Records of the sync command stream.
//!
//! Every scene-graph mutation that the renderer must mirror is carried by
//! exactly one record type. Within a batch, records are grouped by
//! [`SyncStage`]: layer lifetimes and child lists come first, then images,
//! layer properties, tiles and animations, and the frame marker last.
//! [`CommandBatch`] keeps that order no matter the order records are pushed.

use std::sync::Arc;

use kurbo::{Point, Rect};
use lamina_core::animation::Animations;
use lamina_core::color::Color;
use lamina_core::dirty::ChangeMask;
use lamina_core::filter::FilterOperations;
use lamina_core::layer::{LayerId, LayerState};
use lamina_core::pixels::PixelBuffer;

use crate::viewport::ViewportState;

/// Identifies one tile of one layer's content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(pub u32);

/// Identifies a directly composited image across the sync boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageBackingId(pub u64);

/// Direct contents as seen by the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum RemoteContents {
    /// None.
    #[default]
    None,
    /// A solid fill of the contents rect.
    SolidColor(Color),
    /// A registered image backing.
    Image(ImageBackingId),
}

/// Full state of one layer, sent when any state bit changed.
#[derive(Clone, Debug)]
pub struct LayerStateRecord {
    /// The layer.
    pub id: LayerId,
    /// Which fields changed since the previous record.
    pub changes: ChangeMask,
    /// Geometry, flags, opacity and filters.
    pub state: LayerState,
    /// Parent at the time of the flush.
    pub parent: Option<LayerId>,
    /// Mask layer.
    pub mask: Option<LayerId>,
    /// Replica layer.
    pub replica: Option<LayerId>,
    /// Direct contents.
    pub contents: RemoteContents,
}

/// Pixels for one tile.
#[derive(Clone, Debug)]
pub struct TileUpdate {
    /// Rect to read from `buffer`.
    pub source_rect: Rect,
    /// The tile's rect in layer content space.
    pub tile_rect: Rect,
    /// Painted pixels, shared between every tile the paint touched.
    pub buffer: Arc<PixelBuffer>,
    /// Where `source_rect` lands inside the tile.
    pub offset: Point,
}

/// One record of the command stream.
#[derive(Clone, Debug)]
pub enum SyncCommand {
    /// Layers to create.
    CreateLayers(Vec<LayerId>),
    /// Layers to destroy.
    DeleteLayers(Vec<LayerId>),
    /// The layer painting starts from.
    SetRootLayer(Option<LayerId>),
    /// A layer's full state.
    LayerState(Box<LayerStateRecord>),
    /// A layer's complete child list, in paint order.
    LayerChildren {
        /// The parent.
        layer: LayerId,
        /// Its children.
        children: Vec<LayerId>,
    },
    /// Allocates a tile.
    CreateTile {
        /// Owning layer.
        layer: LayerId,
        /// New tile.
        tile: TileId,
        /// Content scale the tile is painted at.
        scale: f64,
    },
    /// Stages new pixels for a tile; uploaded at the next commit.
    UpdateTile {
        /// Owning layer.
        layer: LayerId,
        /// Target tile.
        tile: TileId,
        /// The pixels.
        update: TileUpdate,
    },
    /// Frees a tile at the next commit.
    RemoveTile {
        /// Owning layer.
        layer: LayerId,
        /// The tile.
        tile: TileId,
    },
    /// Registers an image backing.
    CreateImageBacking(ImageBackingId),
    /// Stages an image backing's pixels; uploaded at the next commit.
    UpdateImageBacking {
        /// The backing.
        image: ImageBackingId,
        /// Decoded pixels.
        buffer: Arc<PixelBuffer>,
    },
    /// Unregisters an image backing.
    RemoveImageBacking(ImageBackingId),
    /// Replaces a layer's animations.
    AnimationSet {
        /// The layer.
        layer: LayerId,
        /// The complete set.
        animations: Animations,
    },
    /// Replaces a layer's filters.
    FilterSet {
        /// The layer.
        layer: LayerId,
        /// The complete list.
        filters: FilterOperations,
    },
    /// Visible rect, scale and scroll trajectory of the content.
    ViewportState(ViewportState),
    /// Ends a flush. The renderer acknowledges it after painting.
    FrameDone,
}

/// Position of a record within a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncStage {
    /// Layer creation and deletion.
    Lifetime,
    /// Root and child lists.
    Topology,
    /// Image backings that layer states may reference.
    Images,
    /// Layer states and filters.
    Properties,
    /// Tile allocation and pixels.
    Tiles,
    /// Animation lists.
    Animations,
    /// Image backings no longer referenced.
    Cleanup,
    /// Viewport and the frame marker.
    Frame,
}

impl SyncStage {
    const COUNT: usize = 8;

    const fn index(self) -> usize {
        self as usize
    }
}

impl SyncCommand {
    /// The stage this record belongs to.
    #[must_use]
    pub const fn stage(&self) -> SyncStage {
        match self {
            Self::CreateLayers(_) | Self::DeleteLayers(_) => SyncStage::Lifetime,
            Self::SetRootLayer(_) | Self::LayerChildren { .. } => SyncStage::Topology,
            Self::CreateImageBacking(_) | Self::UpdateImageBacking { .. } => SyncStage::Images,
            Self::LayerState(_) | Self::FilterSet { .. } => SyncStage::Properties,
            Self::CreateTile { .. } | Self::UpdateTile { .. } | Self::RemoveTile { .. } => {
                SyncStage::Tiles
            }
            Self::AnimationSet { .. } => SyncStage::Animations,
            Self::RemoveImageBacking(_) => SyncStage::Cleanup,
            Self::ViewportState(_) | Self::FrameDone => SyncStage::Frame,
        }
    }

    /// The layer a per-layer record targets.
    #[must_use]
    pub fn layer(&self) -> Option<LayerId> {
        match self {
            Self::LayerState(record) => Some(record.id),
            Self::LayerChildren { layer, .. }
            | Self::CreateTile { layer, .. }
            | Self::UpdateTile { layer, .. }
            | Self::RemoveTile { layer, .. }
            | Self::AnimationSet { layer, .. }
            | Self::FilterSet { layer, .. } => Some(*layer),
            _ => None,
        }
    }
}

/// Collects one flush worth of records in stage order.
#[derive(Debug, Default)]
pub struct CommandBatch {
    stages: [Vec<SyncCommand>; SyncStage::COUNT],
}

impl CommandBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `command` to the end of its stage.
    pub fn push(&mut self, command: SyncCommand) {
        self.stages[command.stage().index()].push(command);
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// Returns `true` if no record was pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }

    /// The records, stage by stage, in push order within a stage.
    #[must_use]
    pub fn finish(self) -> Vec<SyncCommand> {
        self.stages.into_iter().flatten().collect()
    }
}

/// Returns `true` if `commands` never goes back to an earlier stage.
#[must_use]
pub fn is_structurally_ordered(commands: &[SyncCommand]) -> bool {
    commands.windows(2).all(|w| w[0].stage() <= w[1].stage())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_orders_by_stage() {
        let id = LayerId::from_raw(3);
        let mut batch = CommandBatch::new();
        batch.push(SyncCommand::FrameDone);
        batch.push(SyncCommand::AnimationSet {
            layer: id,
            animations: Animations::new(),
        });
        batch.push(SyncCommand::LayerChildren {
            layer: id,
            children: Vec::new(),
        });
        batch.push(SyncCommand::CreateLayers(vec![id]));
        assert_eq!(batch.len(), 4);

        let commands = batch.finish();
        assert!(is_structurally_ordered(&commands));
        assert!(matches!(commands[0], SyncCommand::CreateLayers(_)));
        assert!(matches!(commands[3], SyncCommand::FrameDone));
    }

    #[test]
    fn properties_after_children_is_ordered_but_not_the_reverse() {
        let id = LayerId::from_raw(1);
        let children = SyncCommand::LayerChildren {
            layer: id,
            children: Vec::new(),
        };
        let filters = SyncCommand::FilterSet {
            layer: id,
            filters: FilterOperations::default(),
        };
        assert!(is_structurally_ordered(&[children.clone(), filters.clone()]));
        assert!(!is_structurally_ordered(&[filters, children]));
    }

    #[test]
    fn per_layer_records_name_their_layer() {
        let id = LayerId::from_raw(9);
        let record = SyncCommand::RemoveTile {
            layer: id,
            tile: TileId(0),
        };
        assert_eq!(record.layer(), Some(id));
        assert_eq!(SyncCommand::FrameDone.layer(), None);
    }
}
