// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mirroring a lamina layer tree across a thread boundary.
//!
//! The content side owns a [`LayerTree`](lamina_core::layer::LayerTree) and
//! a [`Coordinator`]. Each flush becomes one ordered batch of
//! [`SyncCommand`]s sent over a channel. The renderer side owns a
//! [`LayerTreeRenderer`], which drains the channel at the start of a paint,
//! applies the commands to its compositing tree, uploads staged tiles once
//! and paints.
//!
//! ```text
//!   LayerTree ──► Coordinator ──► [Vec<SyncCommand>] ──► LayerTreeRenderer
//!                      ▲                                       │
//!                      └──────────── RendererEvent ◄───────────┘
//! ```
//!
//! - [`command`]: record types and stage ordering.
//! - [`queue`]: the channel pair.
//! - [`coordinator`]: change-mask driven encoding, content tiles, image
//!   backings and frame pacing.
//! - [`renderer`]: command application, commit and paint.
//! - [`viewport`]: visible-rect forwarding.
//!
//! # Crate features
//!
//! - `trace` / `trace-rich`: Forwarded to `lamina_core` and `lamina_render`.

mod content_tiles;
mod image_backing;

pub mod command;
pub mod coordinator;
pub mod queue;
pub mod renderer;
pub mod viewport;

pub use command::{CommandBatch, ImageBackingId, SyncCommand, SyncStage, TileId};
pub use coordinator::{Coordinator, CoordinatorConfig, FlushStats};
pub use image_backing::{MAX_IMAGE_DIMENSION, is_directly_compositable};
pub use queue::{CommandReceiver, CommandSender, Disconnected, RendererEvent, channel};
pub use renderer::LayerTreeRenderer;
pub use viewport::{ViewportLimiter, ViewportState};
