// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Texture mapping, tiled backing stores and the compositing paint traversal
//! for lamina.
//!
//! This crate is the compositing side of a [`lamina_core`] layer tree. It
//! provides:
//!
//! - [`TextureMapper`]: the drawing contract (textures, clips, surfaces,
//!   filters and masks) that a GPU or CPU backend implements.
//! - [`SoftwareTextureMapper`]: a CPU implementation used by tests and the
//!   demo, and [`RecordingTextureMapper`], which records a [`RenderPlan`]
//!   instead of drawing.
//! - [`TiledBackingStore`]: content split into texture-sized tiles, filled
//!   in-process. [`RemoteBackingStore`] holds tiles addressed by id for the
//!   coordinated path.
//! - [`CompositingTree`]: the mirror of the scene graph that is painted,
//!   with intermediate surfaces for group opacity, masks, replicas and
//!   filters, and depth ordering for 3-D rendering contexts.
//! - [`DirectCompositor`]: a [`Presenter`](lamina_core::backend::Presenter)
//!   that keeps a [`CompositingTree`] in sync in the same thread.
//!
//! # Crate features
//!
//! - `std` (enabled by default): Enables `std` support in dependencies.
//! - `trace` / `trace-rich`: Forwarded to `lamina_core`.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod backing_store;
pub mod compositor;
pub mod plan;
pub mod remote_store;
pub mod software;
pub mod surface_pool;
pub mod texture;
pub mod tile;

pub use backing_store::TiledBackingStore;
pub use compositor::{
    Backing, CompositingLayer, CompositingTree, CompositorConfig, Contents, DirectCompositor,
    PaintStats,
};
pub use plan::{RecordingTextureMapper, RenderPlan};
pub use remote_store::RemoteBackingStore;
pub use software::SoftwareTextureMapper;
pub use texture::{MaskInput, TextureId, TextureMapper};
