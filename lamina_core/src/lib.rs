// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene graph, transforms and keyframe animation for tiled compositing.
//!
//! `lamina_core` provides the platform-independent half of a compositing
//! layer tree. It is `no_std` compatible (with `alloc`) and uses
//! struct-of-arrays storage with generational index handles.
//!
//! # Architecture
//!
//! ```text
//!   layout code
//!       │ setters, add_child, set_needs_display, add_animation
//!       ▼
//!   LayerTree ──► take_changes() ──► TreeChanges
//!                                        │
//!            ┌───────────────────────────┴───────────────┐
//!            ▼                                           ▼
//!   direct sync (lamina_render)              coordinator (lamina_sync)
//!            │                                           │ commands
//!            ▼                                           ▼
//!   CompositingTree ◄──────────────────────── LayerTreeRenderer
//!            │
//!            ▼
//!   paint traversal ──► TextureMapper
//! ```
//!
//! **[`layer`]**: the scene graph. Parent/child, mask and replica relations,
//! geometry and visual properties, repaint regions and per-layer change
//! masks. Setters are idempotent and notify a [`LayerClient`](layer::LayerClient).
//!
//! **[`dirty`]**: dirty channels (via `understory_dirty`) and the
//! [`ChangeMask`](dirty::ChangeMask) bit set.
//!
//! **[`transform`]**: column-major 4×4 [`Transform3d`](transform::Transform3d)
//! with inversion, projection, flattening and decomposition for blending.
//!
//! **[`layer_transform`]**: anchor-point placement and combination with the
//! parent, including flattening and the children transform.
//!
//! **[`transform_ops`]** and **[`filter`]**: CSS-style operation lists that
//! interpolate component-wise.
//!
//! **[`animation`]** and **[`timing_function`]**: keyframe animations with
//! iteration, direction, fill and easing.
//!
//! **[`pixels`]**, **[`color`]**, **[`region`]** and **[`tiling`]**: pixel
//! buffers, damage regions and the tile grid shared by both compositing
//! paths.
//!
//! **[`backend`]**: the [`Presenter`](backend::Presenter) trait that both
//! mirrors implement.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! pipeline instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (enabled by default): Enables `std` support in dependencies.
//!   Without it, float math comes from `libm` through `kurbo`.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-layer
//!   change, tile and damage-rect events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod animation;
pub mod backend;
pub mod color;
pub mod dirty;
pub mod filter;
pub mod layer;
pub mod layer_transform;
pub mod pixels;
pub mod region;
pub mod tiling;
pub mod timing_function;
pub mod trace;
pub mod transform;
pub mod transform_ops;
