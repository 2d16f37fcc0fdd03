// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the flush/commit/paint pipeline.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! layer tree, the sync coordinator and the compositor call at each stage.
//! All method bodies default to no-ops, so implementing only the events you
//! care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! [`FrameSummaryBuilder`] collects phase timestamps and per-phase counters
//! during a frame and produces a [`FrameSummary`] at the end.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`LayerChange`], [`TileEvent`]
//!   and [`DamageRect`] events plus the corresponding `TraceSink` methods.

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which stage of the pipeline is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Content side: walking the scene graph and encoding changes.
    Flush,
    /// Compositing side: applying changes to the compositing tree.
    Sync,
    /// Compositing side: uploading staged tile and image pixels.
    Commit,
    /// Compositing side: drawing the tree.
    Paint,
}

/// Which property group of a layer changed.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerField {
    /// Position, anchor, size or transforms.
    Geometry,
    /// Opacity.
    Opacity,
    /// Backing content, solid color or image.
    Contents,
    /// Boolean rendering flags.
    Flags,
    /// Mask or replica.
    Effects,
    /// Filters.
    Filters,
    /// Animations.
    Animations,
    /// Child list.
    Children,
}

/// What happened to a tile.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileEventKind {
    /// A tile was created.
    Created,
    /// A tile's pixels were replaced.
    Updated,
    /// A stale tile was reassigned to a new rect.
    Recycled,
    /// A tile was deleted.
    Removed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Marks the beginning of a pipeline phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Caller-clock time in seconds.
    pub timestamp: f64,
}

/// Marks the end of a pipeline phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Caller-clock time in seconds.
    pub timestamp: f64,
}

/// Emitted after the content side flushed its scene graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Layers whose state was pushed.
    pub layers_synced: u32,
    /// Commands (or direct operations) emitted.
    pub commands: u32,
}

/// Emitted after staged tile and image uploads were committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Tiles created.
    pub tiles_created: u32,
    /// Tile uploads performed.
    pub tiles_updated: u32,
    /// Tiles removed.
    pub tiles_removed: u32,
    /// Image backings uploaded.
    pub images_updated: u32,
}

/// Emitted after a paint pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaintEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Layers that produced at least one draw.
    pub layers_painted: u32,
    /// Texture and solid-color draws issued.
    pub draw_calls: u32,
    /// Intermediate surfaces acquired.
    pub intermediate_surfaces: u32,
    /// Whether any animation is still running.
    pub animations_running: bool,
}

/// Per-frame summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Flush duration in seconds (0 if not measured).
    pub flush_seconds: f64,
    /// Sync duration in seconds (0 if not measured).
    pub sync_seconds: f64,
    /// Commit duration in seconds (0 if not measured).
    pub commit_seconds: f64,
    /// Paint duration in seconds (0 if not measured).
    pub paint_seconds: f64,
    /// Flush counters.
    pub flush: FlushEvent,
    /// Commit counters.
    pub commit: CommitEvent,
    /// Paint counters.
    pub paint: PaintEvent,
}

/// A per-frame layer change record.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct LayerChange {
    /// Index of the layer that changed.
    pub layer_index: u32,
    /// Which field changed.
    pub field: LayerField,
}

/// A per-tile record.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct TileEvent {
    /// Layer key owning the tile.
    pub layer: u64,
    /// Tile identifier within the layer.
    pub tile: u32,
    /// What happened.
    pub kind: TileEventKind,
}

/// An axis-aligned damage rectangle.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct DamageRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the pipeline.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after a content-side flush.
    fn on_flush(&mut self, e: &FlushEvent) {
        _ = e;
    }

    /// Called after staged uploads are committed.
    fn on_commit(&mut self, e: &CommitEvent) {
        _ = e;
    }

    /// Called after a paint pass.
    fn on_paint(&mut self, e: &PaintEvent) {
        _ = e;
    }

    /// Called with a per-frame summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called with per-frame layer changes (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_layer_changes(&mut self, frame_index: u64, changes: &[LayerChange]) {
        _ = (frame_index, changes);
    }

    /// Called with tile lifecycle events (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_tile_events(&mut self, frame_index: u64, events: &[TileEvent]) {
        _ = (frame_index, events);
    }

    /// Called with per-frame damage rectangles (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        _ = (frame_index, rects);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FlushEvent`].
    #[inline]
    pub fn flush(&mut self, e: &FlushEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_flush(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CommitEvent`].
    #[inline]
    pub fn commit(&mut self, e: &CommitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_commit(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PaintEvent`].
    #[inline]
    pub fn paint(&mut self, e: &PaintEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_paint(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_frame_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits layer changes (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn layer_changes(&mut self, frame_index: u64, changes: &[LayerChange]) {
        if let Some(s) = &mut self.sink {
            s.on_layer_changes(frame_index, changes);
        }
    }

    /// Emits tile events (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn tile_events(&mut self, frame_index: u64, events: &[TileEvent]) {
        if let Some(s) = &mut self.sink {
            s.on_tile_events(frame_index, events);
        }
    }

    /// Emits damage rectangles (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        if let Some(s) = &mut self.sink {
            s.on_damage_rects(frame_index, rects);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps and counters during a frame and produces a
/// [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    frame_index: u64,
    phase_starts: [Option<f64>; 4],
    phase_ends: [Option<f64>; 4],
    flush: FlushEvent,
    commit: CommitEvent,
    paint: PaintEvent,
}

impl FrameSummaryBuilder {
    /// Starts building a summary for `frame_index`.
    #[must_use]
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            phase_starts: [None; 4],
            phase_ends: [None; 4],
            flush: FlushEvent::default(),
            commit: CommitEvent::default(),
            paint: PaintEvent::default(),
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: f64) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: f64) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Records flush counters.
    pub fn set_flush(&mut self, e: FlushEvent) {
        self.flush = e;
    }

    /// Records commit counters.
    pub fn set_commit(&mut self, e: CommitEvent) {
        self.commit = e;
    }

    /// Records paint counters.
    pub fn set_paint(&mut self, e: PaintEvent) {
        self.paint = e;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.frame_index,
            flush_seconds: self.phase_duration(PhaseKind::Flush),
            sync_seconds: self.phase_duration(PhaseKind::Sync),
            commit_seconds: self.phase_duration(PhaseKind::Commit),
            paint_seconds: self.phase_duration(PhaseKind::Paint),
            flush: self.flush,
            commit: self.commit,
            paint: self.paint,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> f64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => (end - start).max(0.0),
            _ => 0.0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Flush => 0,
        PhaseKind::Sync => 1,
        PhaseKind::Commit => 2,
        PhaseKind::Paint => 3,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
