// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! and durations are printed in milliseconds.

use std::io::Write;

use lamina_core::trace::{
    CommitEvent, DamageRect, FlushEvent, FrameSummary, LayerChange, PaintEvent, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, TileEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn ms(seconds: f64) -> f64 {
    seconds * 1000.0
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Flush => "flush",
        PhaseKind::Sync => "sync",
        PhaseKind::Commit => "commit",
        PhaseKind::Paint => "paint",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.3}ms",
            e.frame_index,
            phase_name(e.phase),
            ms(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.3}ms",
            e.frame_index,
            phase_name(e.phase),
            ms(e.timestamp),
        );
    }

    fn on_flush(&mut self, e: &FlushEvent) {
        let _ = writeln!(
            self.writer,
            "[flush] frame={} layers={} commands={}",
            e.frame_index, e.layers_synced, e.commands,
        );
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        let _ = writeln!(
            self.writer,
            "[commit] frame={} tiles +{} ~{} -{} images={}",
            e.frame_index, e.tiles_created, e.tiles_updated, e.tiles_removed, e.images_updated,
        );
    }

    fn on_paint(&mut self, e: &PaintEvent) {
        let animating = if e.animations_running { " animating" } else { "" };
        let _ = writeln!(
            self.writer,
            "[paint] frame={} layers={} draws={} surfaces={}{animating}",
            e.frame_index, e.layers_painted, e.draw_calls, e.intermediate_surfaces,
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} flush={:.3}ms sync={:.3}ms commit={:.3}ms paint={:.3}ms \
             draws={}",
            s.frame_index,
            ms(s.flush_seconds),
            ms(s.sync_seconds),
            ms(s.commit_seconds),
            ms(s.paint_seconds),
            s.paint.draw_calls,
        );
    }

    fn on_layer_changes(&mut self, frame_index: u64, changes: &[LayerChange]) {
        let _ = writeln!(
            self.writer,
            "[layers] frame={frame_index} changes={}",
            changes.len(),
        );
    }

    fn on_tile_events(&mut self, frame_index: u64, events: &[TileEvent]) {
        let _ = writeln!(
            self.writer,
            "[tiles] frame={frame_index} events={}",
            events.len(),
        );
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        let _ = writeln!(
            self.writer,
            "[damage] frame={frame_index} rects={}",
            rects.len(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_print_phase_in_milliseconds() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_phase_begin(&PhaseBeginEvent {
            frame_index: 1,
            phase: PhaseKind::Paint,
            timestamp: 0.5,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "[phase:begin] frame=1 paint at 500.000ms\n");
    }

    #[test]
    fn pretty_print_paint() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_paint(&PaintEvent {
            frame_index: 3,
            layers_painted: 2,
            draw_calls: 5,
            intermediate_surfaces: 0,
            animations_running: true,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.starts_with("[paint] frame=3"), "got: {output}");
        assert!(output.contains("draws=5"), "got: {output}");
        assert!(output.trim_end().ends_with("animating"), "got: {output}");
    }
}
