// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Rich events ([`on_layer_changes`](TraceSink::on_layer_changes),
//! [`on_tile_events`](TraceSink::on_tile_events),
//! [`on_damage_rects`](TraceSink::on_damage_rects)) store only the count.

use lamina_core::trace::{
    CommitEvent, DamageRect, FlushEvent, FrameSummary, LayerChange, PaintEvent, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, TileEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PHASE_BEGIN: u8 = 1;
const TAG_PHASE_END: u8 = 2;
const TAG_FLUSH: u8 = 3;
const TAG_COMMIT: u8 = 4;
const TAG_PAINT: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;
const TAG_LAYER_CHANGES_COUNT: u8 = 7;
const TAG_TILE_EVENTS_COUNT: u8 = 8;
const TAG_DAMAGE_RECTS_COUNT: u8 = 9;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_count(&mut self, len: usize) {
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Flush => 0,
            PhaseKind::Sync => 1,
            PhaseKind::Commit => 2,
            PhaseKind::Paint => 3,
        });
    }

    fn write_flush(&mut self, e: &FlushEvent) {
        self.write_u64(e.frame_index);
        self.write_u32(e.layers_synced);
        self.write_u32(e.commands);
    }

    fn write_commit(&mut self, e: &CommitEvent) {
        self.write_u64(e.frame_index);
        self.write_u32(e.tiles_created);
        self.write_u32(e.tiles_updated);
        self.write_u32(e.tiles_removed);
        self.write_u32(e.images_updated);
    }

    fn write_paint(&mut self, e: &PaintEvent) {
        self.write_u64(e.frame_index);
        self.write_u32(e.layers_painted);
        self.write_u32(e.draw_calls);
        self.write_u32(e.intermediate_surfaces);
        self.write_u8(u8::from(e.animations_running));
    }
}

impl TraceSink for RecorderSink {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_f64(e.timestamp);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_f64(e.timestamp);
    }

    fn on_flush(&mut self, e: &FlushEvent) {
        self.write_u8(TAG_FLUSH);
        self.write_flush(e);
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.write_u8(TAG_COMMIT);
        self.write_commit(e);
    }

    fn on_paint(&mut self, e: &PaintEvent) {
        self.write_u8(TAG_PAINT);
        self.write_paint(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        self.write_f64(s.flush_seconds);
        self.write_f64(s.sync_seconds);
        self.write_f64(s.commit_seconds);
        self.write_f64(s.paint_seconds);
        self.write_flush(&s.flush);
        self.write_commit(&s.commit);
        self.write_paint(&s.paint);
    }

    fn on_layer_changes(&mut self, frame_index: u64, changes: &[LayerChange]) {
        self.write_u8(TAG_LAYER_CHANGES_COUNT);
        self.write_u64(frame_index);
        self.write_count(changes.len());
    }

    fn on_tile_events(&mut self, frame_index: u64, events: &[TileEvent]) {
        self.write_u8(TAG_TILE_EVENTS_COUNT);
        self.write_u64(frame_index);
        self.write_count(events.len());
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        self.write_u8(TAG_DAMAGE_RECTS_COUNT);
        self.write_u64(frame_index);
        self.write_count(rects.len());
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`FlushEvent`].
    Flush(FlushEvent),
    /// A [`CommitEvent`].
    Commit(CommitEvent),
    /// A [`PaintEvent`].
    Paint(PaintEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// Layer-change count for a frame.
    LayerChangesCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of layer changes.
        count: u32,
    },
    /// Tile-event count for a frame.
    TileEventsCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of tile events.
        count: u32,
    },
    /// Damage-rect count for a frame.
    DamageRectsCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of damage rects.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Flush,
            1 => PhaseKind::Sync,
            2 => PhaseKind::Commit,
            _ => PhaseKind::Paint,
        })
    }

    fn read_flush(&mut self) -> Option<FlushEvent> {
        Some(FlushEvent {
            frame_index: self.read_u64()?,
            layers_synced: self.read_u32()?,
            commands: self.read_u32()?,
        })
    }

    fn read_commit(&mut self) -> Option<CommitEvent> {
        Some(CommitEvent {
            frame_index: self.read_u64()?,
            tiles_created: self.read_u32()?,
            tiles_updated: self.read_u32()?,
            tiles_removed: self.read_u32()?,
            images_updated: self.read_u32()?,
        })
    }

    fn read_paint(&mut self) -> Option<PaintEvent> {
        Some(PaintEvent {
            frame_index: self.read_u64()?,
            layers_painted: self.read_u32()?,
            draw_calls: self.read_u32()?,
            intermediate_surfaces: self.read_u32()?,
            animations_running: self.read_u8()? != 0,
        })
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_f64()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_f64()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index: self.read_u64()?,
            flush_seconds: self.read_f64()?,
            sync_seconds: self.read_f64()?,
            commit_seconds: self.read_f64()?,
            paint_seconds: self.read_f64()?,
            flush: self.read_flush()?,
            commit: self.read_commit()?,
            paint: self.read_paint()?,
        }))
    }

    fn decode_count(&mut self) -> Option<(u64, u32)> {
        let frame_index = self.read_u64()?;
        let count = self.read_u32()?;
        Some((frame_index, count))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_FLUSH => self.read_flush().map(RecordedEvent::Flush),
            TAG_COMMIT => self.read_commit().map(RecordedEvent::Commit),
            TAG_PAINT => self.read_paint().map(RecordedEvent::Paint),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_LAYER_CHANGES_COUNT => self
                .decode_count()
                .map(|(frame_index, count)| RecordedEvent::LayerChangesCount { frame_index, count }),
            TAG_TILE_EVENTS_COUNT => self
                .decode_count()
                .map(|(frame_index, count)| RecordedEvent::TileEventsCount { frame_index, count }),
            TAG_DAMAGE_RECTS_COUNT => self
                .decode_count()
                .map(|(frame_index, count)| RecordedEvent::DamageRectsCount { frame_index, count }),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
