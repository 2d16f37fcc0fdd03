// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Flush runs on the content thread and the other phases on the compositing
//! thread, so they are emitted on separate `tid`s.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use lamina_core::trace::PhaseKind;
use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

const CONTENT_TID: u32 = 0;
const COMPOSITOR_TID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Counter events carry no timestamp of their own; they are placed at the
/// most recent phase boundary seen before them.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut last_ts = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::PhaseBegin(e) => {
                last_ts = seconds_to_us(e.timestamp);
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.phase),
                    "cat": "Frame",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": phase_tid(e.phase),
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                last_ts = seconds_to_us(e.timestamp);
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.phase),
                    "cat": "Frame",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": phase_tid(e.phase),
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::Flush(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Flush",
                    "cat": "Sync",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": CONTENT_TID,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "layers_synced": e.layers_synced,
                        "commands": e.commands,
                    }
                }));
            }
            RecordedEvent::Commit(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Commit",
                    "cat": "Sync",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": COMPOSITOR_TID,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "tiles_created": e.tiles_created,
                        "tiles_updated": e.tiles_updated,
                        "tiles_removed": e.tiles_removed,
                        "images_updated": e.images_updated,
                    }
                }));
            }
            RecordedEvent::Paint(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Paint",
                    "cat": "Frame",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": COMPOSITOR_TID,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "layers_painted": e.layers_painted,
                        "draw_calls": e.draw_calls,
                        "intermediate_surfaces": e.intermediate_surfaces,
                        "animations_running": e.animations_running,
                    }
                }));
            }
            RecordedEvent::FrameSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSummary",
                    "cat": "Summary",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": COMPOSITOR_TID,
                    "s": "g",
                    "args": {
                        "frame_index": s.frame_index,
                        "flush_us": seconds_to_us(s.flush_seconds),
                        "sync_us": seconds_to_us(s.sync_seconds),
                        "commit_us": seconds_to_us(s.commit_seconds),
                        "paint_us": seconds_to_us(s.paint_seconds),
                        "draw_calls": s.paint.draw_calls,
                    }
                }));
            }
            RecordedEvent::LayerChangesCount { frame_index, count } => {
                events.push(rich_count("LayerChanges", last_ts, frame_index, count));
            }
            RecordedEvent::TileEventsCount { frame_index, count } => {
                events.push(rich_count("TileEvents", last_ts, frame_index, count));
            }
            RecordedEvent::DamageRectsCount { frame_index, count } => {
                events.push(rich_count("DamageRects", last_ts, frame_index, count));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn rich_count(name: &str, ts: f64, frame_index: u64, count: u32) -> Value {
    json!({
        "ph": "i",
        "name": name,
        "cat": "Rich",
        "ts": ts,
        "pid": 0,
        "tid": 0,
        "s": "p",
        "args": {
            "frame_index": frame_index,
            "count": count,
        }
    })
}

fn phase_tid(phase: PhaseKind) -> u32 {
    match phase {
        PhaseKind::Flush => CONTENT_TID,
        PhaseKind::Sync | PhaseKind::Commit | PhaseKind::Paint => COMPOSITOR_TID,
    }
}

fn seconds_to_us(seconds: f64) -> f64 {
    seconds * 1_000_000.0
}
