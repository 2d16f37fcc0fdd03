// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The channel pair between the content side and the renderer.
//!
//! Command batches flow one way; renderer events flow back. Neither side
//! blocks: the renderer takes everything available at the start of a paint,
//! and the coordinator polls for events before each flush.

use core::fmt;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::command::SyncCommand;

/// What the renderer reports back to the content side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererEvent {
    /// A frame ending in [`SyncCommand::FrameDone`] was painted.
    FrameCompleted,
    /// Every texture was freed; tiles and images must be sent again.
    ResourcesPurged,
}

/// The other end of the channel is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Disconnected;

impl fmt::Display for Disconnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sync channel disconnected")
    }
}

impl core::error::Error for Disconnected {}

/// Creates a connected sender and receiver.
#[must_use]
pub fn channel() -> (CommandSender, CommandReceiver) {
    let (commands_tx, commands_rx) = mpsc::channel();
    let (events_tx, events_rx) = mpsc::channel();
    (
        CommandSender {
            commands: commands_tx,
            events: events_rx,
        },
        CommandReceiver {
            commands: commands_rx,
            events: events_tx,
            disconnected: false,
        },
    )
}

/// Content-side end: sends batches, receives renderer events.
#[derive(Debug)]
pub struct CommandSender {
    commands: Sender<Vec<SyncCommand>>,
    events: Receiver<RendererEvent>,
}

impl CommandSender {
    /// Queues one batch.
    pub fn send(&self, batch: Vec<SyncCommand>) -> Result<(), Disconnected> {
        self.commands.send(batch).map_err(|_| Disconnected)
    }

    /// Takes every event the renderer sent since the last call.
    pub fn take_events(&self) -> Vec<RendererEvent> {
        self.events.try_iter().collect()
    }
}

/// Renderer-side end: drains batches, reports events.
#[derive(Debug)]
pub struct CommandReceiver {
    commands: Receiver<Vec<SyncCommand>>,
    events: Sender<RendererEvent>,
    disconnected: bool,
}

impl CommandReceiver {
    /// Takes every queued command without blocking, oldest batch first.
    pub fn drain(&mut self) -> Vec<SyncCommand> {
        let mut out = Vec::new();
        loop {
            match self.commands.try_recv() {
                Ok(batch) => out.extend(batch),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        out
    }

    /// Returns `true` once the content side has gone away and every batch
    /// it sent was drained.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Reports `event` to the content side.
    pub fn notify(&self, event: RendererEvent) -> Result<(), Disconnected> {
        self.events.send(event).map_err(|_| Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_takes_batches_in_order() {
        let (tx, mut rx) = channel();
        tx.send(vec![SyncCommand::SetRootLayer(None)]).unwrap();
        tx.send(vec![SyncCommand::FrameDone]).unwrap();

        let commands = rx.drain();
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], SyncCommand::SetRootLayer(None)));
        assert!(matches!(commands[1], SyncCommand::FrameDone));
        assert!(rx.drain().is_empty());
        assert!(!rx.is_disconnected());
    }

    #[test]
    fn events_flow_back() {
        let (tx, rx) = channel();
        rx.notify(RendererEvent::FrameCompleted).unwrap();
        rx.notify(RendererEvent::ResourcesPurged).unwrap();
        assert_eq!(
            tx.take_events(),
            [RendererEvent::FrameCompleted, RendererEvent::ResourcesPurged]
        );
        assert!(tx.take_events().is_empty());
    }

    #[test]
    fn dropped_sender_is_reported_after_draining() {
        let (tx, mut rx) = channel();
        tx.send(vec![SyncCommand::FrameDone]).unwrap();
        drop(tx);
        assert_eq!(rx.drain().len(), 1);
        assert!(rx.is_disconnected());
        assert_eq!(rx.notify(RendererEvent::FrameCompleted), Err(Disconnected));
    }

    #[test]
    fn batches_cross_threads() {
        let (tx, mut rx) = channel();
        let handle = std::thread::spawn(move || {
            tx.send(vec![SyncCommand::FrameDone]).unwrap();
        });
        handle.join().unwrap();
        assert_eq!(rx.drain().len(), 1);
    }
}
