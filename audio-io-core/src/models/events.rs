use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use super::audio_models::RouteChangeReason;

/// Notifications the platform emits into the session controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HardwareEvent {
    InterruptionBegan,
    /// `should_resume` is the platform's hint that playback may restart.
    InterruptionEnded { should_resume: bool },
    RouteChanged(RouteChangeReason),
    MediaServicesReset,
    ApplicationBecameActive,
    /// New output volume, nominally in `[0, 1]`.
    OutputVolumeChanged(f64),
}

/// An event stamped with its emission order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencedEvent {
    pub sequence: u64,
    pub event: HardwareEvent,
}

/// Sending half handed to the hardware collaborator while observers are registered.
///
/// Safe to call from any platform thread except the render context.
/// Sequence numbers are taken and sent under one lock, so the queue always
/// holds events in sequence order even with concurrent emitters.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<SequencedEvent>,
    last_sequence: Arc<Mutex<u64>>,
}

impl EventSink {
    /// Queue an event for the control context. Returns `false` once the
    /// receiving queue has been dropped.
    pub fn emit(&self, event: HardwareEvent) -> bool {
        let mut last = self.last_sequence.lock();
        let sequence = *last + 1;
        if self.tx.send(SequencedEvent { sequence, event }).is_err() {
            return false;
        }
        *last = sequence;
        true
    }

    /// Sequence number of the most recently queued event (0 if none).
    pub fn last_sequence(&self) -> u64 {
        *self.last_sequence.lock()
    }
}

/// Receiving half owned by the session controller.
#[derive(Debug)]
pub struct EventQueue {
    rx: Receiver<SequencedEvent>,
    sink: EventSink,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            rx,
            sink: EventSink {
                tx,
                last_sequence: Arc::new(Mutex::new(0)),
            },
        }
    }

    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    pub fn last_sequence(&self) -> u64 {
        self.sink.last_sequence()
    }

    /// Pop the next pending event without blocking.
    pub fn try_next(&self) -> Option<SequencedEvent> {
        self.rx.try_recv().ok()
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Drop every queued event. Returns how many were discarded.
    pub fn discard_pending(&self) -> usize {
        self.rx.try_iter().count()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
