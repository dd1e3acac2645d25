use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::models::audio_models::{OsStatus, RenderDiagnostics, MAX_CHANNELS};
use crate::models::error::AudioIoError;
use crate::render::registry::CallbackRegistry;

/// Callback bindings plus the reusable per-channel pointer array.
///
/// Guarded by a mutex that the render path only ever `try_lock`s.
pub(crate) struct RenderSlot {
    pub(crate) registry: CallbackRegistry,
    pub(crate) channel_pointers: [*mut f32; MAX_CHANNELS],
}

// SAFETY: the pointers are only written and dereferenced inside a single
// render call while the slot is locked, and are nulled before unlocking.
unsafe impl Send for RenderSlot {}

impl RenderSlot {
    pub(crate) fn clear_pointers(&mut self) {
        self.channel_pointers.fill(std::ptr::null_mut());
    }
}

/// State shared between the control context and the render context.
///
/// The reconstruction flag is the only synchronization the render path
/// waits on: the control context raises it before touching the stream and
/// lowers it once a fresh stream is fully initialized.
pub struct RenderContext {
    reconstructing: AtomicBool,
    sample_rate_bits: AtomicU64,
    slot: Mutex<RenderSlot>,
    rendered_cycles: AtomicU64,
    skipped_cycles: AtomicU64,
    transport_failures: AtomicU64,
    // 0 until the transport first fails.
    last_transport_status: AtomicI32,
}

impl RenderContext {
    /// Starts gated: there is no stream until setup completes.
    pub fn new(registry: CallbackRegistry, sample_rate: f64) -> Self {
        Self {
            reconstructing: AtomicBool::new(true),
            sample_rate_bits: AtomicU64::new(sample_rate.to_bits()),
            slot: Mutex::new(RenderSlot {
                registry,
                channel_pointers: [std::ptr::null_mut(); MAX_CHANNELS],
            }),
            rendered_cycles: AtomicU64::new(0),
            skipped_cycles: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            last_transport_status: AtomicI32::new(0),
        }
    }

    pub fn channel_capacity(&self) -> usize {
        MAX_CHANNELS
    }

    pub fn begin_reconstruction(&self) {
        self.reconstructing.store(true, Ordering::Release);
    }

    pub fn end_reconstruction(&self) {
        self.reconstructing.store(false, Ordering::Release);
    }

    pub fn is_reconstructing(&self) -> bool {
        self.reconstructing.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate_bits.load(Ordering::Acquire))
    }

    pub fn set_sample_rate(&self, sample_rate: f64) {
        self.sample_rate_bits
            .store(sample_rate.to_bits(), Ordering::Release);
    }

    /// Run `f` against the callback registry from the control context.
    ///
    /// Blocks for at most one render cycle.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut CallbackRegistry) -> R) -> R {
        let mut slot = self.slot.lock();
        f(&mut slot.registry)
    }

    pub(crate) fn try_slot(&self) -> Option<MutexGuard<'_, RenderSlot>> {
        self.slot.try_lock()
    }

    pub(crate) fn record_rendered(&self) {
        self.rendered_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_failure(&self, status: OsStatus) {
        self.last_transport_status.store(status, Ordering::Relaxed);
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// The most recent render transport failure, if the transport ever failed.
    pub fn transport_error(&self) -> Option<AudioIoError> {
        match self.last_transport_status.load(Ordering::Relaxed) {
            0 => None,
            status => Some(AudioIoError::TransportFailure(status)),
        }
    }

    pub fn diagnostics(&self) -> RenderDiagnostics {
        RenderDiagnostics {
            rendered_cycles: self.rendered_cycles.load(Ordering::Relaxed),
            skipped_cycles: self.skipped_cycles.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("reconstructing", &self.is_reconstructing())
            .field("sample_rate", &self.sample_rate())
            .field("diagnostics", &self.diagnostics())
            .finish()
    }
}
