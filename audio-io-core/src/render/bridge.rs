use std::sync::Arc;

use crate::models::audio_models::OsStatus;
use crate::render::buffers::{AudioBufferList, ChannelBuffers};
use crate::render::context::RenderContext;
use crate::render::registry::CallbackBinding;
use crate::traits::audio_hardware::RenderTransport;

/// Outcome of one render cycle, returned to the hardware collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Transport succeeded and the bound callback (if any) ran.
    Rendered,
    /// Gated off: a stream rebuild was in progress or the callback slot was busy.
    Skipped,
    /// The transport call returned a non-zero status; no callback ran.
    TransportFailed(OsStatus),
}

impl RenderStatus {
    /// Platform status code; skipping is not an error.
    pub fn code(&self) -> OsStatus {
        match self {
            Self::Rendered | Self::Skipped => 0,
            Self::TransportFailed(status) => *status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code() == 0
    }
}

/// Entry point the hardware collaborator calls once per buffer on the
/// real-time context.
///
/// Allocation-free and lock-free apart from a `try_lock` on the callback
/// slot. Cloning is cheap: all clones share one [`RenderContext`].
#[derive(Debug, Clone)]
pub struct RenderBridge {
    context: Arc<RenderContext>,
}

impl RenderBridge {
    pub fn new(context: Arc<RenderContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Render one buffer.
    ///
    /// 1. Skip untouched while the stream is being rebuilt.
    /// 2. Pull input from the hardware through `transport`.
    /// 3. Translate the descriptor into the per-channel pointer array.
    /// 4. Dispatch to the function callback, or else the delegate.
    pub fn render(
        &self,
        transport: &mut dyn RenderTransport,
        buffers: &mut AudioBufferList<'_, '_>,
        frame_count: usize,
    ) -> RenderStatus {
        let context = &*self.context;
        if context.is_reconstructing() {
            context.record_skipped();
            return RenderStatus::Skipped;
        }

        let Some(mut slot) = context.try_slot() else {
            context.record_skipped();
            return RenderStatus::Skipped;
        };

        if let Err(status) = transport.pull_input(buffers, frame_count) {
            context.record_transport_failure(status);
            return RenderStatus::TransportFailed(status);
        }

        let frames = frame_count.min(buffers.frame_capacity());
        let sample_rate = context.sample_rate();

        let slot = &mut *slot;
        let channels = buffers.copy_pointers(&mut slot.channel_pointers);

        match slot.registry.sample_mut() {
            Some(CallbackBinding::Function(callback)) => {
                // SAFETY: the pointers were just taken from `buffers`, which
                // stays exclusively borrowed and untouched until the view is dropped.
                let mut view =
                    unsafe { ChannelBuffers::from_raw(&slot.channel_pointers[..channels], frames) };
                callback(&mut view, sample_rate);
            }
            Some(CallbackBinding::Delegate(delegate)) => {
                delegate.render_buffers(buffers, frames);
            }
            None => {}
        }

        slot.clear_pointers();
        context.record_rendered();
        RenderStatus::Rendered
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::models::error::AudioIoError;
    use crate::render::registry::CallbackRegistry;
    use crate::traits::sample_delegate::SampleDelegate;

    /// Transport that fills input with a constant and counts calls.
    struct ConstantInput {
        value: f32,
        calls: usize,
        fail_with: Option<OsStatus>,
    }

    impl ConstantInput {
        fn new(value: f32) -> Self {
            Self {
                value,
                calls: 0,
                fail_with: None,
            }
        }
    }

    impl RenderTransport for ConstantInput {
        fn pull_input(
            &mut self,
            buffers: &mut AudioBufferList<'_, '_>,
            _frame_count: usize,
        ) -> Result<(), OsStatus> {
            self.calls += 1;
            if let Some(status) = self.fail_with {
                return Err(status);
            }
            for index in 0..buffers.channel_count() {
                if let Some(channel) = buffers.channel_mut(index) {
                    channel.fill(self.value);
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelegate {
        calls: AtomicUsize,
        frames: AtomicUsize,
    }

    impl SampleDelegate for CountingDelegate {
        fn render_buffers(&self, buffers: &mut AudioBufferList<'_, '_>, frame_count: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.frames.store(frame_count, Ordering::SeqCst);
            if let Some(channel) = buffers.channel_mut(0) {
                channel.fill(-1.0);
            }
        }
    }

    fn open_bridge(registry: CallbackRegistry) -> RenderBridge {
        let context = Arc::new(RenderContext::new(registry, 48000.0));
        context.end_reconstruction();
        RenderBridge::new(context)
    }

    fn run_cycle(
        bridge: &RenderBridge,
        transport: &mut ConstantInput,
        channels: usize,
        frames: usize,
    ) -> (RenderStatus, Vec<Vec<f32>>) {
        let mut storage = vec![vec![0.0f32; frames]; channels];
        let status = {
            let mut slices: Vec<&mut [f32]> = storage.iter_mut().map(|c| c.as_mut_slice()).collect();
            let mut list = AudioBufferList::new(&mut slices);
            bridge.render(transport, &mut list, frames)
        };
        (status, storage)
    }

    #[test]
    fn function_callback_overwrites_every_sample() {
        let mut registry = CallbackRegistry::default();
        registry.set_function(|channels, _| {
            channels.for_each_channel(|_, samples| samples.fill(0.5));
        });
        let bridge = open_bridge(registry);
        let mut transport = ConstantInput::new(0.1);

        let (status, output) = run_cycle(&bridge, &mut transport, 2, 256);

        assert_eq!(status, RenderStatus::Rendered);
        assert_eq!(output.len(), 2);
        assert!(output.iter().flatten().all(|&s| s == 0.5));
    }

    #[test]
    fn function_callback_sees_input_and_rate() {
        let seen = Arc::new(parking_lot::Mutex::new((0usize, 0usize, 0.0f64, 0.0f32)));
        let seen_cb = Arc::clone(&seen);

        let mut registry = CallbackRegistry::default();
        registry.set_function(move |channels, rate| {
            *seen_cb.lock() = (
                channels.channel_count(),
                channels.frame_count(),
                rate,
                channels.channel(1)[0],
            );
        });
        let bridge = open_bridge(registry);
        let mut transport = ConstantInput::new(0.25);

        run_cycle(&bridge, &mut transport, 3, 64);

        assert_eq!(*seen.lock(), (3, 64, 48000.0, 0.25));
    }

    #[test]
    fn gated_cycles_touch_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = Arc::clone(&calls);

        let mut registry = CallbackRegistry::default();
        registry.set_function(move |_, _| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        });
        let bridge = open_bridge(registry);
        bridge.context().begin_reconstruction();
        let mut transport = ConstantInput::new(0.3);

        for _ in 0..10 {
            let (status, output) = run_cycle(&bridge, &mut transport, 2, 32);
            assert_eq!(status, RenderStatus::Skipped);
            assert!(status.is_ok());
            assert!(output.iter().flatten().all(|&s| s == 0.0));
        }

        assert_eq!(transport.calls, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bridge.context().diagnostics().skipped_cycles, 10);
    }

    #[test]
    fn delegate_receives_original_descriptor() {
        let delegate = Arc::new(CountingDelegate::default());
        let mut registry = CallbackRegistry::default();
        registry.set_delegate(delegate.clone());
        let bridge = open_bridge(registry);
        let mut transport = ConstantInput::new(0.2);

        let (status, output) = run_cycle(&bridge, &mut transport, 2, 128);

        assert_eq!(status, RenderStatus::Rendered);
        assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
        assert_eq!(delegate.frames.load(Ordering::SeqCst), 128);
        assert!(output[0].iter().all(|&s| s == -1.0));
        assert!(output[1].iter().all(|&s| s == 0.2));
    }

    #[test]
    fn only_the_bound_style_runs() {
        let delegate = Arc::new(CountingDelegate::default());
        let function_calls = Arc::new(AtomicUsize::new(0));
        let function_calls_cb = Arc::clone(&function_calls);

        let mut registry = CallbackRegistry::default();
        registry.set_delegate(delegate.clone());
        registry.set_function(move |_, _| {
            function_calls_cb.fetch_add(1, Ordering::SeqCst);
        });
        let bridge = open_bridge(registry);
        let mut transport = ConstantInput::new(0.0);

        run_cycle(&bridge, &mut transport, 1, 16);
        assert_eq!(function_calls.load(Ordering::SeqCst), 1);
        assert_eq!(delegate.calls.load(Ordering::SeqCst), 0);

        bridge
            .context()
            .with_registry(|r| r.set_delegate(delegate.clone()));
        run_cycle(&bridge, &mut transport, 1, 16);
        assert_eq!(function_calls.load(Ordering::SeqCst), 1);
        assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transport_failure_skips_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = Arc::clone(&calls);

        let mut registry = CallbackRegistry::default();
        registry.set_function(move |_, _| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        });
        let bridge = open_bridge(registry);
        let mut transport = ConstantInput::new(0.0);
        transport.fail_with = Some(-50);

        let (status, _) = run_cycle(&bridge, &mut transport, 2, 16);

        assert_eq!(status, RenderStatus::TransportFailed(-50));
        assert_eq!(status.code(), -50);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bridge.context().diagnostics().transport_failures, 1);
        assert_eq!(
            bridge.context().transport_error(),
            Some(AudioIoError::TransportFailure(-50))
        );
    }

    #[test]
    fn frame_count_clamped_to_shortest_channel() {
        let frames_seen = Arc::new(AtomicUsize::new(0));
        let frames_cb = Arc::clone(&frames_seen);

        let mut registry = CallbackRegistry::default();
        registry.set_function(move |channels, _| {
            frames_cb.store(channels.frame_count(), Ordering::SeqCst);
        });
        let bridge = open_bridge(registry);
        let mut transport = ConstantInput::new(0.0);

        let mut left = vec![0.0f32; 64];
        let mut right = vec![0.0f32; 32];
        let mut slices: Vec<&mut [f32]> = vec![&mut left[..], &mut right[..]];
        let mut list = AudioBufferList::new(&mut slices);
        bridge.render(&mut transport, &mut list, 64);

        assert_eq!(frames_seen.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn unbound_registry_still_runs_transport() {
        let bridge = open_bridge(CallbackRegistry::default());
        let mut transport = ConstantInput::new(0.7);

        let (status, output) = run_cycle(&bridge, &mut transport, 1, 8);

        assert_eq!(status, RenderStatus::Rendered);
        assert_eq!(transport.calls, 1);
        assert!(output[0].iter().all(|&s| s == 0.7));
    }

    #[test]
    fn busy_slot_skips_cycle() {
        let bridge = open_bridge(CallbackRegistry::default());
        let mut transport = ConstantInput::new(0.0);

        bridge.context().with_registry(|_| {
            let (status, _) = run_cycle(&bridge, &mut transport, 1, 8);
            assert_eq!(status, RenderStatus::Skipped);
        });
        assert_eq!(transport.calls, 0);
    }
}
