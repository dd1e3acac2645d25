use std::sync::Arc;

use crate::models::audio_models::{InputOrientation, PolarPattern, RenderDiagnostics};
use crate::models::config::AudioIoConfiguration;
use crate::models::error::AudioIoError;
use crate::models::events::HardwareEvent;
use crate::models::state::SessionState;
use crate::render::buffers::ChannelBuffers;
use crate::render::registry::CallbackRegistry;
use crate::session::controller::SessionController;
use crate::traits::audio_hardware::AudioHardware;
use crate::traits::sample_delegate::SampleDelegate;

/// Bidirectional audio I/O driver.
///
/// Delivers captured input to the bound callback once per hardware buffer
/// and plays back whatever the callback writes in place. Keeps the stream
/// alive across interruptions, route changes and media-service resets.
///
/// ```ignore
/// use audio_io_core::{AudioIoConfiguration, AudioIoDriver, LoopbackHardware};
///
/// let mut driver = AudioIoDriver::with_callback(
///     LoopbackHardware::stereo(48000.0),
///     AudioIoConfiguration::default(),
///     |channels, _rate| channels.for_each_channel(|_, s| s.fill(0.0)),
/// );
/// driver.start()?;
/// ```
pub struct AudioIoDriver<H: AudioHardware> {
    controller: SessionController<H>,
}

impl<H: AudioHardware> AudioIoDriver<H> {
    /// Create a driver that calls `callback` with per-channel sample buffers.
    pub fn with_callback<F>(hardware: H, config: AudioIoConfiguration, callback: F) -> Self
    where
        F: FnMut(&mut ChannelBuffers<'_>, f64) + Send + 'static,
    {
        let mut registry = CallbackRegistry::default();
        registry.set_function(callback);
        Self {
            controller: SessionController::new(hardware, config, registry),
        }
    }

    /// Create a driver that hands the native buffer descriptor to `delegate`.
    pub fn with_delegate(
        hardware: H,
        config: AudioIoConfiguration,
        delegate: Arc<dyn SampleDelegate>,
    ) -> Self {
        let mut registry = CallbackRegistry::default();
        registry.set_delegate(delegate);
        Self {
            controller: SessionController::new(hardware, config, registry),
        }
    }

    /// Replace the sample callback; any delegate is unbound.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: FnMut(&mut ChannelBuffers<'_>, f64) + Send + 'static,
    {
        self.controller
            .render_context()
            .with_registry(|r| r.set_function(callback));
    }

    /// Replace the delegate; any function callback is unbound.
    pub fn set_delegate(&self, delegate: Arc<dyn SampleDelegate>) {
        self.controller
            .render_context()
            .with_registry(|r| r.set_delegate(delegate));
    }

    pub fn set_volume_changed_callback<F>(&self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.controller
            .render_context()
            .with_registry(|r| r.set_volume_changed(Some(Arc::new(callback))));
    }

    pub fn clear_volume_changed_callback(&self) {
        self.controller
            .render_context()
            .with_registry(|r| r.set_volume_changed(None));
    }

    // --- Lifecycle ---

    pub fn setup(&mut self) -> Result<(), AudioIoError> {
        self.controller.setup()
    }

    pub fn teardown(&mut self) -> Result<(), AudioIoError> {
        self.controller.teardown()
    }

    /// Start audio, running setup first if the session is not initialised.
    pub fn start(&mut self) -> Result<(), AudioIoError> {
        self.controller.start()
    }

    pub fn stop(&mut self) -> Result<(), AudioIoError> {
        self.controller.stop()
    }

    /// Tear everything down for good. Also runs on drop.
    pub fn shutdown(&mut self) -> Result<(), AudioIoError> {
        self.controller.shutdown()
    }

    // --- Queries ---

    pub fn is_initialised(&self) -> bool {
        self.controller.is_initialised()
    }

    pub fn is_started(&self) -> bool {
        self.controller.is_started()
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    /// The session's current sample rate (the preferred rate before setup).
    pub fn sample_rate(&self) -> f64 {
        self.controller.render_context().sample_rate()
    }

    pub fn volume(&self) -> f64 {
        self.controller.output_volume()
    }

    pub fn render_diagnostics(&self) -> RenderDiagnostics {
        self.controller.render_diagnostics()
    }

    /// Transport failures never cross the real-time boundary; read the
    /// latest one here.
    pub fn last_transport_error(&self) -> Option<AudioIoError> {
        self.controller.transport_error()
    }

    pub fn select_input_orientation(
        &mut self,
        orientation: InputOrientation,
        pattern: PolarPattern,
    ) -> Result<(), AudioIoError> {
        self.controller.select_input_orientation(orientation, pattern)
    }

    // --- Configuration ---

    pub fn configuration(&self) -> &AudioIoConfiguration {
        self.controller.config()
    }

    /// Replace the configuration; applied at the next setup or rebuild.
    pub fn set_configuration(&mut self, config: AudioIoConfiguration) {
        *self.controller.config_mut() = config;
    }

    pub fn set_route_to_speaker(&mut self, enabled: bool) {
        self.controller.config_mut().route_to_speaker = enabled;
    }

    pub fn set_mix_with_other_audio(&mut self, enabled: bool) {
        self.controller.config_mut().mix_with_others = enabled;
    }

    // --- Events ---

    /// Dispatch queued platform notifications on the calling (control) thread.
    pub fn pump_events(&mut self) -> usize {
        self.controller.pump_events()
    }

    pub fn handle_event(&mut self, event: HardwareEvent) -> Result<(), AudioIoError> {
        self.controller.handle_event(event)
    }

    pub fn hardware(&self) -> &H {
        self.controller.hardware()
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        self.controller.hardware_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use approx::assert_relative_eq;
    use parking_lot::Mutex;

    use super::*;
    use crate::hardware::loopback::{HardwareOp, LoopbackHandle, LoopbackHardware};
    use crate::render::bridge::RenderStatus;
    use crate::render::buffers::AudioBufferList;

    fn constant_driver(value: f32) -> (AudioIoDriver<LoopbackHardware>, LoopbackHandle) {
        let hardware = LoopbackHardware::stereo(48000.0);
        let handle = hardware.handle();
        let driver = AudioIoDriver::with_callback(
            hardware,
            AudioIoConfiguration::default(),
            move |channels, _| channels.for_each_channel(|_, samples| samples.fill(value)),
        );
        (driver, handle)
    }

    #[derive(Default)]
    struct Recorder {
        calls: AtomicUsize,
    }

    impl SampleDelegate for Recorder {
        fn render_buffers(&self, buffers: &mut AudioBufferList<'_, '_>, _frame_count: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for index in 0..buffers.channel_count() {
                if let Some(channel) = buffers.channel_mut(index) {
                    channel.fill(0.75);
                }
            }
        }
    }

    #[test]
    fn constant_callback_fills_every_output_sample() {
        let (mut driver, handle) = constant_driver(0.5);
        handle.set_input_level(-0.3);
        driver.start().unwrap();

        let output = handle.render_cycle(256).unwrap();

        assert_eq!(output.status, RenderStatus::Rendered);
        assert_eq!(output.channels.len(), 2);
        assert!(output.channels.iter().all(|c| c.len() == 256));
        assert!(output.channels.iter().flatten().all(|&s| s == 0.5));
    }

    #[test]
    fn configuration_failure_never_creates_stream() {
        let (mut driver, handle) = constant_driver(0.0);
        handle.fail_next(
            HardwareOp::ConfigureSession,
            AudioIoError::configuration("unsupported category"),
        );

        let err = driver.setup().unwrap_err();

        assert!(matches!(err, AudioIoError::ConfigurationFailure { .. }));
        assert!(!driver.is_initialised());
        assert_eq!(driver.state(), SessionState::Uninitialized);
        assert_eq!(handle.count(HardwareOp::CreateStream), 0);
        assert!(!handle.has_observer());

        // retry succeeds once the hardware cooperates
        driver.setup().unwrap();
        assert!(driver.is_initialised());
    }

    #[test]
    fn interruption_preserves_intent_and_restarts() {
        let (mut driver, handle) = constant_driver(0.5);
        driver.start().unwrap();
        assert!(driver.is_started());

        assert!(handle.emit(HardwareEvent::InterruptionBegan));
        driver.pump_events();

        assert!(!handle.has_stream());
        assert!(!handle.session_active());
        assert!(driver.is_started());
        assert!(!driver.is_initialised());
        assert_eq!(driver.state(), SessionState::Interrupted);

        assert!(handle.emit(HardwareEvent::InterruptionEnded {
            should_resume: true
        }));
        driver.pump_events();

        assert!(driver.is_initialised());
        assert!(handle.has_stream());
        assert!(handle.stream_running());
        assert_eq!(handle.count(HardwareOp::CreateStream), 2);
        assert_eq!(handle.count(HardwareOp::StartStream), 2);
        assert!(handle.render_cycle(256).is_some());
    }

    #[test]
    fn start_runs_setup_when_needed() {
        let (mut driver, handle) = constant_driver(0.0);
        assert!(!driver.is_initialised());

        driver.start().unwrap();

        assert!(driver.is_initialised());
        assert!(driver.is_started());
        assert_eq!(handle.count(HardwareOp::ConfigureSession), 1);
        assert!(handle.stream_running());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (mut driver, handle) = constant_driver(0.0);
        driver.start().unwrap();
        driver.start().unwrap();
        assert_eq!(handle.count(HardwareOp::StartStream), 1);

        driver.stop().unwrap();
        driver.stop().unwrap();
        assert!(!driver.is_started());
        assert_eq!(handle.count(HardwareOp::StopStream), 1);
        assert!(driver.is_initialised());
    }

    #[test]
    fn start_failure_propagates_status() {
        let (mut driver, handle) = constant_driver(0.0);
        driver.setup().unwrap();
        handle.fail_next(
            HardwareOp::StartStream,
            AudioIoError::Hardware {
                operation: "start_stream",
                status: -10851,
            },
        );

        let err = driver.start().unwrap_err();

        assert_eq!(err.status(), -10851);
        assert!(!driver.is_started());
        assert!(!handle.stream_running());
    }

    #[test]
    fn transport_failure_reported_without_touching_output() {
        let (mut driver, handle) = constant_driver(0.5);
        driver.start().unwrap();
        handle.fail_transport(Some(-10863));

        let output = handle.render_cycle(64).unwrap();

        assert_eq!(output.status, RenderStatus::TransportFailed(-10863));
        assert!(output.channels.iter().flatten().all(|&s| s == 0.0));
        assert_eq!(
            driver.last_transport_error(),
            Some(AudioIoError::TransportFailure(-10863))
        );
        assert_eq!(driver.last_transport_error().map(|e| e.status()), Some(-10863));
    }

    #[test]
    fn stop_failure_keeps_started() {
        let (mut driver, handle) = constant_driver(0.0);
        driver.start().unwrap();
        handle.fail_next(
            HardwareOp::StopStream,
            AudioIoError::Hardware {
                operation: "stop_stream",
                status: -1,
            },
        );

        assert!(driver.stop().is_err());
        assert!(driver.is_started());
        driver.stop().unwrap();
        assert!(!driver.is_started());
    }

    #[test]
    fn sample_rate_reports_preferred_then_actual() {
        let (mut driver, _handle) = constant_driver(0.0);
        assert_relative_eq!(driver.sample_rate(), 44100.0);

        driver.setup().unwrap();
        assert_relative_eq!(driver.sample_rate(), 48000.0);
    }

    #[test]
    fn volume_changes_reach_callback_clamped() {
        let (mut driver, handle) = constant_driver(0.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        driver.set_volume_changed_callback(move |level| seen_cb.lock().push(level));
        driver.setup().unwrap();

        assert!(handle.set_volume(0.3));
        assert!(handle.emit(HardwareEvent::OutputVolumeChanged(1.7)));
        driver.pump_events();

        assert_relative_eq!(driver.volume(), 0.3);
        assert_eq!(*seen.lock(), vec![0.3, 1.0]);

        driver.clear_volume_changed_callback();
        assert!(handle.set_volume(0.9));
        driver.pump_events();
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn delegate_binding_replaces_callback() {
        let (mut driver, handle) = constant_driver(0.5);
        let recorder = Arc::new(Recorder::default());
        driver.set_delegate(recorder.clone());
        driver.start().unwrap();

        let output = handle.render_cycle(64).unwrap();
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert!(output.channels.iter().flatten().all(|&s| s == 0.75));

        driver.set_callback(|channels, _| channels.for_each_channel(|_, s| s.fill(0.125)));
        let output = handle.render_cycle(64).unwrap();
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert!(output.channels.iter().flatten().all(|&s| s == 0.125));
    }

    #[test]
    fn delegate_constructor_dispatches_to_delegate() {
        let hardware = LoopbackHardware::stereo(44100.0);
        let handle = hardware.handle();
        let recorder = Arc::new(Recorder::default());
        let mut driver =
            AudioIoDriver::with_delegate(hardware, AudioIoConfiguration::default(), recorder.clone());
        driver.start().unwrap();

        handle.render_cycle(128).unwrap();
        handle.render_cycle(128).unwrap();

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(driver.render_diagnostics().rendered_cycles, 2);
    }

    #[test]
    fn configuration_flags_apply_at_next_setup() {
        let (mut driver, handle) = constant_driver(0.0);
        driver.set_route_to_speaker(true);
        driver.set_mix_with_other_audio(true);
        driver.setup().unwrap();

        let request = handle
            .calls()
            .into_iter()
            .find_map(|c| match c {
                crate::hardware::loopback::HardwareCall::ConfigureSession(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert!(request.options.default_to_speaker);
        assert!(request.options.mix_with_others);
        assert!(driver.configuration().route_to_speaker);
    }

    #[test]
    fn input_selection_requires_active_session() {
        let (mut driver, handle) = constant_driver(0.0);
        let err = driver
            .select_input_orientation(InputOrientation::Front, PolarPattern::Cardioid)
            .unwrap_err();
        assert!(matches!(err, AudioIoError::PreconditionViolation(_)));
        assert_eq!(handle.count(HardwareOp::SelectInput), 0);

        driver.setup().unwrap();
        driver
            .select_input_orientation(InputOrientation::Front, PolarPattern::Cardioid)
            .unwrap();
        assert_eq!(driver.configuration().input_orientation, Some(InputOrientation::Front));
    }

    #[test]
    fn drop_tears_down_hardware() {
        let (mut driver, handle) = constant_driver(0.0);
        driver.start().unwrap();

        drop(driver);

        assert!(!handle.has_stream());
        assert!(!handle.session_active());
        assert!(!handle.has_observer());
    }

    #[test]
    fn shutdown_is_terminal() {
        let (mut driver, _handle) = constant_driver(0.0);
        driver.start().unwrap();
        driver.shutdown().unwrap();

        assert_eq!(driver.state(), SessionState::Stopped);
        assert!(!driver.is_started());
        assert!(matches!(
            driver.setup(),
            Err(AudioIoError::PreconditionViolation(_))
        ));
        assert!(matches!(
            driver.start(),
            Err(AudioIoError::PreconditionViolation(_))
        ));
        assert!(driver.teardown().is_ok());
        assert!(driver.shutdown().is_ok());
    }
}
