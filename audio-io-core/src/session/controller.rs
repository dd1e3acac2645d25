use std::sync::Arc;

use crate::models::audio_models::{
    ActualFormat, InputOrientation, PolarPattern, RenderDiagnostics, RouteChangeReason,
};
use crate::models::config::AudioIoConfiguration;
use crate::models::error::{AudioIoError, SetupStep};
use crate::models::events::{EventQueue, HardwareEvent, SequencedEvent};
use crate::models::state::SessionState;
use crate::render::bridge::RenderBridge;
use crate::render::context::RenderContext;
use crate::render::registry::CallbackRegistry;
use crate::traits::audio_hardware::AudioHardware;

/// Owns the session lifecycle and every call into the hardware collaborator.
///
/// All methods run on the control context and complete synchronously.
/// The only state visible to the render context is the shared
/// [`RenderContext`], whose reconstruction flag is raised before the stream
/// is touched and lowered once a replacement is fully initialized:
///
/// ```text
/// setup:        configure → activate → [gate] create stream [ungate] → active
/// teardown:     [gate] stop → destroy → deactivate → remove observers
/// interruption: [gate] stop → destroy → deactivate          (observers kept)
/// rebuild:      teardown + setup, restart if the caller had started
/// ```
pub struct SessionController<H: AudioHardware> {
    hardware: H,
    config: AudioIoConfiguration,
    state: SessionState,
    render: Arc<RenderContext>,
    stream: Option<H::Stream>,
    format: Option<ActualFormat>,

    // Caller intent; survives interruptions and rebuilds.
    is_started: bool,
    stream_running: bool,
    session_active: bool,
    observing: bool,

    events: EventQueue,
    // Route changes at or below this sequence were absorbed by the last rebuild.
    route_watermark: u64,
}

impl<H: AudioHardware> SessionController<H> {
    pub fn new(hardware: H, config: AudioIoConfiguration, registry: CallbackRegistry) -> Self {
        let render = Arc::new(RenderContext::new(registry, config.preferred_sample_rate));
        Self {
            hardware,
            config,
            state: SessionState::Uninitialized,
            render,
            stream: None,
            format: None,
            is_started: false,
            stream_running: false,
            session_active: false,
            observing: false,
            events: EventQueue::new(),
            route_watermark: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_initialised(&self) -> bool {
        self.state.is_active() && self.stream.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    pub fn format(&self) -> Option<ActualFormat> {
        self.format
    }

    pub fn render_context(&self) -> &Arc<RenderContext> {
        &self.render
    }

    pub fn render_diagnostics(&self) -> RenderDiagnostics {
        self.render.diagnostics()
    }

    pub fn config(&self) -> &AudioIoConfiguration {
        &self.config
    }

    /// Takes effect at the next setup or rebuild.
    pub fn config_mut(&mut self) -> &mut AudioIoConfiguration {
        &mut self.config
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn output_volume(&self) -> f64 {
        self.hardware.output_volume()
    }

    /// Most recent render transport failure over the driver's lifetime.
    pub fn transport_error(&self) -> Option<AudioIoError> {
        self.render.transport_error()
    }

    // --- Lifecycle ---

    /// Configure and activate the session and create the stream.
    ///
    /// Fails fast when already active. On any hardware failure the session is
    /// rolled back to `Uninitialized` so the call can be retried.
    pub fn setup(&mut self) -> Result<(), AudioIoError> {
        match self.state {
            SessionState::Uninitialized => {}
            SessionState::Interrupted => return self.recover_from_interruption(true),
            SessionState::Active => {
                return Err(AudioIoError::precondition(
                    "setup called while active; call teardown first",
                ))
            }
            SessionState::Configuring | SessionState::Reconfiguring => {
                return Err(AudioIoError::precondition("setup is not reentrant"))
            }
            SessionState::Stopped => {
                return Err(AudioIoError::precondition("driver has been shut down"))
            }
        }

        self.config
            .validate()
            .map_err(AudioIoError::configuration)?;

        self.transition(SessionState::Configuring);
        self.register_observers();

        if let Err(e) = self.build_session() {
            log::error!("Audio session setup failed: {}", e);
            self.unregister_observers();
            self.transition(SessionState::Uninitialized);
            return Err(e);
        }

        self.transition(SessionState::Active);
        Ok(())
    }

    /// Stop and destroy the stream, deactivate the session and remove observers.
    ///
    /// Idempotent. Every step runs even if an earlier one fails; the first
    /// failure is returned after the session has reached `Uninitialized`.
    pub fn teardown(&mut self) -> Result<(), AudioIoError> {
        if self.state.is_transitional() {
            return Err(AudioIoError::precondition("teardown is not reentrant"));
        }
        if matches!(self.state, SessionState::Uninitialized | SessionState::Stopped) {
            return Ok(());
        }

        let result = self.release_session();
        self.unregister_observers();
        self.format = None;
        self.is_started = false;
        self.transition(SessionState::Uninitialized);
        result
    }

    /// Start the stream, setting the session up first if needed.
    ///
    /// While interrupted only the intent is recorded; the stream restarts
    /// when the interruption ends.
    pub fn start(&mut self) -> Result<(), AudioIoError> {
        match self.state {
            SessionState::Active => {}
            SessionState::Uninitialized => self.setup()?,
            SessionState::Interrupted => {
                log::info!("Start requested during interruption; deferring until it ends");
                self.is_started = true;
                return Ok(());
            }
            SessionState::Configuring | SessionState::Reconfiguring => {
                return Err(AudioIoError::precondition("start is not reentrant"))
            }
            SessionState::Stopped => {
                return Err(AudioIoError::precondition("driver has been shut down"))
            }
        }
        self.start_stream()
    }

    pub fn stop(&mut self) -> Result<(), AudioIoError> {
        if let Some(stream) = self.stream.as_ref() {
            if self.stream_running {
                self.hardware.stop_stream(stream).inspect_err(|e| {
                    log::error!("Failed to stop stream: {}", e);
                })?;
                self.stream_running = false;
            }
        }
        self.is_started = false;
        Ok(())
    }

    /// Forced teardown into the terminal `Stopped` state.
    pub fn shutdown(&mut self) -> Result<(), AudioIoError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        let result = self.teardown();
        self.transition(SessionState::Stopped);
        result
    }

    /// Choose the built-in input data source. Requires an active session.
    pub fn select_input_orientation(
        &mut self,
        orientation: InputOrientation,
        pattern: PolarPattern,
    ) -> Result<(), AudioIoError> {
        if !self.state.is_active() || !self.session_active {
            return Err(AudioIoError::precondition(
                "input selection requires an active session",
            ));
        }
        self.hardware.select_input_orientation(orientation, pattern)?;
        self.config.input_orientation = Some(orientation);
        self.config.polar_pattern = Some(pattern);
        Ok(())
    }

    // --- Events ---

    /// Handle every queued platform notification. Returns how many were dispatched.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(SequencedEvent { sequence, event }) = self.events.try_next() {
            if let HardwareEvent::RouteChanged(reason) = event {
                if sequence <= self.route_watermark {
                    log::debug!(
                        "Dropping route change ({:?}) already covered by a rebuild",
                        reason
                    );
                    continue;
                }
            }
            if let Err(e) = self.handle_event(event) {
                log::warn!("Handling {:?} failed: {}", event, e);
            }
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: HardwareEvent) -> Result<(), AudioIoError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        match event {
            HardwareEvent::InterruptionBegan => self.begin_interruption(),
            HardwareEvent::InterruptionEnded { should_resume } => {
                self.end_interruption(should_resume)
            }
            HardwareEvent::ApplicationBecameActive => self.end_interruption(true),
            HardwareEvent::RouteChanged(reason) => self.route_changed(reason),
            HardwareEvent::MediaServicesReset => self.media_services_reset(),
            HardwareEvent::OutputVolumeChanged(level) => {
                self.output_volume_changed(level);
                Ok(())
            }
        }
    }

    fn begin_interruption(&mut self) -> Result<(), AudioIoError> {
        if !self.state.is_active() {
            log::debug!("Ignoring interruption in state {}", self.state);
            return Ok(());
        }
        log::info!("Audio session interrupted");
        let result = self.release_session();
        self.transition(SessionState::Interrupted);
        result
    }

    fn end_interruption(&mut self, should_resume: bool) -> Result<(), AudioIoError> {
        if !self.state.is_interrupted() {
            return Ok(());
        }
        self.recover_from_interruption(should_resume)
    }

    fn recover_from_interruption(&mut self, resume: bool) -> Result<(), AudioIoError> {
        let format = match self.format {
            Some(format) => format,
            None => self.configure()?,
        };

        if let Err(e) = self.hardware.activate_session() {
            let e = e.during(SetupStep::Activate);
            log::warn!("Session reactivation failed, still interrupted: {}", e);
            return Err(e);
        }
        self.session_active = true;
        self.apply_input_preference();

        if let Err(e) = self.open_stream(&format) {
            log::error!("Stream recreation after interruption failed: {}", e);
            let _ = self.deactivate();
            self.unregister_observers();
            self.format = None;
            self.transition(SessionState::Uninitialized);
            return Err(e);
        }

        log::info!("Audio session resumed after interruption");
        self.transition(SessionState::Active);

        if !resume && self.is_started {
            log::info!("Platform declined resume; stream left stopped");
            self.is_started = false;
        }
        if self.is_started {
            self.start_stream()?;
        }
        Ok(())
    }

    fn route_changed(&mut self, reason: RouteChangeReason) -> Result<(), AudioIoError> {
        if !self.state.is_active() || !self.session_active {
            log::debug!("Ignoring route change ({:?}) while session inactive", reason);
            return Ok(());
        }
        if !reason.requires_rebuild() {
            log::debug!("Route change ({:?}) needs no rebuild", reason);
            return Ok(());
        }

        log::info!("Audio route changed ({:?}); rebuilding stream", reason);
        self.rebuild()?;
        self.hardware.route_did_change(reason);
        Ok(())
    }

    fn media_services_reset(&mut self) -> Result<(), AudioIoError> {
        if !matches!(self.state, SessionState::Active | SessionState::Interrupted) {
            log::debug!("Media services reset in state {}; nothing to rebuild", self.state);
            return Ok(());
        }
        log::warn!("Media services were reset; rebuilding audio session");
        self.rebuild()
    }

    fn output_volume_changed(&self, level: f64) {
        let level = level.clamp(0.0, 1.0);
        if let Some(callback) = self.render.with_registry(|r| r.volume_changed()) {
            callback(level);
        }
    }

    // --- Internal helpers ---

    /// Full teardown + setup cycle, keeping observers registered.
    fn rebuild(&mut self) -> Result<(), AudioIoError> {
        self.transition(SessionState::Reconfiguring);

        if let Err(e) = self.release_session() {
            log::warn!("Release during rebuild reported: {}", e);
        }
        self.format = None;

        let result = self.build_session();
        self.route_watermark = self.events.last_sequence();

        if let Err(e) = result {
            log::error!("Audio session rebuild failed: {}", e);
            self.unregister_observers();
            self.transition(SessionState::Uninitialized);
            return Err(e);
        }

        self.transition(SessionState::Active);
        if self.is_started {
            self.start_stream()?;
        }
        Ok(())
    }

    fn configure(&mut self) -> Result<ActualFormat, AudioIoError> {
        let request = self.config.to_session_request();
        let format = self
            .hardware
            .configure_session(&request)
            .map_err(|e| e.during(SetupStep::Configure))
            .inspect_err(|e| {
                log::error!("Session configuration failed: {}", e);
            })?;

        let channels = format.render_channels();
        if channels > self.render.channel_capacity() {
            return Err(AudioIoError::configuration(format!(
                "{} channels exceeds render capacity of {}",
                channels,
                self.render.channel_capacity()
            )));
        }
        Ok(format)
    }

    /// configure → activate → create stream. Deactivates again if the
    /// stream cannot be created.
    fn build_session(&mut self) -> Result<(), AudioIoError> {
        let format = self.configure()?;

        self.hardware
            .activate_session()
            .map_err(|e| e.during(SetupStep::Activate))
            .inspect_err(|e| {
                log::error!("Session activation failed: {}", e);
            })?;
        self.session_active = true;
        self.apply_input_preference();

        if let Err(e) = self.open_stream(&format) {
            let _ = self.deactivate();
            return Err(e);
        }

        log::info!(
            "Audio session ready: {} Hz, {} frames ({:.1} ms), {} in / {} out",
            format.sample_rate,
            format.buffer_frames,
            format.buffer_duration() * 1000.0,
            format.input_channels,
            format.output_channels
        );
        self.format = Some(format);
        Ok(())
    }

    fn open_stream(&mut self, format: &ActualFormat) -> Result<(), AudioIoError> {
        self.render.begin_reconstruction();
        self.render.set_sample_rate(format.sample_rate);

        let bridge = RenderBridge::new(Arc::clone(&self.render));
        let stream = self
            .hardware
            .create_stream(format, bridge)
            .map_err(|e| e.during(SetupStep::CreateStream))
            .inspect_err(|e| {
                log::error!("Stream creation failed: {}", e);
            })?;

        self.stream = Some(stream);
        self.render.end_reconstruction();
        Ok(())
    }

    /// Gate the render path, then stop and destroy the stream.
    fn close_stream(&mut self) -> Result<(), AudioIoError> {
        self.render.begin_reconstruction();

        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        let mut first_error = None;
        if self.stream_running {
            if let Err(e) = self.hardware.stop_stream(&stream) {
                log::warn!("Failed to stop stream before destroying it: {}", e);
                first_error = Some(e);
            }
            self.stream_running = false;
        }
        if let Err(e) = self.hardware.destroy_stream(stream) {
            log::error!("Failed to destroy stream: {}", e);
            first_error.get_or_insert(e);
        }

        first_error.map_or(Ok(()), Err)
    }

    fn deactivate(&mut self) -> Result<(), AudioIoError> {
        if !self.session_active {
            return Ok(());
        }
        self.session_active = false;
        self.hardware.deactivate_session().inspect_err(|e| {
            log::warn!("Session deactivation failed: {}", e);
        })
    }

    /// Stream then session. A failed stream release never blocks deactivation.
    fn release_session(&mut self) -> Result<(), AudioIoError> {
        let stream_result = self.close_stream();
        let session_result = self.deactivate();

        let diagnostics = self.render.diagnostics();
        if let Some(e) = self.render.transport_error() {
            log::warn!(
                "Render transport failed {} times, last: {} ({} cycles rendered)",
                diagnostics.transport_failures,
                e,
                diagnostics.rendered_cycles
            );
        }
        log::debug!("Render diagnostics: {:?}", diagnostics);

        stream_result.and(session_result)
    }

    fn start_stream(&mut self) -> Result<(), AudioIoError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| AudioIoError::precondition("no stream to start"))?;

        if !self.stream_running {
            self.hardware.start_stream(stream).inspect_err(|e| {
                log::error!("Failed to start stream: {}", e);
            })?;
            self.stream_running = true;
        }
        self.is_started = true;
        Ok(())
    }

    fn apply_input_preference(&mut self) {
        let Some(orientation) = self.config.input_orientation else {
            return;
        };
        let pattern = self
            .config
            .polar_pattern
            .unwrap_or(PolarPattern::Omnidirectional);
        if let Err(e) = self.hardware.select_input_orientation(orientation, pattern) {
            log::warn!("Preferred input {:?}/{:?} unavailable: {}", orientation, pattern, e);
        }
    }

    fn register_observers(&mut self) {
        if !self.observing {
            self.hardware.set_event_sink(Some(self.events.sink()));
            self.observing = true;
        }
    }

    /// Withdraw the sink and start a fresh queue: anything the old session
    /// queued, or that a stale sink emits later, never reaches the next one.
    fn unregister_observers(&mut self) {
        if !self.observing {
            return;
        }
        self.hardware.set_event_sink(None);
        self.observing = false;

        let stale = self.events.discard_pending();
        if stale > 0 {
            log::debug!("Discarding {} notifications from the released session", stale);
        }
        self.events = EventQueue::new();
        self.route_watermark = 0;
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            log::debug!("Audio session {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

impl<H: AudioHardware> Drop for SessionController<H> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Audio session shutdown reported: {}", e);
        }
    }
}
