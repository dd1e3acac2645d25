//! In-memory audio hardware.
//!
//! Behaves like a real collaborator from the controller's point of view
//! (sessions, streams, notifications) but moves samples between plain
//! vectors. Every call is recorded, and any operation can be made to fail
//! once, which makes it the backend used for headless hosts and tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{
    ActualFormat, InputOrientation, OsStatus, PolarPattern, RouteChangeReason, SessionRequest,
};
use crate::models::error::AudioIoError;
use crate::models::events::{EventSink, HardwareEvent};
use crate::render::bridge::{RenderBridge, RenderStatus};
use crate::render::buffers::AudioBufferList;
use crate::traits::audio_hardware::{AudioHardware, RenderTransport};

/// Collaborator operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareOp {
    ConfigureSession,
    ActivateSession,
    DeactivateSession,
    CreateStream,
    DestroyStream,
    StartStream,
    StopStream,
    SelectInput,
}

/// One recorded call into the loopback hardware.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCall {
    ConfigureSession(SessionRequest),
    ActivateSession,
    DeactivateSession,
    CreateStream { id: u64 },
    DestroyStream { id: u64 },
    StartStream { id: u64 },
    StopStream { id: u64 },
    SelectInput(InputOrientation, PolarPattern),
    SetEventSink { registered: bool },
    RouteDidChange(RouteChangeReason),
    /// A render attempted while the stream was being created or destroyed.
    ProbeRender(RenderStatus),
}

impl HardwareCall {
    pub fn op(&self) -> Option<HardwareOp> {
        match self {
            Self::ConfigureSession(_) => Some(HardwareOp::ConfigureSession),
            Self::ActivateSession => Some(HardwareOp::ActivateSession),
            Self::DeactivateSession => Some(HardwareOp::DeactivateSession),
            Self::CreateStream { .. } => Some(HardwareOp::CreateStream),
            Self::DestroyStream { .. } => Some(HardwareOp::DestroyStream),
            Self::StartStream { .. } => Some(HardwareOp::StartStream),
            Self::StopStream { .. } => Some(HardwareOp::StopStream),
            Self::SelectInput(..) => Some(HardwareOp::SelectInput),
            _ => None,
        }
    }
}

/// Samples produced by one render cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub status: RenderStatus,
    pub channels: Vec<Vec<f32>>,
}

/// Handle to a loopback stream.
#[derive(Debug)]
pub struct LoopbackStream {
    id: u64,
}

impl LoopbackStream {
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct ActiveStream {
    id: u64,
    bridge: RenderBridge,
    running: bool,
}

struct LoopbackState {
    native: ActualFormat,
    volume: f64,
    input_level: f32,
    transport_fault: Option<OsStatus>,
    session_active: bool,
    stream: Option<ActiveStream>,
    next_stream_id: u64,
    faults: HashMap<HardwareOp, AudioIoError>,
    probe_renders: bool,
    emit_on_create: Option<HardwareEvent>,
    sink: Option<EventSink>,
    calls: Vec<HardwareCall>,
}

impl LoopbackState {
    fn take_fault(&mut self, op: HardwareOp) -> Result<(), AudioIoError> {
        match self.faults.remove(&op) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn probe(&mut self, bridge: &RenderBridge) {
        if !self.probe_renders {
            return;
        }
        let frames = self.native.buffer_frames as usize;
        let channels = self.native.render_channels();
        let mut transport = LoopbackTransport {
            level: self.input_level,
            fault: self.transport_fault,
        };
        let output = run_render(bridge, &mut transport, channels, frames);
        self.calls.push(HardwareCall::ProbeRender(output.status));
    }
}

/// Fills every input channel with a constant level.
struct LoopbackTransport {
    level: f32,
    fault: Option<OsStatus>,
}

impl RenderTransport for LoopbackTransport {
    fn pull_input(
        &mut self,
        buffers: &mut AudioBufferList<'_, '_>,
        frame_count: usize,
    ) -> Result<(), OsStatus> {
        if let Some(status) = self.fault {
            return Err(status);
        }
        for index in 0..buffers.channel_count() {
            if let Some(channel) = buffers.channel_mut(index) {
                let frames = frame_count.min(channel.len());
                channel[..frames].fill(self.level);
            }
        }
        Ok(())
    }
}

fn run_render(
    bridge: &RenderBridge,
    transport: &mut LoopbackTransport,
    channels: usize,
    frames: usize,
) -> RenderOutput {
    let mut storage = vec![vec![0.0f32; frames]; channels];
    let status = {
        let mut slices: Vec<&mut [f32]> = storage.iter_mut().map(|c| c.as_mut_slice()).collect();
        let mut list = AudioBufferList::new(&mut slices);
        bridge.render(transport, &mut list, frames)
    };
    RenderOutput {
        status,
        channels: storage,
    }
}

/// Software audio hardware. Owned by the driver; observe and steer it
/// through a [`LoopbackHandle`].
pub struct LoopbackHardware {
    shared: Arc<Mutex<LoopbackState>>,
}

impl LoopbackHardware {
    pub fn new(native: ActualFormat) -> Self {
        Self {
            shared: Arc::new(Mutex::new(LoopbackState {
                native,
                volume: 1.0,
                input_level: 0.0,
                transport_fault: None,
                session_active: false,
                stream: None,
                next_stream_id: 1,
                faults: HashMap::new(),
                probe_renders: false,
                emit_on_create: None,
                sink: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Stereo in, stereo out at `sample_rate`.
    pub fn stereo(sample_rate: f64) -> Self {
        Self::new(ActualFormat {
            sample_rate,
            buffer_frames: 256,
            input_channels: 2,
            output_channels: 2,
        })
    }

    pub fn handle(&self) -> LoopbackHandle {
        LoopbackHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl AudioHardware for LoopbackHardware {
    type Stream = LoopbackStream;

    fn configure_session(&mut self, request: &SessionRequest) -> Result<ActualFormat, AudioIoError> {
        let mut state = self.shared.lock();
        state.calls.push(HardwareCall::ConfigureSession(*request));
        state.take_fault(HardwareOp::ConfigureSession)?;

        // The device keeps its native rate but honours the buffer request.
        Ok(ActualFormat {
            buffer_frames: request.buffer_frames_hint,
            ..state.native
        })
    }

    fn activate_session(&mut self) -> Result<(), AudioIoError> {
        let mut state = self.shared.lock();
        state.calls.push(HardwareCall::ActivateSession);
        state.take_fault(HardwareOp::ActivateSession)?;
        state.session_active = true;
        Ok(())
    }

    fn deactivate_session(&mut self) -> Result<(), AudioIoError> {
        let mut state = self.shared.lock();
        state.calls.push(HardwareCall::DeactivateSession);
        state.session_active = false;
        state.take_fault(HardwareOp::DeactivateSession)
    }

    fn create_stream(
        &mut self,
        _format: &ActualFormat,
        bridge: RenderBridge,
    ) -> Result<LoopbackStream, AudioIoError> {
        let mut state = self.shared.lock();
        let id = state.next_stream_id;
        state.next_stream_id += 1;
        state.calls.push(HardwareCall::CreateStream { id });
        state.take_fault(HardwareOp::CreateStream)?;

        if let Some(event) = state.emit_on_create.take() {
            if let Some(sink) = state.sink.as_ref() {
                sink.emit(event);
            }
        }
        state.probe(&bridge);
        state.stream = Some(ActiveStream {
            id,
            bridge,
            running: false,
        });
        Ok(LoopbackStream { id })
    }

    fn destroy_stream(&mut self, stream: LoopbackStream) -> Result<(), AudioIoError> {
        let mut state = self.shared.lock();
        state.calls.push(HardwareCall::DestroyStream { id: stream.id });
        if let Some(active) = state.stream.take() {
            state.probe(&active.bridge);
        }
        state.take_fault(HardwareOp::DestroyStream)
    }

    fn start_stream(&mut self, stream: &LoopbackStream) -> Result<(), AudioIoError> {
        let mut state = self.shared.lock();
        state.calls.push(HardwareCall::StartStream { id: stream.id });
        state.take_fault(HardwareOp::StartStream)?;
        match state.stream.as_mut() {
            Some(active) if active.id == stream.id => {
                active.running = true;
                Ok(())
            }
            _ => Err(AudioIoError::Hardware {
                operation: "start_stream",
                status: -50,
            }),
        }
    }

    fn stop_stream(&mut self, stream: &LoopbackStream) -> Result<(), AudioIoError> {
        let mut state = self.shared.lock();
        state.calls.push(HardwareCall::StopStream { id: stream.id });
        state.take_fault(HardwareOp::StopStream)?;
        if let Some(active) = state.stream.as_mut() {
            active.running = false;
        }
        Ok(())
    }

    fn output_volume(&self) -> f64 {
        self.shared.lock().volume
    }

    fn select_input_orientation(
        &mut self,
        orientation: InputOrientation,
        pattern: PolarPattern,
    ) -> Result<(), AudioIoError> {
        let mut state = self.shared.lock();
        state.calls.push(HardwareCall::SelectInput(orientation, pattern));
        state.take_fault(HardwareOp::SelectInput)?;
        if !state.session_active {
            return Err(AudioIoError::precondition("session is not active"));
        }
        Ok(())
    }

    fn set_event_sink(&mut self, sink: Option<EventSink>) {
        let mut state = self.shared.lock();
        state.calls.push(HardwareCall::SetEventSink {
            registered: sink.is_some(),
        });
        state.sink = sink;
    }

    fn route_did_change(&mut self, reason: RouteChangeReason) {
        self.shared
            .lock()
            .calls
            .push(HardwareCall::RouteDidChange(reason));
    }
}

/// Host-side view of a [`LoopbackHardware`]: inject faults and events,
/// drive render cycles, inspect recorded calls.
#[derive(Clone)]
pub struct LoopbackHandle {
    shared: Arc<Mutex<LoopbackState>>,
}

impl LoopbackHandle {
    pub fn calls(&self) -> Vec<HardwareCall> {
        self.shared.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    pub fn count(&self, op: HardwareOp) -> usize {
        self.shared
            .lock()
            .calls
            .iter()
            .filter(|c| c.op() == Some(op))
            .count()
    }

    /// Make the next call to `op` fail with `error`.
    pub fn fail_next(&self, op: HardwareOp, error: AudioIoError) {
        self.shared.lock().faults.insert(op, error);
    }

    /// Make every transport call fail with `status` (`None` to clear).
    pub fn fail_transport(&self, status: Option<OsStatus>) {
        self.shared.lock().transport_fault = status;
    }

    /// Attempt a render whenever a stream is created or destroyed.
    pub fn probe_renders(&self, enabled: bool) {
        self.shared.lock().probe_renders = enabled;
    }

    /// Emit `event` from inside the next `create_stream` call.
    pub fn emit_on_next_create(&self, event: HardwareEvent) {
        self.shared.lock().emit_on_create = Some(event);
    }

    pub fn set_input_level(&self, level: f32) {
        self.shared.lock().input_level = level;
    }

    /// Change the output volume and notify the observer, if any.
    pub fn set_volume(&self, volume: f64) -> bool {
        let sink = {
            let mut state = self.shared.lock();
            state.volume = volume;
            state.sink.clone()
        };
        sink.is_some_and(|s| s.emit(HardwareEvent::OutputVolumeChanged(volume)))
    }

    /// Deliver a platform notification. Returns `false` if nobody is observing.
    pub fn emit(&self, event: HardwareEvent) -> bool {
        let sink = self.shared.lock().sink.clone();
        sink.is_some_and(|s| s.emit(event))
    }

    pub fn has_observer(&self) -> bool {
        self.shared.lock().sink.is_some()
    }

    pub fn session_active(&self) -> bool {
        self.shared.lock().session_active
    }

    pub fn has_stream(&self) -> bool {
        self.shared.lock().stream.is_some()
    }

    pub fn stream_running(&self) -> bool {
        self.shared
            .lock()
            .stream
            .as_ref()
            .is_some_and(|s| s.running)
    }

    /// Drive one hardware buffer through the running stream.
    ///
    /// Returns `None` when no stream is running.
    pub fn render_cycle(&self, frames: usize) -> Option<RenderOutput> {
        let (bridge, mut transport, channels) = {
            let state = self.shared.lock();
            let active = state.stream.as_ref().filter(|s| s.running)?;
            (
                active.bridge.clone(),
                LoopbackTransport {
                    level: state.input_level,
                    fault: state.transport_fault,
                },
                state.native.render_channels(),
            )
        };
        Some(run_render(&bridge, &mut transport, channels, frames))
    }
}
