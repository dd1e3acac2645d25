use crate::models::audio_models::{
    ActualFormat, InputOrientation, OsStatus, PolarPattern, RouteChangeReason, SessionRequest,
};
use crate::models::error::AudioIoError;
use crate::models::events::EventSink;
use crate::render::bridge::RenderBridge;
use crate::render::buffers::AudioBufferList;

/// Moves one buffer of samples between the hardware and the render path.
///
/// Passed into [`RenderBridge::render`] by the collaborator on every cycle.
pub trait RenderTransport {
    /// Fill `buffers` with captured input for `frame_count` frames.
    fn pull_input(
        &mut self,
        buffers: &mut AudioBufferList<'_, '_>,
        frame_count: usize,
    ) -> Result<(), OsStatus>;
}

/// Interface to the native audio hardware abstraction.
///
/// Implemented by platform backends and by
/// [`LoopbackHardware`](crate::hardware::loopback::LoopbackHardware).
/// Every method is called from the control context only; the render path
/// reaches the hardware exclusively through [`RenderTransport`].
pub trait AudioHardware: Send {
    /// Opaque reference to an active input/output unit.
    type Stream: Send;

    /// Select category, mode, preferred rate and buffer duration.
    fn configure_session(&mut self, request: &SessionRequest) -> Result<ActualFormat, AudioIoError>;

    fn activate_session(&mut self) -> Result<(), AudioIoError>;

    fn deactivate_session(&mut self) -> Result<(), AudioIoError>;

    /// Create and initialize a stream whose buffers are delivered to `bridge`.
    fn create_stream(
        &mut self,
        format: &ActualFormat,
        bridge: RenderBridge,
    ) -> Result<Self::Stream, AudioIoError>;

    /// Uninitialize and dispose of a stream. The handle is consumed even on failure.
    fn destroy_stream(&mut self, stream: Self::Stream) -> Result<(), AudioIoError>;

    fn start_stream(&mut self, stream: &Self::Stream) -> Result<(), AudioIoError>;

    fn stop_stream(&mut self, stream: &Self::Stream) -> Result<(), AudioIoError>;

    /// Current hardware output volume in `[0, 1]`.
    fn output_volume(&self) -> f64;

    /// Choose the built-in input data source. Requires an active session.
    fn select_input_orientation(
        &mut self,
        orientation: InputOrientation,
        pattern: PolarPattern,
    ) -> Result<(), AudioIoError>;

    /// Register (`Some`) or remove (`None`) the observer for platform notifications.
    fn set_event_sink(&mut self, sink: Option<EventSink>);

    /// Told after a route change has been absorbed by a stream rebuild.
    fn route_did_change(&mut self, _reason: RouteChangeReason) {}
}
