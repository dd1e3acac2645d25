//! # audio-io-core
//!
//! Low-latency bidirectional audio I/O driver core.
//!
//! Owns the audio session lifecycle (configure, activate, stream
//! creation, interruption and route-change recovery) and bridges the
//! real-time render callback to a user-supplied sample processor.
//! Platform backends implement the `AudioHardware` trait; the in-memory
//! `LoopbackHardware` drives the whole stack without a device.
//!
//! ## Architecture
//!
//! ```text
//! audio-io-core (this crate)
//! ├── traits/    ← AudioHardware, RenderTransport, SampleDelegate
//! ├── models/    ← AudioIoError, SessionState, AudioIoConfiguration, HardwareEvent, formats
//! ├── render/    ← RenderBridge, RenderContext, CallbackRegistry, channel buffers
//! ├── session/   ← SessionController (state machine), AudioIoDriver (control surface)
//! └── hardware/  ← LoopbackHardware
//! ```
//!
//! Only [`RenderBridge::render`] runs on the real-time thread. It never
//! blocks and never allocates; everything else runs on the control context.

pub mod hardware;
pub mod models;
pub mod render;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use hardware::loopback::{HardwareCall, HardwareOp, LoopbackHandle, LoopbackHardware, LoopbackStream};
pub use models::audio_models::{
    ActualFormat, CategoryOptions, InputOrientation, OsStatus, PolarPattern, RenderDiagnostics,
    RouteChangeReason, SessionRequest, MAX_CHANNELS,
};
pub use models::config::AudioIoConfiguration;
pub use models::error::{AudioIoError, SetupStep, NO_STATUS};
pub use models::events::{EventQueue, EventSink, HardwareEvent};
pub use models::state::SessionState;
pub use render::bridge::{RenderBridge, RenderStatus};
pub use render::buffers::{AudioBufferList, ChannelBuffers};
pub use render::context::RenderContext;
pub use render::registry::{CallbackBinding, CallbackRegistry};
pub use session::controller::SessionController;
pub use session::driver::AudioIoDriver;
pub use traits::audio_hardware::{AudioHardware, RenderTransport};
pub use traits::sample_delegate::{SampleCallback, SampleDelegate, VolumeChangedCallback};
