use serde::{Deserialize, Serialize};

/// Platform status code. Zero means success.
pub type OsStatus = i32;

/// Maximum number of channels the render path can translate per buffer.
pub const MAX_CHANNELS: usize = 32;

/// Category options requested when configuring the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryOptions {
    /// Mix with audio from other applications instead of silencing them.
    pub mix_with_others: bool,
    /// Route output to the built-in speaker rather than the receiver.
    pub default_to_speaker: bool,
    pub allow_bluetooth: bool,
}

/// Parameters passed to the collaborator's `configure_session`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionRequest {
    pub sample_rate_hint: f64,
    pub buffer_frames_hint: u32,
    pub options: CategoryOptions,
}

/// The stream format the hardware actually granted.
///
/// Samples are always 32-bit float, one buffer per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActualFormat {
    pub sample_rate: f64,
    pub buffer_frames: u32,
    pub input_channels: u16,
    pub output_channels: u16,
}

impl ActualFormat {
    /// Channels delivered to the render callback per buffer.
    pub fn render_channels(&self) -> usize {
        self.input_channels.max(self.output_channels) as usize
    }

    /// Hardware buffer duration in seconds.
    pub fn buffer_duration(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.buffer_frames as f64 / self.sample_rate
    }
}

/// Physical orientation of the preferred built-in input data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputOrientation {
    Top,
    Bottom,
    Front,
    Back,
}

/// Directional pickup pattern of an input data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolarPattern {
    Omnidirectional,
    Cardioid,
    Subcardioid,
    Stereo,
}

/// Why the platform reported a route change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteChangeReason {
    Unknown,
    NewDeviceAvailable,
    OldDeviceUnavailable,
    CategoryChange,
    Override,
    WakeFromSleep,
    NoSuitableRouteForCategory,
    RouteConfigurationChange,
}

impl RouteChangeReason {
    /// Whether the physical device set changed, which invalidates the stream.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            Self::NewDeviceAvailable | Self::OldDeviceUnavailable | Self::Override
        )
    }
}

/// Counters maintained by the render path, read from the control context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderDiagnostics {
    pub rendered_cycles: u64,
    pub skipped_cycles: u64,
    pub transport_failures: u64,
}
