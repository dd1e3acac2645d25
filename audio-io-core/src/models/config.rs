use serde::{Deserialize, Serialize};

use super::audio_models::{CategoryOptions, InputOrientation, PolarPattern, SessionRequest};
use super::error::AudioIoError;

/// Largest hardware buffer the driver will ask for.
pub const MAX_BUFFER_FRAMES: u32 = 4096;

/// Preferences for an audio I/O session.
///
/// Read at setup and at every reconfiguration; changing a field while the
/// session is active has no effect until the next rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioIoConfiguration {
    /// Preferred hardware sample rate in Hz (default: 44100).
    pub preferred_sample_rate: f64,

    /// Preferred hardware buffer size in frames (default: 256).
    pub preferred_buffer_frames: u32,

    /// Mix with other applications' audio (default: false).
    pub mix_with_others: bool,

    /// Send output to the built-in speaker (default: false).
    pub route_to_speaker: bool,

    /// Preferred built-in input data source, applied after activation.
    pub input_orientation: Option<InputOrientation>,

    pub polar_pattern: Option<PolarPattern>,
}

impl AudioIoConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.preferred_sample_rate.is_finite() || self.preferred_sample_rate <= 0.0 {
            return Err("sample rate must be positive".into());
        }
        if self.preferred_buffer_frames == 0 || self.preferred_buffer_frames > MAX_BUFFER_FRAMES {
            return Err(format!(
                "unsupported buffer size: {} frames",
                self.preferred_buffer_frames
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, AudioIoError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AudioIoError::configuration(format!("invalid configuration: {}", e)))?;
        config.validate().map_err(AudioIoError::configuration)?;
        Ok(config)
    }

    pub fn to_session_request(&self) -> SessionRequest {
        SessionRequest {
            sample_rate_hint: self.preferred_sample_rate,
            buffer_frames_hint: self.preferred_buffer_frames,
            options: CategoryOptions {
                mix_with_others: self.mix_with_others,
                default_to_speaker: self.route_to_speaker,
                allow_bluetooth: true,
            },
        }
    }
}

impl Default for AudioIoConfiguration {
    fn default() -> Self {
        Self {
            preferred_sample_rate: 44100.0,
            preferred_buffer_frames: 256,
            mix_with_others: false,
            route_to_speaker: false,
            input_orientation: None,
            polar_pattern: None,
        }
    }
}
