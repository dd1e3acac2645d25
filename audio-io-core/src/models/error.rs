use thiserror::Error;

use super::audio_models::OsStatus;

/// Errors raised by the audio I/O driver and its hardware collaborator.
///
/// Hardware failures are always reported through this type; the driver never
/// panics on a status code returned by the platform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioIoError {
    /// The hardware rejected a requested format, category or mode.
    #[error("configuration failed: {reason}")]
    ConfigurationFailure { reason: String, status: OsStatus },

    /// The session could not be activated (often transient, e.g. a call in progress).
    #[error("activation failed: {reason}")]
    ActivationFailure { reason: String, status: OsStatus },

    #[error("stream creation failed: {reason}")]
    StreamCreationFailure { reason: String, status: OsStatus },

    /// An operation was invoked in a state that does not allow it.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// Reported by the render path; surfaced on the control context only.
    #[error("transport failed with status {0}")]
    TransportFailure(OsStatus),

    /// A stream or session call returned a non-zero platform status.
    #[error("{operation} failed with status {status}")]
    Hardware {
        operation: &'static str,
        status: OsStatus,
    },
}

/// Status reported when a failure has no native code.
pub const NO_STATUS: OsStatus = -1;

/// Hardware step of a setup or rebuild, used to classify collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Configure,
    Activate,
    CreateStream,
}

impl AudioIoError {
    /// Numeric status code for callers that want the platform-style result.
    ///
    /// Variants without a native code map to [`NO_STATUS`].
    pub fn status(&self) -> OsStatus {
        match self {
            Self::ConfigurationFailure { status, .. }
            | Self::ActivationFailure { status, .. }
            | Self::StreamCreationFailure { status, .. }
            | Self::Hardware { status, .. }
            | Self::TransportFailure(status) => *status,
            Self::PreconditionViolation(_) => NO_STATUS,
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation(message.into())
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::ConfigurationFailure {
            reason: reason.into(),
            status: NO_STATUS,
        }
    }

    pub fn activation(reason: impl Into<String>) -> Self {
        Self::ActivationFailure {
            reason: reason.into(),
            status: NO_STATUS,
        }
    }

    pub fn stream_creation(reason: impl Into<String>) -> Self {
        Self::StreamCreationFailure {
            reason: reason.into(),
            status: NO_STATUS,
        }
    }

    /// The step this error already belongs to, if any.
    pub fn step(&self) -> Option<SetupStep> {
        match self {
            Self::ConfigurationFailure { .. } => Some(SetupStep::Configure),
            Self::ActivationFailure { .. } => Some(SetupStep::Activate),
            Self::StreamCreationFailure { .. } => Some(SetupStep::CreateStream),
            _ => None,
        }
    }

    /// Classify a collaborator failure as the kind of step it came from,
    /// keeping its status code. Precondition violations pass through.
    pub fn during(self, step: SetupStep) -> Self {
        if self.step() == Some(step) || matches!(self, Self::PreconditionViolation(_)) {
            return self;
        }
        let status = self.status();
        let reason = self.to_string();
        match step {
            SetupStep::Configure => Self::ConfigurationFailure { reason, status },
            SetupStep::Activate => Self::ActivationFailure { reason, status },
            SetupStep::CreateStream => Self::StreamCreationFailure { reason, status },
        }
    }
}
