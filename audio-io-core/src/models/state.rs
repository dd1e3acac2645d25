/// Audio session state machine.
///
/// State transitions:
/// ```text
/// uninitialized → configuring → active ⇄ interrupted
///                                 ↓ ↑
///                            reconfiguring
///
/// any → stopped (terminal, on shutdown)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Configuring,
    Active,
    Interrupted,
    Reconfiguring,
    Stopped,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// States in which a control operation is running to completion.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Configuring | Self::Reconfiguring)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configuring => "configuring",
            Self::Active => "active",
            Self::Interrupted => "interrupted",
            Self::Reconfiguring => "reconfiguring",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
