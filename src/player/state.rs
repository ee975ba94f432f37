//! Player lifecycle state machine.

/// Lifecycle of a player context. `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Constructed, or a `prepare` attempt failed
    Created,
    /// A media file is open; decode and seek are valid
    Prepared,
    Released,
}

impl PlayerState {
    pub fn is_prepared(&self) -> bool {
        matches!(self, PlayerState::Prepared)
    }

    pub fn is_released(&self) -> bool {
        matches!(self, PlayerState::Released)
    }

    /// Whether `prepare` may be attempted
    pub fn can_prepare(&self) -> bool {
        matches!(self, PlayerState::Created)
    }
}
