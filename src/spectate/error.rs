/// Reasons a spectator join is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpectateError {
    #[error("Spectating not allowed")]
    SpectatingDisabled,
    #[error("Room is full ({max} spectators)")]
    RoomFull { max: i64 },
}

impl SpectateError {
    /// Short label used in logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            SpectateError::SpectatingDisabled => "disabled",
            SpectateError::RoomFull { .. } => "room_full",
        }
    }
}
