//! Errors reported back to the participant that made a request

use crate::util::ids::SessionId;

/// Duel negotiation and session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DuelError {
    #[error("No participant named {0} is online")]
    TargetNotFound(String),

    #[error("You cannot challenge yourself")]
    CannotChallengeSelf,

    #[error("A participant is already in a duel, a queue or a pending challenge")]
    AlreadyInSession,

    #[error("Already waiting for a quick match")]
    AlreadyQueued,

    #[error("The opponent disconnected, please try again")]
    OpponentDisconnected,

    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    #[error("No pending challenge addressed to you")]
    RequestNotFound,

    #[error("Not connected")]
    NotConnected,
}

impl DuelError {
    /// Stable machine-readable code for `sessionError`
    pub fn code(&self) -> &'static str {
        match self {
            Self::TargetNotFound(_) => "target_not_found",
            Self::CannotChallengeSelf => "cannot_challenge_self",
            Self::AlreadyInSession => "already_in_session",
            Self::AlreadyQueued => "already_queued",
            Self::OpponentDisconnected => "opponent_disconnected",
            Self::SessionNotFound(_) => "session_not_found",
            Self::RequestNotFound => "request_not_found",
            Self::NotConnected => "not_connected",
        }
    }
}
