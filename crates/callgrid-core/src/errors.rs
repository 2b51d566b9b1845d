use thiserror::Error;

use crate::events::SessionState;

/// Errors returned by call-control operations.
///
/// Every variant is scoped to one session; a failure never affects
/// sibling sessions.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("session '{0}' is already registered")]
    DuplicateSession(String),
    #[error("session '{id}': '{command}' not allowed in state {state:?}")]
    InvalidState {
        id: String,
        state: SessionState,
        command: &'static str,
    },
    #[error("session '{id}': engine init failed: {reason}")]
    EngineInit { id: String, reason: String },
    #[error("unknown session '{0}'")]
    UnknownSession(String),
    #[error("session manager stopped")]
    Terminated,
}

/// Why a session entered [`SessionState::Failed`].
///
/// Carried in the state-changed notification so the UI layer can show
/// the cause; cleared when the session is reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("engine init failed: {0}")]
    Init(String),
    #[error("join rejected by engine (code {0})")]
    JoinFailed(i32),
    #[error("engine error (code {0})")]
    Engine(i32),
    #[error("no join confirmation before the deadline")]
    Timeout,
}
