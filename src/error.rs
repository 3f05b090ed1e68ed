use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot contains no sessions")]
    NoSessions,

    #[error("session at position {position} has an empty {field}")]
    EmptyField { position: usize, field: &'static str },

    #[error("duplicate session id {0}")]
    DuplicateSession(String),

    #[error("session {session}: expected {expected} problems, found {found}")]
    ProblemCountMismatch {
        session: String,
        expected: usize,
        found: usize,
    },

    #[error("session {session}: problem {position} is {found}, header expects {expected}")]
    ProblemAliasMismatch {
        session: String,
        position: usize,
        expected: String,
        found: String,
    },

    #[error("session {session}, problem {alias}: accepted problem has no penalty")]
    MissingPenalty { session: String, alias: String },

    #[error("session {session}, problem {alias}: {message}")]
    InvalidValue {
        session: String,
        alias: String,
        message: String,
    },
}
