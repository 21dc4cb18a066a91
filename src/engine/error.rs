use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed or out-of-range input. Always recoverable; reported to the
    /// caller with the offending field.
    Validation {
        field: &'static str,
        message: String,
    },
    /// Room-number uniqueness violation. Carries the canonical number.
    Conflict(String),
    NotFound(Ulid),
    /// Operation disallowed given the room's current allocation state.
    InvalidState(&'static str),
    LimitExceeded(&'static str),
    /// Store durability failure. The only unexpected-fault variant: logged
    /// with detail, surfaced to callers as an opaque internal error.
    Wal(String),
}

impl EngineError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        EngineError::Validation { field, message: message.into() }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation { field, message } => write!(f, "{field}: {message}"),
            EngineError::Conflict(room_no) => {
                write!(f, "Room number {room_no} already exists")
            }
            EngineError::NotFound(id) => write!(f, "Room not found: {id}"),
            EngineError::InvalidState(msg) => write!(f, "{msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
