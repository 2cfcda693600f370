//! Error types for the Tangle engine
//!
//! This module contains all error types used throughout the engine,
//! grouped by concern (authentication, rooms, frames, transport) and
//! unified under the main [`TangleError`] type.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Authentication and user-store errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials for user {user}")]
    InvalidCredentials { user: String },
    #[error("Unknown user: {user}")]
    UnknownUser { user: String },
    #[error("No valid login for this token")]
    NotAuthenticated,
    #[error("A user with this identity already exists")]
    UserExists,
}

/// Chat room and message errors
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found: {room}")]
    NotFound { room: String },
    #[error("A room with this exact participant set already exists: {id}")]
    Duplicate { id: String },
    #[error("User {user} is not a participant of room {room}")]
    NotAParticipant { user: String, room: String },
    #[error("A room needs at least one remote participant")]
    NoParticipants,
    #[error("Message rejected: {reason}")]
    InvalidMessage { reason: String },
}

/// Frame codec and validation errors
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame too large: {size} bytes (max: {max_size})")]
    TooLarge { size: usize, max_size: usize },
    #[error("Empty frame")]
    Empty,
    #[error("Frame signature verification failed")]
    BadSignature,
    #[error("{message}")]
    Malformed { message: String },
}

/// Transport and frame-queue errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed to {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },
    #[error("Network I/O error: {0}")]
    NetworkIo(#[from] std::io::Error),
    #[error("Frame queue is closed")]
    QueueClosed,
    #[error("Frame queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },
    #[error("Unknown neighbour: {neighbour}")]
    UnknownNeighbour { neighbour: u16 },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for the Tangle engine
#[derive(Debug, thiserror::Error)]
pub enum TangleError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl From<std::io::Error> for TangleError {
    fn from(err: std::io::Error) -> Self {
        TangleError::Transport(TransportError::NetworkIo(err))
    }
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl TangleError {
    /// Create a malformed-frame error with a message
    pub fn invalid_frame<T: Into<String>>(message: T) -> Self {
        TangleError::Frame(FrameError::Malformed {
            message: message.into(),
        })
    }

    /// Create an invalid-credentials error for a user id
    pub fn invalid_credentials(user: impl ToString) -> Self {
        TangleError::Auth(AuthError::InvalidCredentials {
            user: user.to_string(),
        })
    }

    /// Create an unknown-user error
    pub fn unknown_user(user: impl ToString) -> Self {
        TangleError::Auth(AuthError::UnknownUser {
            user: user.to_string(),
        })
    }

    /// Create a room-not-found error
    pub fn room_not_found(room: impl ToString) -> Self {
        TangleError::Room(RoomError::NotFound {
            room: room.to_string(),
        })
    }

    /// Create a not-a-participant error
    pub fn not_a_participant(user: impl ToString, room: impl ToString) -> Self {
        TangleError::Room(RoomError::NotAParticipant {
            user: user.to_string(),
            room: room.to_string(),
        })
    }

    /// Create a connection-failed error
    pub fn connection_failed<A: Into<String>, R: Into<String>>(addr: A, reason: R) -> Self {
        TangleError::Transport(TransportError::ConnectionFailed {
            addr: addr.into(),
            reason: reason.into(),
        })
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        TangleError::Configuration {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, TangleError>;
