//! Error types for the chat server
//!
//! Defines fatal application errors, transport errors, and the
//! user-facing errors produced by username assignment and commands.
//! Uses thiserror for ergonomic error definitions; the `Display` text of
//! the user-facing errors is exactly what the client is shown.

use thiserror::Error;

/// Application-level errors
///
/// Only ever fatal to a single connection task or to the binary itself.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - server actor is gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Message send errors
///
/// Occurs when a client's outbound channel has been closed.
#[derive(Debug, Error)]
pub enum SendError {
    /// The writing half of the connection has gone away
    #[error("Channel closed")]
    ChannelClosed,
}

/// Line protocol errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffered input grew past the configured limit without a newline
    #[error("Line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Reasons a username candidate is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username cannot be empty")]
    Empty,

    #[error("Username cannot contain spaces")]
    Whitespace,

    #[error("Sorry, {0} is taken")]
    Taken(String),
}

/// Command failures
///
/// Every variant is recoverable: the dispatcher reports it to the caller
/// and no state has been mutated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Too few arguments
    #[error("Usage: {0}")]
    Usage(&'static str),

    /// More than one argument where a room name was expected
    #[error("Room name cannot contain spaces")]
    RoomNameHasSpaces,

    #[error("Not in a room")]
    NotInRoom,

    #[error("You are already in a room: {0}")]
    AlreadyInRoom(String),

    #[error("Room does not exist: {0}")]
    RoomNotFound(String),

    #[error("Room already exists: {0}")]
    RoomExists(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User not in room: {0}")]
    UserNotInRoom(String),

    #[error("Cannot send private message to yourself")]
    PrivateToSelf,

    #[error("Insufficient privileges to kick from: {0}")]
    CannotKickFrom(String),

    /// Some targets of a batch kick were rejected
    #[error("Failed to kick {failed} of {requested} user(s)")]
    KickIncomplete { failed: usize, requested: usize },

    #[error("Insufficient privileges to delete: {0}")]
    CannotDelete(String),

    #[error("Failed to kick all users from: {0}")]
    DeleteAborted(String),

    #[error("Only the owner can grant admin in: {0}")]
    CannotGrantAdmin(String),

    #[error("Already privileged in this room: {0}")]
    AlreadyPrivileged(String),

    /// The caller's session no longer exists
    #[error("Not connected")]
    NotConnected,
}

/// Per-target failures inside a kick batch
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KickError {
    #[error("User does not exist: {0}")]
    NoSuchUser(String),

    #[error("User not in room: {0}")]
    NotInRoom(String),

    #[error("Cannot kick self from room")]
    SelfKick,

    #[error("Cannot kick owner from room: {0}")]
    Owner(String),

    #[error("Insufficient privileges to kick admin: {0}")]
    Admin(String),
}
