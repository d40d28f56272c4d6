//! Multi-room TCP Chat Server Library
//!
//! A line-oriented chat server built on tokio using the Actor pattern for
//! state management. Clients connect with any raw TCP tool (`nc`, `telnet`).
//!
//! # Features
//! - Username selection with uniqueness checks
//! - Named rooms with an owner and admins
//! - Room listing, joining, leaving and member listing
//! - Private messages
//! - Kicking members and deleting rooms, privilege-checked
//! - Disconnection handling
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning every registry
//! - Each connection has a reader and a writer task talking to the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use roomchat::{bind, serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::load().unwrap();
//!     let listener = bind(config.get_addr().parse().unwrap()).unwrap();
//!     serve(listener, config).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use crate::config::ServerConfig;
pub use client::Client;
pub use dispatch::{CommandSpec, COMMANDS, COMMAND_PREFIX};
pub use error::{AppError, CommandError, KickError, ProtocolError, SendError, UsernameError};
pub use handler::{bind, handle_connection, serve};
pub use message::{LineBuffer, ServerMessage};
pub use room::{Owner, Role, Room};
pub use server::{ChatServer, ServerCommand};
pub use types::{ClientId, RoomName};
