//! Client struct definition
//!
//! Represents a connected client with their session state and
//! outbound communication channel.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::{LineBuffer, ServerMessage};
use crate::types::{ClientId, RoomName};

/// Connected client information
///
/// Holds all state related to a connected client. Dropping the client
/// drops `sender`, which ends the connection's writer and closes the socket.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Peer address captured at accept time
    pub address: String,
    /// Username (None until chosen)
    pub username: Option<String>,
    /// Handle of the room the client is in
    pub room: Option<RoomName>,
    /// Partial input awaiting a newline
    pub input: LineBuffer,
    /// Server → Client message channel
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Client {
    /// Create a new client with the given ID, address and sender channel
    pub fn new(
        id: ClientId,
        address: String,
        sender: mpsc::UnboundedSender<ServerMessage>,
        max_line_length: usize,
    ) -> Self {
        Self {
            id,
            address,
            username: None,
            room: None,
            input: LineBuffer::new(max_line_length),
            sender,
        }
    }

    /// Queue a message for this client
    ///
    /// Never blocks. Returns an error if the connection's writer is gone.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.send(msg).map_err(|_| SendError::ChannelClosed)
    }

    /// Get the display name for this client
    ///
    /// Returns the username if set, otherwise the peer address.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.address)
    }

    /// Check if this client has set their username
    pub fn has_username(&self) -> bool {
        self.username.is_some()
    }

    /// Set the client's username
    pub fn set_username(&mut self, username: String) {
        self.username = Some(username);
    }

    pub fn enter_room(&mut self, room: RoomName) {
        self.room = Some(room);
    }

    /// Forget the current room and any half-typed input
    pub fn leave_room(&mut self) -> Option<RoomName> {
        self.input.clear();
        self.room.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (Client, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client::new(ClientId::new(), "127.0.0.1:5000".to_string(), tx, 64);
        (client, rx)
    }

    #[test]
    fn test_client_creation() {
        let (client, _rx) = client();

        assert!(client.username.is_none());
        assert!(client.room.is_none());
        assert_eq!(client.display_name(), "127.0.0.1:5000");
    }

    #[test]
    fn test_client_username() {
        let (mut client, _rx) = client();

        assert!(!client.has_username());

        client.set_username("alice".to_string());

        assert!(client.has_username());
        assert_eq!(client.display_name(), "alice");
    }

    #[test]
    fn test_leave_room_clears_input() {
        let (mut client, _rx) = client();
        client.enter_room(RoomName::parse("lobby").unwrap());
        client.input.push(b"half typed");

        let left = client.leave_room();

        assert_eq!(left.map(|r| r.to_string()), Some("lobby".to_string()));
        assert!(client.room.is_none());
        assert!(client.input.is_empty());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (client, rx) = client();
        assert!(client.send(ServerMessage::Prompt).is_ok());

        drop(rx);
        assert!(client.send(ServerMessage::Prompt).is_err());
    }
}
