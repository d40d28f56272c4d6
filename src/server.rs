//! ChatServer Actor implementation
//!
//! The central actor that owns all state: clients, usernames and rooms.
//! Connection tasks forward raw bytes and lifecycle events over an mpsc
//! channel; the actor buffers lines, runs commands and fans messages out,
//! one event at a time. No locks are needed.

mod commands;
mod distribution;

use std::collections::{BTreeMap, HashMap};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::ServerConfig;
use crate::dispatch::{self, Input};
use crate::error::{CommandError, UsernameError};
use crate::message::ServerMessage;
use crate::room::{Owner, Room};
use crate::types::{ClientId, RoomName};

/// First line every new connection receives
pub const WELCOME: &str = "Welcome to the chat server";

/// Asked until the client picks a valid username
pub const USERNAME_PROMPT: &str = "Username?";

/// Last line an exiting client receives
pub const FAREWELL: &str = "Come again soon!";

/// Commands sent from connection handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New client connected
    Connect {
        client_id: ClientId,
        address: String,
        sender: mpsc::UnboundedSender<ServerMessage>,
    },
    /// Bytes read from a client's socket
    Data { client_id: ClientId, bytes: Vec<u8> },
    /// Client's connection ended (EOF, read error or write error)
    Disconnect { client_id: ClientId },
}

/// The main ChatServer actor
///
/// Every registry lives here and is only mutated from `handle_command`.
pub struct ChatServer {
    /// All connected clients: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// Named clients: username -> ClientId
    usernames: HashMap<String, ClientId>,
    /// All rooms, ordered by name for listing
    rooms: BTreeMap<RoomName, Room>,
    /// Clients whose outbound channel failed during the current event
    doomed: Vec<ClientId>,
    /// Input line cap handed to every new client
    max_line_length: usize,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    ///
    /// The configured default rooms are created up front, owned by the server.
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, config: &ServerConfig) -> Self {
        let mut rooms = BTreeMap::new();
        for name in &config.default_rooms {
            match RoomName::parse(name) {
                Some(room_name) => {
                    let room = Room::new(room_name.clone(), Owner::Server);
                    debug!("Created room {} owned by {}", room.name, room.owner);
                    rooms.insert(room_name, room);
                }
                None => warn!("Ignoring invalid default room name '{}'", name),
            }
        }

        Self {
            clients: HashMap::new(),
            usernames: HashMap::new(),
            rooms,
            doomed: Vec::new(),
            max_line_length: config.max_line_length,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started with {} rooms", self.rooms.len());

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command, then terminate clients whose delivery failed
    pub fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                client_id,
                address,
                sender,
            } => self.handle_connect(client_id, address, sender),
            ServerCommand::Data { client_id, bytes } => self.handle_data(client_id, &bytes),
            ServerCommand::Disconnect { client_id } => self.terminate(client_id),
        }

        self.reap();
    }

    /// Number of live connections
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of clients that have chosen a username
    pub fn named_count(&self) -> usize {
        self.usernames.len()
    }

    pub fn client(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Look up a named client
    pub fn client_by_name(&self, username: &str) -> Option<&Client> {
        self.usernames
            .get(username)
            .and_then(|id| self.clients.get(id))
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// All rooms in name order
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Handle new client connection
    fn handle_connect(
        &mut self,
        client_id: ClientId,
        address: String,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        info!("Client {} connected from {}", client_id, address);
        let client = Client::new(client_id, address, sender, self.max_line_length);
        self.clients.insert(client_id, client);

        self.notify(client_id, WELCOME);
        self.notify(client_id, USERNAME_PROMPT);

        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    /// Feed bytes to the client's line buffer and process every completed line
    fn handle_data(&mut self, client_id: ClientId, bytes: &[u8]) {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };

        debug!("{} bytes from {}", bytes.len(), client.display_name());

        let (lines, overflow) = client.input.push(bytes);

        for line in lines {
            // An earlier line may have ended the session
            if !self.clients.contains_key(&client_id) {
                return;
            }
            self.process_line(client_id, &line);
        }

        if let Some(e) = overflow {
            let Some(client) = self.clients.get(&client_id) else {
                return;
            };
            warn!("Disconnecting {}: {}", client.address, e);
            self.send(client_id, ServerMessage::Farewell(e.to_string()));
            self.terminate(client_id);
        }
    }

    /// Route one completed line by session state
    fn process_line(&mut self, client_id: ClientId, line: &str) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };

        if !client.has_username() {
            self.assign_username(client_id, line);
            return;
        }

        match dispatch::classify(line) {
            Input::Command(command) => {
                self.dispatch(client_id, command);
            }
            Input::Chat(text) => self.chat(client_id, text),
        }
    }

    /// Username path for unnamed clients
    fn assign_username(&mut self, client_id: ClientId, line: &str) {
        match self.validate_username(line.trim()) {
            Ok(username) => {
                self.usernames.insert(username.clone(), client_id);
                if let Some(client) = self.clients.get_mut(&client_id) {
                    info!("Connection {} is now '{}'", client.address, username);
                    client.set_username(username.clone());
                }

                self.notify(client_id, format!("Welcome, {}!", username));
                self.notify(
                    client_id,
                    "Type /rooms to see rooms, /join <room> to enter one",
                );
            }
            Err(e) => {
                debug!("Rejected username from {}: {}", client_id, e);
                self.notify(client_id, e.to_string());
                self.notify(client_id, USERNAME_PROMPT);
            }
        }
    }

    fn validate_username(&self, candidate: &str) -> Result<String, UsernameError> {
        if candidate.is_empty() {
            return Err(UsernameError::Empty);
        }
        if candidate.chars().any(char::is_whitespace) {
            return Err(UsernameError::Whitespace);
        }
        if self.usernames.contains_key(candidate) {
            return Err(UsernameError::Taken(candidate.to_string()));
        }
        Ok(candidate.to_string())
    }

    /// Plain text from a named client
    fn chat(&mut self, client_id: ClientId, text: &str) {
        if text.trim().is_empty() {
            self.send(client_id, ServerMessage::Prompt);
            return;
        }

        let Some(room) = self.clients.get(&client_id).and_then(|c| c.room.clone()) else {
            self.notify(
                client_id,
                format!("{}\n{}", CommandError::NotInRoom, dispatch::help_text()),
            );
            return;
        };

        self.distribute(text, &[room], Some(client_id), &[client_id]);
        self.send(client_id, ServerMessage::Prompt);
    }

    /// Remove a client from every registry and close its connection
    ///
    /// Idempotent. Remaining room members are told the client disconnected.
    pub(crate) fn terminate(&mut self, client_id: ClientId) {
        let Some(mut client) = self.clients.remove(&client_id) else {
            return;
        };

        if let Some(room_name) = client.leave_room() {
            let room = self.room_mut(&room_name);
            room.remove_user(client_id);
            let departed = room.tagged(client.display_name());
            self.distribute(
                &format!("{} disconnected", departed),
                &[room_name],
                None,
                &[],
            );
        }

        if let Some(username) = &client.username {
            self.usernames.remove(username);
        }

        info!(
            "Connection {} closed by {}",
            client.address,
            client.username.as_deref().unwrap_or("unnamed client")
        );
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    /// Terminate every client whose delivery failed
    fn reap(&mut self) {
        while let Some(client_id) = self.doomed.pop() {
            self.terminate(client_id);
        }
    }

    /// Queue a message for a client
    ///
    /// A closed channel marks the client for termination once the current
    /// event has been handled.
    pub(crate) fn send(&mut self, client_id: ClientId, msg: ServerMessage) -> bool {
        let Some(client) = self.clients.get(&client_id) else {
            return false;
        };

        match client.send(msg) {
            Ok(()) => true,
            Err(e) => {
                debug!("Send to {} failed: {}", client.display_name(), e);
                if !self.doomed.contains(&client_id) {
                    self.doomed.push(client_id);
                }
                false
            }
        }
    }

    pub(crate) fn notify(&mut self, client_id: ClientId, text: impl Into<String>) -> bool {
        self.send(client_id, ServerMessage::Notice(text.into()))
    }

    fn room_ref(&self, name: &RoomName) -> &Room {
        match self.rooms.get(name) {
            Some(room) => room,
            None => unreachable!("client references unregistered room {}", name),
        }
    }

    fn room_mut(&mut self, name: &RoomName) -> &mut Room {
        match self.rooms.get_mut(name) {
            Some(room) => room,
            None => unreachable!("client references unregistered room {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) struct TestClient {
        pub id: ClientId,
        pub rx: mpsc::UnboundedReceiver<ServerMessage>,
    }

    impl TestClient {
        /// Drain queued messages into individual text lines
        pub fn lines(&mut self) -> Vec<String> {
            let mut lines = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                if let Some(text) = msg.text() {
                    lines.extend(text.lines().map(str::to_string));
                }
            }
            lines
        }

        /// Drain queued messages as-is
        pub fn messages(&mut self) -> Vec<ServerMessage> {
            let mut messages = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                messages.push(msg);
            }
            messages
        }
    }

    pub(super) fn server() -> ChatServer {
        let (_tx, rx) = mpsc::channel(8);
        let config = ServerConfig {
            default_rooms: vec!["chat".to_string()],
            max_line_length: 64,
            ..ServerConfig::default()
        };
        ChatServer::new(rx, &config)
    }

    pub(super) fn connect(server: &mut ChatServer) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ClientId::new();
        server.handle_command(ServerCommand::Connect {
            client_id: id,
            address: "127.0.0.1:40000".to_string(),
            sender: tx,
        });
        TestClient { id, rx }
    }

    pub(super) fn send_line(server: &mut ChatServer, client: &TestClient, line: &str) {
        server.handle_command(ServerCommand::Data {
            client_id: client.id,
            bytes: format!("{}\n", line).into_bytes(),
        });
    }

    /// Connect and pick a username, discarding the greeting
    pub(super) fn login(server: &mut ChatServer, username: &str) -> TestClient {
        let mut client = connect(server);
        send_line(server, &client, username);
        client.lines();
        client
    }

    #[test]
    fn test_connect_greets_and_prompts() {
        let mut server = server();
        let mut alice = connect(&mut server);

        assert_eq!(alice.lines(), vec![WELCOME, USERNAME_PROMPT]);
        assert_eq!(server.client_count(), 1);
        assert_eq!(server.named_count(), 0);
    }

    #[test]
    fn test_default_rooms_are_server_owned() {
        let server = server();
        let chat = server.room("chat").unwrap();

        assert_eq!(chat.owner, Owner::Server);
        assert!(chat.is_empty());
    }

    #[test]
    fn test_username_validation() {
        let mut server = server();
        let _alice = login(&mut server, "alice");
        let mut other = connect(&mut server);
        other.lines();

        send_line(&mut server, &other, "   ");
        assert_eq!(other.lines(), vec!["Username cannot be empty", USERNAME_PROMPT]);

        send_line(&mut server, &other, "bob smith");
        assert_eq!(
            other.lines(),
            vec!["Username cannot contain spaces", USERNAME_PROMPT]
        );

        send_line(&mut server, &other, "alice");
        assert_eq!(other.lines(), vec!["Sorry, alice is taken", USERNAME_PROMPT]);
        assert_eq!(server.named_count(), 1);

        send_line(&mut server, &other, "bob");
        assert_eq!(other.lines()[0], "Welcome, bob!");
        assert_eq!(server.named_count(), 2);
        assert_eq!(server.client_by_name("bob").unwrap().id, other.id);
    }

    #[test]
    fn test_username_set_only_once() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");

        // Once named, further lines are chat, not rename attempts
        send_line(&mut server, &alice, "mallory");
        assert_eq!(alice.lines()[0], "Not in a room");
        assert!(server.client_by_name("mallory").is_none());
        assert_eq!(server.named_count(), 1);
    }

    #[test]
    fn test_chat_outside_room_shows_commands() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");

        send_line(&mut server, &alice, "hello?");
        let lines = alice.lines();
        assert_eq!(lines[0], "Not in a room");
        assert_eq!(lines[1], "Valid commands:");
    }

    #[test]
    fn test_chat_reaches_other_members_only() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");
        let mut bob = login(&mut server, "bob");
        let mut carol = login(&mut server, "carol");
        send_line(&mut server, &alice, "/create lobby");
        for client in [&alice, &bob, &carol] {
            send_line(&mut server, client, "/join lobby");
        }
        alice.lines();
        bob.lines();
        carol.lines();

        send_line(&mut server, &alice, "hello");
        send_line(&mut server, &alice, "  second  ");

        let expected = vec!["alice (owner): hello", "alice (owner): second"];
        assert_eq!(bob.lines(), expected);
        assert_eq!(carol.lines(), expected);
        // The sender only gets its prompt back
        assert_eq!(
            alice.messages(),
            vec![ServerMessage::Prompt, ServerMessage::Prompt]
        );
    }

    #[test]
    fn test_escaped_prefix_is_chat() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");
        let mut bob = login(&mut server, "bob");
        send_line(&mut server, &alice, "/join chat");
        send_line(&mut server, &bob, "/join chat");
        alice.lines();
        bob.lines();

        send_line(&mut server, &alice, "//shrug");
        assert_eq!(bob.lines(), vec!["alice: /shrug"]);
    }

    #[test]
    fn test_blank_line_only_prompts() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");
        let mut bob = login(&mut server, "bob");
        send_line(&mut server, &alice, "/join chat");
        send_line(&mut server, &bob, "/join chat");
        alice.lines();
        bob.lines();

        send_line(&mut server, &alice, "");
        assert_eq!(alice.messages(), vec![ServerMessage::Prompt]);
        assert!(bob.lines().is_empty());
    }

    #[test]
    fn test_lines_split_across_reads() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");

        server.handle_command(ServerCommand::Data {
            client_id: alice.id,
            bytes: b"/cre".to_vec(),
        });
        assert!(alice.lines().is_empty());

        server.handle_command(ServerCommand::Data {
            client_id: alice.id,
            bytes: b"ate lobby\r\n/join lobby\n".to_vec(),
        });
        let lines = alice.lines();
        assert_eq!(lines[0], "You created a room: lobby");
        assert_eq!(lines[1], "Joined the room: lobby");
    }

    #[test]
    fn test_overlong_line_disconnects() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");

        server.handle_command(ServerCommand::Data {
            client_id: alice.id,
            bytes: vec![b'x'; 65],
        });

        assert_eq!(
            alice.messages(),
            vec![ServerMessage::Farewell("Line exceeds 64 bytes".to_string())]
        );
        assert_eq!(server.client_count(), 0);
        assert_eq!(server.named_count(), 0);
    }

    #[test]
    fn test_lines_before_overlong_line_still_run() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");

        let mut bytes = b"/create annex\n".to_vec();
        bytes.extend(vec![b'x'; 65]);
        bytes.push(b'\n');
        server.handle_command(ServerCommand::Data {
            client_id: alice.id,
            bytes,
        });

        assert_eq!(
            alice.messages(),
            vec![
                ServerMessage::Notice("You created a room: annex".to_string()),
                ServerMessage::Farewell("Line exceeds 64 bytes".to_string()),
            ]
        );
        assert!(server.room("annex").is_some());
        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn test_disconnect_cleans_every_registry() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");
        let bob = login(&mut server, "bob");
        send_line(&mut server, &alice, "/join chat");
        send_line(&mut server, &bob, "/join chat");
        alice.lines();

        server.handle_command(ServerCommand::Disconnect { client_id: bob.id });

        assert_eq!(alice.lines(), vec!["bob disconnected"]);
        assert!(server.client(bob.id).is_none());
        assert!(server.client_by_name("bob").is_none());
        assert_eq!(server.room("chat").unwrap().users(), &[alice.id]);

        // Second termination is a no-op
        server.handle_command(ServerCommand::Disconnect { client_id: bob.id });
        assert!(alice.lines().is_empty());
        assert_eq!(server.client_count(), 1);

        // The name is free again
        let _bob_again = login(&mut server, "bob");
        assert!(server.client_by_name("bob").is_some());
    }

    #[test]
    fn test_failed_delivery_terminates_recipient() {
        let mut server = server();
        let mut alice = login(&mut server, "alice");
        let bob = login(&mut server, "bob");
        let mut carol = login(&mut server, "carol");
        for client in [&alice, &bob, &carol] {
            send_line(&mut server, client, "/join chat");
        }
        alice.lines();
        carol.lines();

        let bob_id = bob.id;
        drop(bob);
        send_line(&mut server, &alice, "anyone there?");

        // Carol still got the chat line, then bob's departure
        assert_eq!(
            carol.lines(),
            vec!["alice: anyone there?", "bob disconnected"]
        );
        assert_eq!(alice.lines(), vec!["bob disconnected"]);
        assert!(server.client(bob_id).is_none());
        assert_eq!(server.room("chat").unwrap().user_count(), 2);
    }

    #[test]
    fn test_unnamed_disconnect() {
        let mut server = server();
        let stranger = connect(&mut server);

        server.handle_command(ServerCommand::Disconnect {
            client_id: stranger.id,
        });
        assert_eq!(server.client_count(), 0);
    }
}
