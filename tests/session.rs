//! End-to-end sessions over real TCP sockets

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use roomchat::{bind, serve, ServerConfig};

const WAIT: Duration = Duration::from_secs(5);

async fn start() -> SocketAddr {
    let listener = bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        default_rooms: vec!["chat".to_string()],
        ..ServerConfig::default()
    };
    tokio::spawn(serve(listener, config));
    addr
}

struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Connect and pick a username
    async fn login(addr: SocketAddr, username: &str) -> Self {
        let mut peer = Self::connect(addr).await;
        peer.expect("Username?").await;
        peer.send(username).await;
        peer.expect(&format!("Welcome, {}!", username)).await;
        peer
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Read lines until one contains `needle`
    async fn expect(&mut self, needle: &str) -> String {
        loop {
            let mut line = String::new();
            let n = timeout(WAIT, self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for server")
                .unwrap();
            assert!(n > 0, "connection closed while waiting for {:?}", needle);
            if line.contains(needle) {
                return line;
            }
        }
    }

    /// Read until the server closes the connection
    async fn expect_closed(&mut self) {
        let mut rest = String::new();
        loop {
            let mut line = String::new();
            let n = timeout(WAIT, self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for close")
                .unwrap();
            if n == 0 {
                break;
            }
            rest.push_str(&line);
        }
        assert!(!rest.ends_with("=> "), "prompt after farewell: {:?}", rest);
    }
}

#[tokio::test]
async fn test_greeting_wire_format() {
    let addr = start().await;
    let mut peer = Peer::connect(addr).await;

    let line = peer.expect("Welcome to the chat server").await;
    assert_eq!(line, "<= Welcome to the chat server\r\n");
    let line = peer.expect("Username?").await;
    assert!(line.ends_with("<= Username?\r\n"));
}

#[tokio::test]
async fn test_room_chat_and_quit() {
    let addr = start().await;
    let mut alice = Peer::login(addr, "alice").await;
    let mut bob = Peer::login(addr, "bob").await;

    alice.send("/create lobby").await;
    alice.expect("You created a room: lobby").await;
    alice.send("/join lobby").await;
    alice.expect("alice (owner) (you)").await;

    bob.send("/j lobby").await;
    bob.expect("Joined the room: lobby").await;
    alice.expect("bob joined the room").await;

    alice.send("hello bob").await;
    let line = bob.expect("hello bob").await;
    assert!(line.ends_with("<= alice (owner): hello bob\r\n"));

    bob.send("/quit").await;
    bob.expect("Come again soon!").await;
    bob.expect_closed().await;
    alice.expect("bob left the room").await;
}

#[tokio::test]
async fn test_abrupt_disconnect_notifies_room() {
    let addr = start().await;
    let mut alice = Peer::login(addr, "alice").await;
    let mut bob = Peer::login(addr, "bob").await;

    alice.send("/join chat").await;
    alice.expect("Joined the room: chat").await;
    bob.send("/join chat").await;
    bob.expect("Joined the room: chat").await;
    alice.expect("bob joined the room").await;

    drop(bob);
    alice.expect("bob disconnected").await;

    // The username is free again
    let _bob = Peer::login(addr, "bob").await;
}

#[tokio::test]
async fn test_line_split_across_writes() {
    let addr = start().await;
    let mut alice = Peer::login(addr, "alice").await;

    alice.writer.write_all(b"/cre").await.unwrap();
    alice.writer.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    alice.writer.write_all(b"ate annex\r\n").await.unwrap();

    alice.expect("You created a room: annex").await;
}

#[tokio::test]
async fn test_taken_username_reprompts() {
    let addr = start().await;
    let _alice = Peer::login(addr, "alice").await;
    let mut other = Peer::connect(addr).await;

    other.expect("Username?").await;
    other.send("alice").await;
    other.expect("Sorry, alice is taken").await;
    other.expect("Username?").await;
    other.send("alice2").await;
    other.expect("Welcome, alice2!").await;
}
