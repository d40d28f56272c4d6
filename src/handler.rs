//! TCP connection handling
//!
//! Binds the listening socket, runs the accept loop, and for each
//! connection spawns a reader (socket → ChatServer) and a writer
//! (ChatServer → socket) task.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::message::{encode_batch, ServerMessage};
use crate::server::{ChatServer, ServerCommand};
use crate::types::ClientId;

/// Largest single read from a client socket
pub const READ_BUFFER_SIZE: usize = 1024;

/// Channel buffer size for server commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Pending connection backlog
const LISTEN_BACKLOG: u32 = 1024;

/// Bind a listening socket with `SO_REUSEADDR` set
pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

/// Start the ChatServer actor and accept connections forever
pub async fn serve(listener: TcpListener, config: ServerConfig) {
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tokio::spawn(ChatServer::new(cmd_rx, &config).run());

    info!("ChatServer actor started");

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, cmd_tx).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Registers the client with the ChatServer, then shuttles bytes in both
/// directions until either side ends. The connection closes once the
/// ChatServer drops the client's outbound channel.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let client_id = ClientId::new();
    let (mut reader, mut writer) = stream.into_split();

    // Create channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Register with ChatServer
    cmd_tx
        .send(ServerCommand::Connect {
            client_id,
            address: peer.to_string(),
            sender: msg_tx,
        })
        .await
        .map_err(|_| AppError::ChannelSend)?;

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (socket -> ServerCommand)
    let mut read_task = tokio::spawn(async move {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("Client {} closed the connection", client_id);
                    break;
                }
                Ok(n) => {
                    let cmd = ServerCommand::Data {
                        client_id,
                        bytes: buf[..n].to_vec(),
                    };
                    if cmd_tx_read.send(cmd).await.is_err() {
                        debug!("Server closed, ending read task for {}", client_id);
                        break;
                    }
                }
                Err(e) => {
                    debug!("Read error for {}: {}", client_id, e);
                    break;
                }
            }
        }
    });

    // Spawn write task (ServerMessage -> socket)
    let mut write_task = tokio::spawn(async move {
        let mut batch = Vec::new();
        while let Some(msg) = msg_rx.recv().await {
            batch.push(msg);
            while let Ok(msg) = msg_rx.try_recv() {
                batch.push(msg);
            }

            let bytes = encode_batch(&batch);
            batch.clear();
            if let Err(e) = writer.write_all(bytes.as_bytes()).await {
                debug!("Write failed, ending write task: {}", e);
                break;
            }
        }

        let _ = writer.shutdown().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
            let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;
            // Flushes whatever the server queued until it drops the client
            let _ = write_task.await;
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
            let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;
        }
    }

    info!("Client {} disconnected", client_id);

    Ok(())
}
