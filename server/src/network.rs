//! Server network layer: TCP listener and per-connection tasks
//!
//! Each accepted connection gets its own task. The task owns both halves of
//! the stream: it reads newline-delimited requests and writes whatever the
//! lobby queued on the player's outbox. Queued packets are always written
//! before the next request is read, so replies keep request order.

use crate::config::ServerConfig;
use crate::game::PlayerId;
use crate::lobby::{Lobby, OUTBOX_CAPACITY};
use log::{debug, error, info, warn};
use shared::protocol::{is_blank_line, LINE_DELIMITER};
use shared::{decode_client_line, encode_line, ServerPacket, MAX_LINE_LEN};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;

/// Accepts connections and hands each one to its own task
pub struct Server {
    listener: TcpListener,
    lobby: Arc<Lobby>,
}

impl Server {
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: ServerConfig) -> io::Result<Self> {
        config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr).await?;
        info!("Chess server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            lobby: Arc::new(Lobby::new(config)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared lobby, for inspecting server state from outside the accept loop
    pub fn lobby(&self) -> Arc<Lobby> {
        Arc::clone(&self.lobby)
    }

    /// Accept loop. Only returns if the task is cancelled.
    pub async fn run(self) -> io::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                    }

                    let lobby = Arc::clone(&self.lobby);
                    tokio::spawn(async move {
                        debug!("Accepted connection from {}", addr);
                        match serve_connection(lobby, stream).await {
                            Ok(()) => debug!("Connection from {} closed", addr),
                            Err(e) => warn!("Connection from {} failed: {}", addr, e),
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Runs one player's connection until it closes or fails
///
/// The player is registered on entry and always removed on exit, which ends
/// any game they were in.
pub async fn serve_connection<S>(lobby: Arc<Lobby>, stream: S) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut writer) = tokio::io::split(stream);
    let (outbox, mut inbox) = mpsc::channel(OUTBOX_CAPACITY);

    let player_id = match lobby.connect(outbox).await {
        Ok(id) => id,
        Err(e) => {
            info!("Refusing connection: {}", e);
            return write_packet(&mut writer, &ServerPacket::error(e.to_string())).await;
        }
    };

    let mut reader = BufReader::new(read_half);
    let result = run_connection(&lobby, player_id, &mut reader, &mut writer, &mut inbox).await;

    lobby.disconnect(player_id).await;
    result
}

async fn run_connection<R, W>(
    lobby: &Lobby,
    player_id: PlayerId,
    reader: &mut R,
    writer: &mut W,
    inbox: &mut mpsc::Receiver<ServerPacket>,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();

    loop {
        tokio::select! {
            biased;

            packet = inbox.recv() => match packet {
                Some(packet) => write_packet(writer, &packet).await?,
                // The lobby dropped this player
                None => return Ok(()),
            },

            complete = read_line(reader, &mut line) => {
                if !complete? {
                    return Ok(());
                }

                if !is_blank_line(&line) {
                    match decode_client_line(&line) {
                        Ok(packet) => lobby.handle_packet(player_id, packet).await,
                        Err(e) => {
                            warn!("Protocol error from player {}: {:?}", player_id, e);
                            write_packet(writer, &ServerPacket::error(e.to_string())).await?;
                        }
                    }
                }
                line.clear();
            }
        }
    }
}

/// Reads up to and including the next delimiter into `line`
///
/// Returns Ok(false) at end of stream; an unterminated trailing fragment is
/// dropped. Safe to cancel: partial input stays in `line` and the next call
/// continues from there. A line over `MAX_LINE_LEN` is an `InvalidData` error.
async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let budget = (MAX_LINE_LEN + 1).saturating_sub(line.len()) as u64;
    (&mut *reader)
        .take(budget)
        .read_until(LINE_DELIMITER, line)
        .await?;

    if line.last() == Some(&LINE_DELIMITER) {
        return Ok(true);
    }
    if line.len() > MAX_LINE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds {} bytes", MAX_LINE_LEN),
        ));
    }
    Ok(false)
}

async fn write_packet<W>(writer: &mut W, packet: &ServerPacket) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_line(packet).map_err(io::Error::from)?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}
