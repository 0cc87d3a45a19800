//! Wire protocol between the chess server and its clients
//!
//! Every message is a single JSON object terminated by `\n`. The object's
//! `"type"` field names the message kind; the remaining fields are the
//! payload. Clients and server use different vocabularies, modelled as
//! [`ClientPacket`] and [`ServerPacket`].

use crate::board::Square;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lines longer than this are treated as a broken connection rather than a bad message
pub const MAX_LINE_LEN: usize = 64 * 1024;

pub const LINE_DELIMITER: u8 = b'\n';

pub type GameId = u64;

/// Board coordinates of a move as they travel on the wire
///
/// Any integer is accepted here so that out-of-range coordinates, negative
/// ones included, are rejected as illegal moves rather than as bad messages.
/// Use [`MoveData::squares`] to get checked squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveData {
    pub from_row: i64,
    pub from_col: i64,
    pub to_row: i64,
    pub to_col: i64,
}

impl MoveData {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from_row: from.row().into(),
            from_col: from.col().into(),
            to_row: to.row().into(),
            to_col: to.col().into(),
        }
    }

    /// Source and destination squares, or None if either lies off the board
    pub fn squares(&self) -> Option<(Square, Square)> {
        let from = square_at(self.from_row, self.from_col)?;
        let to = square_at(self.to_row, self.to_col)?;
        Some((from, to))
    }
}

fn square_at(row: i64, col: i64) -> Option<Square> {
    Square::new(u8::try_from(row).ok()?, u8::try_from(col).ok()?)
}

/// One entry of the open game list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameListing {
    pub id: GameId,
    pub host: String,
}

/// Messages sent by a client to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientPacket {
    JoinLobby {
        #[serde(default)]
        name: Option<String>,
    },
    GetGames {},
    CreateGame {
        #[serde(default)]
        name: Option<String>,
    },
    JoinGame {
        game_id: GameId,
        #[serde(default)]
        name: Option<String>,
    },
    Move {
        game_id: GameId,
        #[serde(rename = "move")]
        mv: MoveData,
    },
}

impl ClientPacket {
    pub const KINDS: [&'static str; 5] =
        ["join_lobby", "get_games", "create_game", "join_game", "move"];
}

/// Messages sent by the server to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerPacket {
    GameList {
        games: Vec<GameListing>,
    },
    GameCreated {
        game_id: GameId,
        is_white: bool,
    },
    GameJoined {
        game_id: GameId,
        is_white: bool,
        opponent: String,
    },
    OpponentJoined {
        opponent: String,
    },
    Move {
        #[serde(rename = "move")]
        mv: MoveData,
    },
    GameOver {
        winner: Option<String>,
        result: String,
    },
    Error {
        message: String,
    },
}

impl ServerPacket {
    pub fn error(message: impl Into<String>) -> Self {
        ServerPacket::Error {
            message: message.into(),
        }
    }
}

/// A line that could not be turned into a packet
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message")]
    Malformed { reason: String },

    #[error("unknown message type: {0}")]
    UnknownKind(String),
}

/// Serializes a packet into one newline-terminated line
pub fn encode_line<T: Serialize>(packet: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(packet)?;
    line.push(LINE_DELIMITER);
    Ok(line)
}

/// Parses one line received from a client
///
/// The trailing delimiter (and a `\r` before it) is optional.
pub fn decode_client_line(line: &[u8]) -> Result<ClientPacket, ProtocolError> {
    let text = std::str::from_utf8(trim_line(line)).map_err(|e| ProtocolError::Malformed {
        reason: e.to_string(),
    })?;

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
            reason: e.to_string(),
        })?;

    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed {
            reason: "missing \"type\" field".to_string(),
        })?;

    if !ClientPacket::KINDS.contains(&kind) {
        return Err(ProtocolError::UnknownKind(kind.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed {
        reason: e.to_string(),
    })
}

/// Parses one line received from the server
pub fn decode_server_line(line: &[u8]) -> Result<ServerPacket, ProtocolError> {
    serde_json::from_slice(trim_line(line)).map_err(|e| ProtocolError::Malformed {
        reason: e.to_string(),
    })
}

/// True for lines holding nothing but whitespace
pub fn is_blank_line(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(&[LINE_DELIMITER]).unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
