//! Types shared by the chess server and its clients: the board model, the
//! move rules, and the newline-delimited JSON protocol.
//!
//! Clients use the same rules as the server so they can show legal
//! destinations locally, but the server stays authoritative: every move is
//! re-validated there before it reaches the opponent.

pub mod board;
pub mod protocol;
pub mod rules;

pub use board::{Board, Color, Piece, PieceKind, Square, BOARD_SIZE};
pub use protocol::{
    decode_client_line, decode_server_line, encode_line, ClientPacket, GameId, GameListing,
    MoveData, ProtocolError, ServerPacket, MAX_LINE_LEN,
};
pub use rules::{is_legal_move, legal_destinations};
