//! Request errors reported back to the player who caused them
//!
//! None of these end the connection; transport failures are plain
//! `std::io::Error`s handled by the network layer.

use crate::game::PlayerId;
use shared::GameId;

/// A move the game refused to apply. Session state is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Illegal move")]
    IllegalMove,

    #[error("Game is not in progress")]
    GameNotActive,
}

/// A lobby request that could not be served. The registry is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Game not found")]
    GameNotFound(GameId),

    #[error("Game is already full")]
    GameFull(GameId),

    #[error("Already in a game")]
    AlreadyInGame,

    #[error("Not a player in this game")]
    NotInGame(GameId),

    #[error("Server full")]
    ServerFull,

    #[error("Unknown player")]
    UnknownPlayer(PlayerId),

    #[error(transparent)]
    Rule(#[from] RuleViolation),
}

/// Invalid server settings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(String),
}
