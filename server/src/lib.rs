//! # Chess Server Library
//!
//! This library provides the authoritative server for networked two-player
//! chess. It keeps the canonical board for every game, validates each move
//! against the shared rules, and relays accepted moves to the opponent.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rules
//! Clients may check legality locally, but every move is re-validated here.
//! A rejected move never reaches the opponent; the mover receives an error
//! line and the game continues.
//!
//! ### Matchmaking
//! Players arrive in a shared lobby. One creates a game and is seated on a
//! random color; another picks it from the open game list and takes the
//! other color. Lobby players are notified whenever the open list changes.
//!
//! ### Game Lifecycle
//! A game ends when a king is captured, when the move limit is exceeded, or
//! when either participant disconnects. Both participants receive the
//! result, return to the lobby, and the game is discarded.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Every TCP connection runs in its own task that reads newline-delimited
//! JSON requests and writes queued replies. Handlers never write to sockets
//! themselves: they push packets onto per-player outboxes while holding the
//! registry lock, and each connection task flushes its own outbox.
//!
//! ### Single Registry Lock
//! All players and games live in one registry behind a single async mutex.
//! Every request is processed to completion under that lock, so a move and a
//! concurrent disconnect can never interleave halfway.
//!
//! ## Module Organization
//!
//! - `config`: runtime settings and their validation
//! - `error`: request failures and their client-facing messages
//! - `game`: one game session, its turn order and end conditions
//! - `lobby`: player registry, matchmaking and request dispatch
//! - `network`: TCP listener and per-connection tasks
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:5006", ServerConfig::default()).await?;
//!
//!     // Accepts connections until the task is cancelled
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod lobby;
pub mod network;
