//! Player registry, open game list and session ownership
//!
//! This module holds every piece of shared mutable server state:
//! - Connected players, each with an outbox feeding their connection task
//! - Game sessions from creation until they end
//! - The open game list shown to players who are not in a game
//!
//! [`Registry`] is plain synchronous state so it can be driven directly from
//! tests. [`Lobby`] wraps it in a single async mutex and is what connection
//! tasks share. Handlers never touch sockets: they only queue packets on
//! bounded player outboxes without waiting, so holding the lock never waits
//! on the network. A player whose outbox is full misses the packet.

use crate::config::ServerConfig;
use crate::error::{LobbyError, RuleViolation};
use crate::game::{GameSession, MoveReport, PlayerId};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ClientPacket, Color, GameId, GameListing, MoveData, ServerPacket};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

/// Packets that may wait for a slow connection before new ones are dropped
pub const OUTBOX_CAPACITY: usize = 64;

/// Sending half of a player's connection channel
pub type Outbox = mpsc::Sender<ServerPacket>;

/// A connected player
///
/// `current_game` refers to the session by id only; the registry owns sessions.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: Option<Color>,
    pub current_game: Option<GameId>,
    outbox: Outbox,
}

impl Player {
    pub fn new(id: PlayerId, outbox: Outbox) -> Self {
        Self {
            id,
            name: format!("Player-{}", id),
            color: None,
            current_game: None,
            outbox,
        }
    }

    /// Queues a packet for the connection task without waiting
    ///
    /// Returns false if the packet was dropped, either because the connection
    /// is gone or because the client stopped reading and the outbox is full.
    pub fn send(&self, packet: ServerPacket) -> bool {
        match self.outbox.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(packet)) => {
                warn!("Outbox of player {} is full, dropping {:?}", self.id, packet);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn rename(&mut self, name: Option<String>) {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.name = name;
        }
    }

    fn in_lobby(&self) -> bool {
        self.current_game.is_none()
    }
}

/// All players and sessions of one server process
pub struct Registry {
    players: HashMap<PlayerId, Player>,
    /// Ordered by id so the open game list is stable
    games: BTreeMap<GameId, GameSession>,
    next_player_id: PlayerId,
    next_game_id: GameId,
    rng: StdRng,
    config: ServerConfig,
}

impl Registry {
    pub fn new(config: ServerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            players: HashMap::new(),
            games: BTreeMap::new(),
            next_player_id: 1,
            next_game_id: 1,
            rng,
            config,
        }
    }

    /// Registers a new connection
    ///
    /// Fails with `ServerFull` once `max_players` are connected.
    pub fn add_player(&mut self, outbox: Outbox) -> Result<PlayerId, LobbyError> {
        if self.players.len() >= self.config.max_players {
            return Err(LobbyError::ServerFull);
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        self.players.insert(id, Player::new(id, outbox));
        info!("Player {} connected ({} online)", id, self.players.len());
        Ok(id)
    }

    /// Removes a player and tears down any session they were part of
    ///
    /// An opponent is credited with the win and told why; a game still
    /// waiting for a guest just disappears from the open list.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let player = match self.players.remove(&id) {
            Some(player) => player,
            None => return false,
        };

        if let Some(game_id) = player.current_game {
            if let Some(mut session) = self.games.remove(&game_id) {
                session.forfeit(id);
                self.close_game(session);
            }
            self.broadcast_game_list();
        }

        info!("Player {} ({}) disconnected", id, player.name);
        true
    }

    /// Processes one request, replying with an error packet if it fails
    pub fn handle(&mut self, player_id: PlayerId, packet: ClientPacket) {
        if let Err(e) = self.dispatch(player_id, packet) {
            debug!("Rejected request from player {}: {:?}", player_id, e);
            self.send_to(player_id, ServerPacket::error(e.to_string()));
        }
    }

    /// Routes a request to the lobby or to the player's session
    pub fn dispatch(&mut self, player_id: PlayerId, packet: ClientPacket) -> Result<(), LobbyError> {
        match packet {
            ClientPacket::JoinLobby { name } => self.join_lobby(player_id, name),
            ClientPacket::GetGames {} => {
                self.player(player_id)?;
                self.send_game_list(player_id);
                Ok(())
            }
            ClientPacket::CreateGame { name } => self.create_game(player_id, name).map(|_| ()),
            ClientPacket::JoinGame { game_id, name } => self.join_game(player_id, game_id, name),
            ClientPacket::Move { game_id, mv } => {
                self.make_move(player_id, game_id, mv).map(|_| ())
            }
        }
    }

    pub fn join_lobby(&mut self, player_id: PlayerId, name: Option<String>) -> Result<(), LobbyError> {
        self.player_mut(player_id)?.rename(name);
        self.send_game_list(player_id);
        Ok(())
    }

    /// Opens a new session with `player_id` as host on a random color
    pub fn create_game(
        &mut self,
        player_id: PlayerId,
        name: Option<String>,
    ) -> Result<GameId, LobbyError> {
        if !self.player(player_id)?.in_lobby() {
            return Err(LobbyError::AlreadyInGame);
        }

        let host_color = if self.rng.gen_bool(0.5) {
            Color::White
        } else {
            Color::Black
        };
        let game_id = self.next_game_id;
        self.next_game_id += 1;

        let player = self.player_mut(player_id)?;
        player.rename(name);
        player.color = Some(host_color);
        player.current_game = Some(game_id);
        player.send(ServerPacket::GameCreated {
            game_id,
            is_white: host_color == Color::White,
        });
        info!("Game {} created by {} playing {}", game_id, player.name, host_color);

        let session = GameSession::new(game_id, player_id, host_color, self.config.move_limit);
        self.games.insert(game_id, session);

        self.broadcast_game_list();
        Ok(game_id)
    }

    /// Seats `player_id` as guest of `game_id` and starts the game
    pub fn join_game(
        &mut self,
        player_id: PlayerId,
        game_id: GameId,
        name: Option<String>,
    ) -> Result<(), LobbyError> {
        let session = self
            .games
            .get(&game_id)
            .ok_or(LobbyError::GameNotFound(game_id))?;
        if !session.is_open() {
            return Err(LobbyError::GameFull(game_id));
        }
        let host_id = session.host();
        if !self.player(player_id)?.in_lobby() {
            return Err(LobbyError::AlreadyInGame);
        }
        let host_name = self.player(host_id)?.name.clone();

        let guest_color = self
            .games
            .get_mut(&game_id)
            .ok_or(LobbyError::GameNotFound(game_id))?
            .seat_guest(player_id)?;

        let guest = self.player_mut(player_id)?;
        guest.rename(name);
        guest.color = Some(guest_color);
        guest.current_game = Some(game_id);
        guest.send(ServerPacket::GameJoined {
            game_id,
            is_white: guest_color == Color::White,
            opponent: host_name.clone(),
        });
        let guest_name = guest.name.clone();

        self.send_to(
            host_id,
            ServerPacket::OpponentJoined {
                opponent: guest_name.clone(),
            },
        );
        info!("{} joined game {} hosted by {}", guest_name, game_id, host_name);

        self.broadcast_game_list();
        Ok(())
    }

    /// Applies a move for `player_id` and relays it to the opponent
    ///
    /// A move that ends the game is followed by `game_over` to both players
    /// and the session is discarded.
    pub fn make_move(
        &mut self,
        player_id: PlayerId,
        game_id: GameId,
        mv: MoveData,
    ) -> Result<MoveReport, LobbyError> {
        let session = self
            .games
            .get_mut(&game_id)
            .ok_or(LobbyError::GameNotFound(game_id))?;
        let color = session
            .color_of(player_id)
            .ok_or(LobbyError::NotInGame(game_id))?;
        let (from, to) = match mv.squares() {
            Some(squares) => squares,
            None => {
                session.check_turn(color)?;
                return Err(RuleViolation::IllegalMove.into());
            }
        };

        let report = session.apply_move(color, from, to)?;
        let opponent = session.opponent_of(player_id);
        debug!(
            "Game {}: {} moved {} -> {}",
            game_id, color, report.record.from, report.record.to
        );

        if let Some(opponent) = opponent {
            self.send_to(opponent, ServerPacket::Move { mv });
        }

        if report.outcome.is_some() {
            if let Some(session) = self.games.remove(&game_id) {
                self.close_game(session);
            }
        }

        Ok(report)
    }

    /// Sessions with no guest that have not ended, ordered by id
    pub fn open_games(&self) -> Vec<GameListing> {
        self.games
            .values()
            .filter(|session| session.is_open())
            .map(|session| GameListing {
                id: session.id(),
                host: self
                    .players
                    .get(&session.host())
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }

    pub fn send_game_list(&self, player_id: PlayerId) {
        self.send_to(
            player_id,
            ServerPacket::GameList {
                games: self.open_games(),
            },
        );
    }

    /// Sends the current open game list to every player not in a game
    pub fn broadcast_game_list(&self) {
        let games = self.open_games();
        for player in self.players.values().filter(|p| p.in_lobby()) {
            player.send(ServerPacket::GameList {
                games: games.clone(),
            });
        }
    }

    pub fn send_to(&self, player_id: PlayerId, packet: ServerPacket) {
        if let Some(player) = self.players.get(&player_id) {
            if !player.send(packet) {
                debug!("Packet for player {} not queued", player_id);
            }
        }
    }

    pub fn game(&self, game_id: GameId) -> Option<&GameSession> {
        self.games.get(&game_id)
    }

    pub fn player(&self, player_id: PlayerId) -> Result<&Player, LobbyError> {
        self.players
            .get(&player_id)
            .ok_or(LobbyError::UnknownPlayer(player_id))
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    fn player_mut(&mut self, player_id: PlayerId) -> Result<&mut Player, LobbyError> {
        self.players
            .get_mut(&player_id)
            .ok_or(LobbyError::UnknownPlayer(player_id))
    }

    /// Notifies the remaining participants of an ended session and frees them
    fn close_game(&mut self, session: GameSession) {
        let outcome = session.outcome();
        let winner = outcome
            .and_then(|o| o.winner)
            .and_then(|color| session.player_with(color))
            .and_then(|id| self.players.get(&id))
            .map(|p| p.name.clone());

        for id in [Some(session.host()), session.guest()].into_iter().flatten() {
            if let Some(player) = self.players.get_mut(&id) {
                player.current_game = None;
                player.color = None;
                if let Some(outcome) = outcome {
                    player.send(ServerPacket::GameOver {
                        winner: winner.clone(),
                        result: outcome.result.to_string(),
                    });
                }
            }
        }

        info!("Game {} removed", session.id());
    }
}

/// Registry shared by all connection tasks
///
/// One mutex serializes every mutation and every read that feeds a broadcast.
pub struct Lobby {
    registry: Mutex<Registry>,
}

impl Lobby {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: Mutex::new(Registry::new(config)),
        }
    }

    pub async fn connect(&self, outbox: Outbox) -> Result<PlayerId, LobbyError> {
        self.registry.lock().await.add_player(outbox)
    }

    pub async fn handle_packet(&self, player_id: PlayerId, packet: ClientPacket) {
        self.registry.lock().await.handle(player_id, packet);
    }

    pub async fn disconnect(&self, player_id: PlayerId) {
        self.registry.lock().await.remove_player(player_id);
    }

    pub async fn open_games(&self) -> Vec<GameListing> {
        self.registry.lock().await.open_games()
    }

    pub async fn has_game(&self, game_id: GameId) -> bool {
        self.registry.lock().await.game(game_id).is_some()
    }

    pub async fn player_count(&self) -> usize {
        self.registry.lock().await.player_count()
    }
}
