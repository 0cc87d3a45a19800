//! Game session state machine
//!
//! A session is created waiting for a guest, becomes active when one joins and
//! ends when a king is captured, the move log outgrows the move limit, or a
//! participant leaves. Ended sessions are discarded by the lobby.

use crate::error::{LobbyError, RuleViolation};
use log::info;
use shared::{is_legal_move, Board, Color, GameId, Piece, PieceKind, Square};
use std::fmt;

pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    WaitingForGuest,
    Active,
    Over,
}

/// Why a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    /// A king was captured
    Checkmate,
    /// The move log exceeded the move limit
    MoveLimit,
    OpponentDisconnected,
}

impl GameResult {
    /// Text sent to clients in `game_over`
    pub fn as_str(self) -> &'static str {
        match self {
            GameResult::Checkmate => "checkmate",
            GameResult::MoveLimit => "50-move rule",
            GameResult::OpponentDisconnected => "opponent_disconnected",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOutcome {
    /// None for a draw
    pub winner: Option<Color>,
    pub result: GameResult,
}

/// A recorded move. Never modified after it enters the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<Piece>,
    /// Set when a pawn reached the far rank and became a queen
    pub promotion: Option<PieceKind>,
    pub turn_color: Color,
}

/// Result of a successfully applied move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport {
    pub record: Move,
    pub outcome: Option<GameOutcome>,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    id: GameId,
    host: PlayerId,
    guest: Option<PlayerId>,
    host_color: Color,
    board: Board,
    turn: Color,
    moves: Vec<Move>,
    status: SessionStatus,
    outcome: Option<GameOutcome>,
    move_limit: usize,
}

impl GameSession {
    pub fn new(id: GameId, host: PlayerId, host_color: Color, move_limit: usize) -> Self {
        Self {
            id,
            host,
            guest: None,
            host_color,
            board: Board::initial(),
            turn: Color::White,
            moves: Vec::new(),
            status: SessionStatus::WaitingForGuest,
            outcome: None,
            move_limit,
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn host(&self) -> PlayerId {
        self.host
    }

    pub fn guest(&self) -> Option<PlayerId> {
        self.guest
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn outcome(&self) -> Option<GameOutcome> {
        self.outcome
    }

    /// Listed in the lobby: no guest yet and not finished
    pub fn is_open(&self) -> bool {
        self.guest.is_none() && self.status != SessionStatus::Over
    }

    pub fn color_of(&self, player: PlayerId) -> Option<Color> {
        if player == self.host {
            Some(self.host_color)
        } else if Some(player) == self.guest {
            Some(self.host_color.opposite())
        } else {
            None
        }
    }

    pub fn player_with(&self, color: Color) -> Option<PlayerId> {
        if color == self.host_color {
            Some(self.host)
        } else {
            self.guest
        }
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.color_of(player)
            .and_then(|color| self.player_with(color.opposite()))
    }

    /// Seats the guest and starts the game, returning the guest's color
    pub fn seat_guest(&mut self, guest: PlayerId) -> Result<Color, LobbyError> {
        if self.guest.is_some() || self.status != SessionStatus::WaitingForGuest {
            return Err(LobbyError::GameFull(self.id));
        }

        self.guest = Some(guest);
        self.status = SessionStatus::Active;
        info!("Game {} started: player {} joined", self.id, guest);
        Ok(self.host_color.opposite())
    }

    /// Validates and applies a move for `mover`
    ///
    /// Either the board, the move log and the turn all change, or nothing does.
    /// The turn does not flip on a move that ends the game.
    pub fn apply_move(
        &mut self,
        mover: Color,
        from: Square,
        to: Square,
    ) -> Result<MoveReport, RuleViolation> {
        self.check_turn(mover)?;
        if !is_legal_move(&self.board, from, to, mover) {
            return Err(RuleViolation::IllegalMove);
        }

        let piece = match self.board.get(from) {
            Some(piece) => piece,
            None => return Err(RuleViolation::IllegalMove),
        };
        let captured = self.board.get(to);

        let promotion = (piece.kind == PieceKind::Pawn && to.row() == mover.promotion_row())
            .then_some(PieceKind::Queen);
        let placed = Piece::new(promotion.unwrap_or(piece.kind), mover);

        self.board.set(from, None);
        self.board.set(to, Some(placed));

        let record = Move {
            from,
            to,
            piece,
            captured,
            promotion,
            turn_color: mover,
        };
        self.moves.push(record);

        let outcome = self.check_game_over(mover);
        match outcome {
            Some(outcome) => self.finish(outcome),
            None => self.turn = mover.opposite(),
        }

        Ok(MoveReport { record, outcome })
    }

    /// Fails unless the game is running and it is `mover`'s turn
    pub fn check_turn(&self, mover: Color) -> Result<(), RuleViolation> {
        if self.status != SessionStatus::Active {
            return Err(RuleViolation::GameNotActive);
        }
        if mover != self.turn {
            return Err(RuleViolation::NotYourTurn);
        }
        Ok(())
    }

    /// Ends an active game in favour of whoever did not leave
    ///
    /// A waiting game simply closes; there is nobody to credit, so no outcome.
    pub fn forfeit(&mut self, leaver: PlayerId) -> Option<GameOutcome> {
        match self.status {
            SessionStatus::Active => {
                let winner = self.opponent_of(leaver).and_then(|p| self.color_of(p));
                let outcome = GameOutcome {
                    winner,
                    result: GameResult::OpponentDisconnected,
                };
                self.finish(outcome);
                Some(outcome)
            }
            SessionStatus::WaitingForGuest => {
                self.status = SessionStatus::Over;
                None
            }
            SessionStatus::Over => None,
        }
    }

    fn check_game_over(&self, mover: Color) -> Option<GameOutcome> {
        if !self.board.has_king(Color::White) || !self.board.has_king(Color::Black) {
            return Some(GameOutcome {
                winner: Some(mover),
                result: GameResult::Checkmate,
            });
        }

        if self.moves.len() > self.move_limit {
            return Some(GameOutcome {
                winner: None,
                result: GameResult::MoveLimit,
            });
        }

        None
    }

    fn finish(&mut self, outcome: GameOutcome) {
        self.status = SessionStatus::Over;
        self.outcome = Some(outcome);
        info!("Game {} over: {}", self.id, outcome.result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: PlayerId = 1;
    const GUEST: PlayerId = 2;

    fn sq(row: u8, col: u8) -> Square {
        Square::new(row, col).unwrap()
    }

    fn active_session(host_color: Color) -> GameSession {
        let mut session = GameSession::new(1, HOST, host_color, 200);
        session.seat_guest(GUEST).unwrap();
        session
    }

    fn filler_move(turn_color: Color) -> Move {
        Move {
            from: sq(0, 0),
            to: sq(0, 1),
            piece: Piece::new(PieceKind::Rook, turn_color),
            captured: None,
            promotion: None,
            turn_color,
        }
    }

    #[test]
    fn test_session_creation() {
        let session = GameSession::new(7, HOST, Color::Black, 200);
        assert_eq!(session.id(), 7);
        assert_eq!(session.status(), SessionStatus::WaitingForGuest);
        assert_eq!(session.turn(), Color::White);
        assert!(session.is_open());
        assert!(session.moves().is_empty());
        assert_eq!(session.board(), &Board::initial());
    }

    #[test]
    fn test_seat_guest_assigns_opposite_color() {
        let mut session = GameSession::new(1, HOST, Color::Black, 200);
        let color = session.seat_guest(GUEST).unwrap();

        assert_eq!(color, Color::White);
        assert_eq!(session.status(), SessionStatus::Active);
        assert!(!session.is_open());
        assert_eq!(session.color_of(HOST), Some(Color::Black));
        assert_eq!(session.color_of(GUEST), Some(Color::White));
        assert_eq!(session.player_with(Color::White), Some(GUEST));
        assert_eq!(session.opponent_of(HOST), Some(GUEST));
        assert_eq!(session.color_of(99), None);
    }

    #[test]
    fn test_seat_second_guest_fails() {
        let mut session = active_session(Color::White);
        assert_eq!(session.seat_guest(3), Err(LobbyError::GameFull(1)));
        assert_eq!(session.guest(), Some(GUEST));
    }

    #[test]
    fn test_move_before_guest_rejected() {
        let mut session = GameSession::new(1, HOST, Color::White, 200);
        let result = session.apply_move(Color::White, sq(6, 4), sq(4, 4));
        assert_eq!(result, Err(RuleViolation::GameNotActive));
    }

    #[test]
    fn test_accepted_move_flips_turn() {
        let mut session = active_session(Color::White);
        let report = session.apply_move(Color::White, sq(6, 4), sq(4, 4)).unwrap();

        assert_eq!(report.outcome, None);
        assert_eq!(report.record.piece, Piece::new(PieceKind::Pawn, Color::White));
        assert_eq!(report.record.captured, None);
        assert_eq!(session.turn(), Color::Black);
        assert_eq!(session.moves().len(), 1);
        assert_eq!(
            session.board().get(sq(4, 4)),
            Some(Piece::new(PieceKind::Pawn, Color::White))
        );
        assert_eq!(session.board().get(sq(6, 4)), None);
    }

    #[test]
    fn test_out_of_turn_move_leaves_state_unchanged() {
        let mut session = active_session(Color::White);
        session.apply_move(Color::White, sq(6, 4), sq(4, 4)).unwrap();

        let board_before = session.board().clone();
        let moves_before = session.moves().to_vec();

        let result = session.apply_move(Color::White, sq(1, 4), sq(4, 4));
        assert_eq!(result, Err(RuleViolation::NotYourTurn));
        assert_eq!(session.board(), &board_before);
        assert_eq!(session.moves(), moves_before.as_slice());
        assert_eq!(session.turn(), Color::Black);
    }

    #[test]
    fn test_illegal_move_leaves_state_unchanged() {
        let mut session = active_session(Color::White);
        let board_before = session.board().clone();

        let result = session.apply_move(Color::White, sq(7, 0), sq(4, 0));
        assert_eq!(result, Err(RuleViolation::IllegalMove));
        assert_eq!(session.board(), &board_before);
        assert!(session.moves().is_empty());
        assert_eq!(session.turn(), Color::White);
    }

    #[test]
    fn test_capture_is_recorded() {
        let mut session = active_session(Color::White);
        session.apply_move(Color::White, sq(6, 4), sq(4, 4)).unwrap();
        session.apply_move(Color::Black, sq(1, 3), sq(3, 3)).unwrap();
        let report = session.apply_move(Color::White, sq(4, 4), sq(3, 3)).unwrap();

        assert_eq!(
            report.record.captured,
            Some(Piece::new(PieceKind::Pawn, Color::Black))
        );
        assert_eq!(session.moves().len(), 3);
        assert_eq!(session.turn(), Color::Black);
    }

    #[test]
    fn test_pawn_promotes_to_queen() {
        let mut session = active_session(Color::White);
        session.board = Board::from_rows(&[
            "....k...", "P.......", "........", "........", "........", "........", "........",
            "....K...",
        ])
        .unwrap();

        let report = session.apply_move(Color::White, sq(1, 0), sq(0, 0)).unwrap();
        assert_eq!(report.record.promotion, Some(PieceKind::Queen));
        assert_eq!(report.record.piece.kind, PieceKind::Pawn);
        assert_eq!(
            session.board().get(sq(0, 0)),
            Some(Piece::new(PieceKind::Queen, Color::White))
        );
    }

    #[test]
    fn test_black_pawn_promotes_on_row_seven() {
        let mut session = active_session(Color::White);
        session.board = Board::from_rows(&[
            "....k...", "........", "........", "........", "........", "........", "p.......",
            "....K...",
        ])
        .unwrap();
        session.turn = Color::Black;

        let report = session.apply_move(Color::Black, sq(6, 0), sq(7, 0)).unwrap();
        assert_eq!(report.record.promotion, Some(PieceKind::Queen));
        assert_eq!(report.record.turn_color, Color::Black);
        assert_eq!(
            session.board().get(sq(7, 0)),
            Some(Piece::new(PieceKind::Queen, Color::Black))
        );
        assert!(session.board().is_empty_at(sq(6, 0)));
        assert_eq!(session.turn(), Color::White);
    }

    #[test]
    fn test_check_turn_order() {
        let mut waiting = GameSession::new(1, HOST, Color::White, 200);
        assert_eq!(
            waiting.check_turn(Color::White),
            Err(RuleViolation::GameNotActive)
        );

        waiting.seat_guest(GUEST).unwrap();
        assert_eq!(waiting.check_turn(Color::White), Ok(()));
        assert_eq!(
            waiting.check_turn(Color::Black),
            Err(RuleViolation::NotYourTurn)
        );
    }

    #[test]
    fn test_king_capture_ends_game() {
        let mut session = active_session(Color::Black);
        session.board = Board::from_rows(&[
            "....k...", "....R...", "........", "........", "........", "........", "........",
            "....K...",
        ])
        .unwrap();

        let report = session.apply_move(Color::White, sq(1, 4), sq(0, 4)).unwrap();
        let outcome = report.outcome.unwrap();

        assert_eq!(outcome.winner, Some(Color::White));
        assert_eq!(outcome.result, GameResult::Checkmate);
        assert_eq!(session.status(), SessionStatus::Over);
        // The finishing move does not hand the turn over
        assert_eq!(session.turn(), Color::White);
        assert_eq!(session.player_with(Color::White), Some(GUEST));
    }

    #[test]
    fn test_no_moves_after_game_over() {
        let mut session = active_session(Color::White);
        session.forfeit(HOST);
        let result = session.apply_move(Color::White, sq(6, 4), sq(4, 4));
        assert_eq!(result, Err(RuleViolation::GameNotActive));
    }

    #[test]
    fn test_move_limit_ends_in_draw() {
        let mut session = active_session(Color::White);
        for i in 0..201 {
            let color = if i % 2 == 0 { Color::White } else { Color::Black };
            session.moves.push(filler_move(color));
        }
        assert_eq!(session.moves().len(), 201);

        let report = session.apply_move(Color::White, sq(6, 0), sq(5, 0)).unwrap();
        let outcome = report.outcome.unwrap();

        assert_eq!(outcome.result, GameResult::MoveLimit);
        assert_eq!(outcome.result.as_str(), "50-move rule");
        assert_eq!(outcome.winner, None);
        assert_eq!(session.status(), SessionStatus::Over);
    }

    #[test]
    fn test_move_limit_triggers_once_exceeded() {
        let mut session = GameSession::new(1, HOST, Color::White, 2);
        session.seat_guest(GUEST).unwrap();

        assert!(session
            .apply_move(Color::White, sq(6, 0), sq(5, 0))
            .unwrap()
            .outcome
            .is_none());
        assert!(session
            .apply_move(Color::Black, sq(1, 0), sq(2, 0))
            .unwrap()
            .outcome
            .is_none());

        let report = session.apply_move(Color::White, sq(5, 0), sq(4, 0)).unwrap();
        assert_eq!(report.outcome.map(|o| o.result), Some(GameResult::MoveLimit));
    }

    #[test]
    fn test_checkmate_takes_precedence_over_move_limit() {
        let mut session = GameSession::new(1, HOST, Color::White, 0);
        session.seat_guest(GUEST).unwrap();
        session.board = Board::from_rows(&[
            "....k...", "....R...", "........", "........", "........", "........", "........",
            "....K...",
        ])
        .unwrap();

        let report = session.apply_move(Color::White, sq(1, 4), sq(0, 4)).unwrap();
        assert_eq!(report.outcome.map(|o| o.result), Some(GameResult::Checkmate));
    }

    #[test]
    fn test_forfeit_credits_remaining_player() {
        let mut session = active_session(Color::White);
        let outcome = session.forfeit(HOST).unwrap();

        assert_eq!(outcome.result, GameResult::OpponentDisconnected);
        assert_eq!(outcome.winner, Some(Color::Black));
        assert_eq!(session.status(), SessionStatus::Over);
        assert_eq!(session.outcome(), Some(outcome));
    }

    #[test]
    fn test_forfeit_waiting_game_has_no_outcome() {
        let mut session = GameSession::new(1, HOST, Color::White, 200);
        assert_eq!(session.forfeit(HOST), None);
        assert_eq!(session.status(), SessionStatus::Over);
        assert!(!session.is_open());
    }
}
