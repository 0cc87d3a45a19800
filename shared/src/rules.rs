//! Move legality for every piece kind
//!
//! Evaluation is pure: functions take a board snapshot and never mutate it.
//! Whether a move leaves the mover's own king attacked is not considered, and
//! capturing the enemy king is an ordinary legal capture. Pawn promotion is
//! applied by the caller after a legal move, not here.

use crate::board::{Board, Color, Piece, PieceKind, Square};
use std::collections::BTreeSet;

/// Returns true if `mover` may move the piece on `from` to `to`
pub fn is_legal_move(board: &Board, from: Square, to: Square, mover: Color) -> bool {
    let piece = match board.get(from) {
        Some(piece) => piece,
        None => return false,
    };

    if piece.color != mover {
        return false;
    }

    // Also rejects from == to, since the source holds a friendly piece
    if let Some(target) = board.get(to) {
        if target.color == mover {
            return false;
        }
    }

    match piece.kind {
        PieceKind::Pawn => is_pawn_move(board, piece, from, to),
        PieceKind::Rook => is_rook_move(board, from, to),
        PieceKind::Knight => is_knight_move(from, to),
        PieceKind::Bishop => is_bishop_move(board, from, to),
        PieceKind::Queen => is_rook_move(board, from, to) || is_bishop_move(board, from, to),
        PieceKind::King => is_king_move(from, to),
    }
}

/// Every square the piece on `square` may legally move to
///
/// Returns an empty set when the square is empty.
pub fn legal_destinations(board: &Board, square: Square) -> BTreeSet<Square> {
    let color = match board.get(square) {
        Some(piece) => piece.color,
        None => return BTreeSet::new(),
    };

    Square::all()
        .filter(|&to| is_legal_move(board, square, to, color))
        .collect()
}

fn deltas(from: Square, to: Square) -> (i8, i8) {
    (
        to.row() as i8 - from.row() as i8,
        to.col() as i8 - from.col() as i8,
    )
}

fn is_pawn_move(board: &Board, pawn: Piece, from: Square, to: Square) -> bool {
    let forward = pawn.color.forward();
    let (d_row, d_col) = deltas(from, to);

    if d_col == 0 {
        if d_row == forward {
            return board.is_empty_at(to);
        }

        if d_row == 2 * forward && from.row() == pawn.color.pawn_start_row() {
            return match from.offset(forward, 0) {
                Some(middle) => board.is_empty_at(middle) && board.is_empty_at(to),
                None => false,
            };
        }

        return false;
    }

    // Diagonal steps are captures only; friendly targets were rejected earlier
    d_col.abs() == 1 && d_row == forward && !board.is_empty_at(to)
}

fn is_rook_move(board: &Board, from: Square, to: Square) -> bool {
    let (d_row, d_col) = deltas(from, to);
    if (d_row == 0) == (d_col == 0) {
        return false;
    }
    is_path_clear(board, from, to)
}

fn is_bishop_move(board: &Board, from: Square, to: Square) -> bool {
    let (d_row, d_col) = deltas(from, to);
    if d_row == 0 || d_row.abs() != d_col.abs() {
        return false;
    }
    is_path_clear(board, from, to)
}

fn is_knight_move(from: Square, to: Square) -> bool {
    let (d_row, d_col) = deltas(from, to);
    matches!((d_row.abs(), d_col.abs()), (2, 1) | (1, 2))
}

fn is_king_move(from: Square, to: Square) -> bool {
    let (d_row, d_col) = deltas(from, to);
    d_row.abs().max(d_col.abs()) == 1
}

/// Checks that every cell strictly between `from` and `to` is empty
///
/// Callers guarantee the two squares share a row, column or diagonal.
fn is_path_clear(board: &Board, from: Square, to: Square) -> bool {
    let (d_row, d_col) = deltas(from, to);
    let step = (d_row.signum(), d_col.signum());

    let mut current = from;
    loop {
        current = match current.offset(step.0, step.1) {
            Some(next) => next,
            None => return false,
        };
        if current == to {
            return true;
        }
        if !board.is_empty_at(current) {
            return false;
        }
    }
}
