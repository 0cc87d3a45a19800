//! Board model shared by the server and clients

use std::fmt;

pub const BOARD_SIZE: u8 = 8;

/// Row of white's back rank. White pawns advance toward row 0.
pub const WHITE_BACK_RANK: u8 = 7;
/// Row of black's back rank. Black pawns advance toward row 7.
pub const BLACK_BACK_RANK: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Row delta of a single pawn step for this side
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    pub fn pawn_start_row(self) -> u8 {
        match self {
            Color::White => WHITE_BACK_RANK - 1,
            Color::Black => BLACK_BACK_RANK + 1,
        }
    }

    /// Row on which this side's pawns promote
    pub fn promotion_row(self) -> u8 {
        match self {
            Color::White => BLACK_BACK_RANK,
            Color::Black => WHITE_BACK_RANK,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }
}

/// A piece on the board
///
/// The one-letter text form (`P N B R Q K`, uppercase white, lowercase black)
/// is only used at the edges for display; game logic works on the tagged value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    pub const fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }

    pub fn to_char(self) -> char {
        let letter = self.kind.letter();
        match self.color {
            Color::White => letter,
            Color::Black => letter.to_ascii_lowercase(),
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        let kind = match c.to_ascii_uppercase() {
            'P' => PieceKind::Pawn,
            'N' => PieceKind::Knight,
            'B' => PieceKind::Bishop,
            'R' => PieceKind::Rook,
            'Q' => PieceKind::Queen,
            'K' => PieceKind::King,
            _ => return None,
        };
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Self { kind, color })
    }
}

/// A cell coordinate that is always on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square {
    row: u8,
    col: u8,
}

impl Square {
    pub fn new(row: u8, col: u8) -> Option<Self> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(Self { row, col })
        } else {
            None
        }
    }

    pub fn row(self) -> u8 {
        self.row
    }

    pub fn col(self) -> u8 {
        self.col
    }

    /// Returns the square displaced by the given deltas, if it stays on the board
    pub fn offset(self, d_row: i8, d_col: i8) -> Option<Self> {
        let row = self.row as i8 + d_row;
        let col = self.col as i8 + d_col;
        if row < 0 || col < 0 {
            return None;
        }
        Self::new(row as u8, col as u8)
    }

    /// Iterates every square row by row
    pub fn all() -> impl Iterator<Item = Square> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Square { row, col }))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// 8x8 grid of optional pieces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<Piece>; BOARD_SIZE as usize]; BOARD_SIZE as usize],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: [[None; BOARD_SIZE as usize]; BOARD_SIZE as usize],
        }
    }

    /// Standard starting position
    pub fn initial() -> Self {
        let mut board = Self::empty();
        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];

        for (col, kind) in back_rank.into_iter().enumerate() {
            board.cells[BLACK_BACK_RANK as usize][col] = Some(Piece::new(kind, Color::Black));
            board.cells[WHITE_BACK_RANK as usize][col] = Some(Piece::new(kind, Color::White));
            board.cells[Color::Black.pawn_start_row() as usize][col] =
                Some(Piece::new(PieceKind::Pawn, Color::Black));
            board.cells[Color::White.pawn_start_row() as usize][col] =
                Some(Piece::new(PieceKind::Pawn, Color::White));
        }

        board
    }

    pub fn get(&self, square: Square) -> Option<Piece> {
        self.cells[square.row as usize][square.col as usize]
    }

    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        self.cells[square.row as usize][square.col as usize] = piece;
    }

    pub fn is_empty_at(&self, square: Square) -> bool {
        self.get(square).is_none()
    }

    pub fn has_king(&self, color: Color) -> bool {
        let king = Piece::new(PieceKind::King, color);
        Square::all().any(|square| self.get(square) == Some(king))
    }

    /// One string per row, `.` for empty cells
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map_or('.', Piece::to_char))
                    .collect()
            })
            .collect()
    }

    /// Parses the format produced by [`Board::rows`]
    pub fn from_rows(rows: &[&str]) -> Option<Self> {
        if rows.len() != BOARD_SIZE as usize {
            return None;
        }

        let mut board = Self::empty();
        for (row, line) in rows.iter().enumerate() {
            let chars: Vec<char> = line.chars().collect();
            if chars.len() != BOARD_SIZE as usize {
                return None;
            }
            for (col, c) in chars.into_iter().enumerate() {
                board.cells[row][col] = match c {
                    '.' => None,
                    other => Some(Piece::from_char(other)?),
                };
            }
        }
        Some(board)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  01234567")?;
        for (row, line) in self.rows().iter().enumerate() {
            writeln!(f, "{} {}", row, line)?;
        }
        Ok(())
    }
}
