//! Terminal client for poking at a running chess server
//!
//! Reads commands from stdin, prints every packet the server sends and keeps
//! a local copy of the board so it can show legal destinations.

use clap::Parser;
use shared::protocol::LINE_DELIMITER;
use shared::{
    decode_server_line, encode_line, is_legal_move, legal_destinations, Board, ClientPacket,
    Color, GameId, MoveData, Piece, PieceKind, ServerPacket, Square,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to connect to
    #[clap(short, long, default_value = "127.0.0.1:5006")]
    server: String,
    /// Display name sent when joining the lobby
    #[clap(short, long)]
    name: Option<String>,
}

/// What the client knows about its current game
struct LocalGame {
    id: Option<GameId>,
    color: Option<Color>,
    turn: Color,
    board: Board,
}

impl LocalGame {
    fn new() -> Self {
        Self {
            id: None,
            color: None,
            turn: Color::White,
            board: Board::initial(),
        }
    }

    fn start(&mut self, id: GameId, is_white: bool) {
        self.id = Some(id);
        self.color = Some(if is_white { Color::White } else { Color::Black });
        self.turn = Color::White;
        self.board = Board::initial();
    }

    fn reset(&mut self) {
        *self = LocalGame::new();
    }

    fn apply(&mut self, from: Square, to: Square) {
        if let Some(piece) = self.board.get(from) {
            let placed = if piece.kind == PieceKind::Pawn && to.row() == piece.color.promotion_row()
            {
                Piece::new(PieceKind::Queen, piece.color)
            } else {
                piece
            };
            self.board.set(from, None);
            self.board.set(to, Some(placed));
            self.turn = self.turn.opposite();
        }
    }

    /// Checks a move of our own against the local board and applies it
    ///
    /// Nothing changes when the move is refused, so the board keeps matching
    /// the server's.
    fn play(&mut self, from: Square, to: Square) -> Result<ClientPacket, &'static str> {
        let (game_id, color) = match (self.id, self.color) {
            (Some(id), Some(color)) => (id, color),
            _ => return Err("Not in a game"),
        };
        if color != self.turn {
            return Err("Not your turn");
        }
        if !is_legal_move(&self.board, from, to, color) {
            return Err("Illegal move");
        }

        self.apply(from, to);
        Ok(ClientPacket::Move {
            game_id,
            mv: MoveData::new(from, to),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);
    let (read_half, mut writer) = stream.into_split();

    let game = Arc::new(Mutex::new(LocalGame::new()));

    send(&mut writer, &ClientPacket::JoinLobby { name: args.name }).await?;

    let receiver = {
        let game = Arc::clone(&game);
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).split(LINE_DELIMITER);
            loop {
                match lines.next_segment().await {
                    Ok(Some(line)) => match decode_server_line(&line) {
                        Ok(packet) => on_packet(&game, packet).await,
                        Err(e) => println!("Unreadable packet: {}", e),
                    },
                    Ok(None) => {
                        println!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        println!("Connection error: {}", e);
                        break;
                    }
                }
            }
        })
    };

    print_help();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        let packet = match words.as_slice() {
            [] => continue,
            ["quit"] => break,
            ["list"] => Some(ClientPacket::GetGames {}),
            ["create"] => Some(ClientPacket::CreateGame { name: None }),
            ["join", id] => match id.parse() {
                Ok(game_id) => Some(ClientPacket::JoinGame {
                    game_id,
                    name: None,
                }),
                Err(_) => {
                    println!("Not a game id: {}", id);
                    None
                }
            },
            ["move", fr, fc, tr, tc] => local_move(&game, [fr, fc, tr, tc]).await,
            ["hints", r, c] => {
                show_hints(&game, r, c).await;
                None
            }
            ["board"] => {
                print!("{}", game.lock().await.board);
                None
            }
            _ => {
                print_help();
                None
            }
        };

        if let Some(packet) = packet {
            send(&mut writer, &packet).await?;
        }
    }

    receiver.abort();
    Ok(())
}

async fn send(
    writer: &mut OwnedWriteHalf,
    packet: &ClientPacket,
) -> Result<(), Box<dyn std::error::Error>> {
    writer.write_all(&encode_line(packet)?).await?;
    Ok(())
}

async fn on_packet(game: &Mutex<LocalGame>, packet: ServerPacket) {
    let mut game = game.lock().await;
    match &packet {
        ServerPacket::GameCreated { game_id, is_white }
        | ServerPacket::GameJoined {
            game_id, is_white, ..
        } => {
            game.start(*game_id, *is_white);
        }
        ServerPacket::Move { mv } => {
            if let Some((from, to)) = mv.squares() {
                game.apply(from, to);
            }
        }
        ServerPacket::GameOver { .. } => game.reset(),
        _ => {}
    }

    println!("<- {:?}", packet);
    if matches!(packet, ServerPacket::Move { .. }) {
        print!("{}", game.board);
    }
}

/// Parses a move command and plays it on the local board
async fn local_move(game: &Mutex<LocalGame>, coords: [&&str; 4]) -> Option<ClientPacket> {
    let mut parsed = [0u8; 4];
    for (slot, text) in parsed.iter_mut().zip(coords) {
        match text.parse() {
            Ok(value) => *slot = value,
            Err(_) => {
                println!("Not a coordinate: {}", text);
                return None;
            }
        }
    }

    let (from, to) = match (
        Square::new(parsed[0], parsed[1]),
        Square::new(parsed[2], parsed[3]),
    ) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            println!("Coordinates must be between 0 and 7");
            return None;
        }
    };

    match game.lock().await.play(from, to) {
        Ok(packet) => Some(packet),
        Err(reason) => {
            println!("{}", reason);
            None
        }
    }
}

async fn show_hints(game: &Mutex<LocalGame>, row: &str, col: &str) {
    let square = match (row.parse(), col.parse()) {
        (Ok(row), Ok(col)) => Square::new(row, col),
        _ => None,
    };
    let square = match square {
        Some(square) => square,
        None => {
            println!("Coordinates must be between 0 and 7");
            return;
        }
    };

    let game = game.lock().await;
    if let (Some(piece), Some(color)) = (game.board.get(square), game.color) {
        if piece.color != color {
            println!("That is not your piece");
            return;
        }
    }

    let targets: Vec<String> = legal_destinations(&game.board, square)
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    if targets.is_empty() {
        println!("No legal moves from {}", square);
    } else {
        println!("Legal moves from {}: {}", square, targets.join(" "));
    }
}

fn print_help() {
    println!("Commands:");
    println!("  list                      show open games");
    println!("  create                    host a new game");
    println!("  join <id>                 join an open game");
    println!("  move <fr> <fc> <tr> <tc>  move a piece (rows and columns 0-7)");
    println!("  hints <r> <c>             legal destinations for a piece");
    println!("  board                     print the local board");
    println!("  quit                      disconnect");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(row: u8, col: u8) -> Square {
        Square::new(row, col).unwrap()
    }

    #[test]
    fn test_refused_move_leaves_board_alone() {
        let mut game = LocalGame::new();
        game.start(3, true);

        assert_eq!(game.play(sq(6, 4), sq(3, 4)), Err("Illegal move"));
        assert_eq!(game.play(sq(1, 4), sq(3, 4)), Err("Illegal move"));
        assert_eq!(game.board, Board::initial());
        assert_eq!(game.turn, Color::White);

        let packet = game.play(sq(6, 4), sq(4, 4)).unwrap();
        assert_eq!(
            packet,
            ClientPacket::Move {
                game_id: 3,
                mv: MoveData::new(sq(6, 4), sq(4, 4)),
            }
        );
        assert!(game.board.is_empty_at(sq(6, 4)));

        // Black to move now
        let before = game.board.clone();
        assert_eq!(game.play(sq(6, 3), sq(4, 3)), Err("Not your turn"));
        assert_eq!(game.board, before);
    }

    #[test]
    fn test_opponent_move_hands_turn_back() {
        let mut game = LocalGame::new();
        game.start(1, false);
        assert_eq!(game.play(sq(1, 4), sq(3, 4)), Err("Not your turn"));

        game.apply(sq(6, 4), sq(4, 4));
        assert!(game.play(sq(1, 4), sq(3, 4)).is_ok());
    }

    #[test]
    fn test_move_outside_game_refused() {
        let mut game = LocalGame::new();
        assert_eq!(game.play(sq(6, 4), sq(4, 4)), Err("Not in a game"));
    }
}
