use std::fmt;

use shakmaty::fen::Fen;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role};
use thiserror::Error;

use crate::rules::{BoardGrid, MoveFilter, MoveList, Occupant, PieceKind, PositionKey, Rules, Side};

#[derive(Debug, Error)]
pub enum GameError {
    #[error("invalid FEN {fen:?}: {reason}")]
    InvalidFen { fen: String, reason: String },
    #[error("illegal position {fen:?}: {reason}")]
    IllegalPosition { fen: String, reason: String },
    #[error("illegal move {0:?}")]
    IllegalMove(String),
}

/// Standard chess on top of `shakmaty`. Copy-make: `apply` keeps the previous
/// position on a stack and `unapply` restores it. Keys of every position since
/// the root are kept for repetition detection.
#[derive(Clone, Debug)]
pub struct ChessGame {
    current: Chess,
    key: u64,
    history: Vec<(Chess, u64)>,
}

impl Default for ChessGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ChessGame {
    pub fn new() -> Self {
        Self::from_position(Chess::default())
    }

    pub fn from_position(pos: Chess) -> Self {
        let key = zobrist(&pos);
        Self {
            current: pos,
            key,
            history: Vec::new(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let parsed: Fen = fen.trim().parse().map_err(|e| GameError::InvalidFen {
            fen: fen.to_string(),
            reason: format!("{}", e),
        })?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| GameError::IllegalPosition {
                fen: fen.to_string(),
                reason: format!("{}", e),
            })?;
        Ok(Self::from_position(pos))
    }

    pub fn position(&self) -> &Chess {
        &self.current
    }

    /// Number of plies applied since the root position.
    pub fn ply(&self) -> usize {
        self.history.len()
    }

    /// Finds the legal move written in UCI coordinates (`e2e4`, `e7e8q`, `e1g1`).
    pub fn find_uci(&self, text: &str) -> Option<Move> {
        self.current
            .legal_moves()
            .into_iter()
            .find(|m| uci(m) == text)
    }

    /// Plays a move permanently (it becomes part of the repetition history).
    pub fn play_uci(&mut self, text: &str) -> Result<(), GameError> {
        let mv = self
            .find_uci(text)
            .ok_or_else(|| GameError::IllegalMove(text.to_string()))?;
        self.apply(&mv);
        Ok(())
    }

    fn after(&self, mv: &Move) -> Chess {
        let mut pos = self.current.clone();
        pos.play_unchecked(mv);
        pos
    }
}

const CLOCK_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

fn zobrist(pos: &Chess) -> u64 {
    pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}

fn kind_of(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}

fn side_of(color: Color) -> Side {
    match color {
        Color::White => Side::First,
        Color::Black => Side::Second,
    }
}

fn role_char(role: Role) -> char {
    match role {
        Role::Pawn => 'p',
        Role::Knight => 'n',
        Role::Bishop => 'b',
        Role::Rook => 'r',
        Role::Queen => 'q',
        Role::King => 'k',
    }
}

fn kingside(mv: &Move) -> Option<bool> {
    match mv {
        Move::Castle { king, rook } => Some(rook.file() as u8 > king.file() as u8),
        _ => None,
    }
}

/// UCI coordinate text. Castling is written king-to-destination (`e1g1`).
pub fn uci(mv: &Move) -> String {
    let Some(from) = mv.from() else {
        return String::from("0000");
    };
    let to = match kingside(mv) {
        Some(true) => format!("g{}", from.rank() as u8 + 1),
        Some(false) => format!("c{}", from.rank() as u8 + 1),
        None => mv.to().to_string(),
    };
    let mut text = format!("{}{}", from, to);
    if let Some(promo) = mv.promotion() {
        text.push(role_char(promo));
    }
    text
}

impl Rules for ChessGame {
    type Move = Move;

    fn apply(&mut self, mv: &Move) {
        let next = self.after(mv);
        let key = zobrist(&next);
        let prev = std::mem::replace(&mut self.current, next);
        self.history.push((prev, self.key));
        self.key = key;
    }

    fn unapply(&mut self) {
        if let Some((prev, key)) = self.history.pop() {
            self.current = prev;
            self.key = key;
        }
    }

    fn legal_moves(&self, filter: MoveFilter) -> MoveList<Move> {
        self.current
            .legal_moves()
            .into_iter()
            .filter(|m| filter == MoveFilter::All || m.is_capture())
            .collect()
    }

    /// Zobrist key with the halfmove clock folded in: the same placement can be a
    /// fifty-move draw at one clock and not at another. Repetition uses the bare key.
    fn position_key(&self) -> PositionKey {
        let clock = u64::from(self.current.halfmoves()) + 1;
        PositionKey(self.key ^ clock.wrapping_mul(CLOCK_MIX))
    }

    fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }

    fn is_checkmate(&self) -> bool {
        self.current.is_checkmate()
    }

    fn is_draw(&self) -> bool {
        if self.current.is_stalemate() || self.current.is_insufficient_material() {
            return true;
        }
        if self.is_threefold_repetition() {
            return true;
        }
        self.current.halfmoves() >= 100 && !self.current.is_checkmate()
    }

    fn is_threefold_repetition(&self) -> bool {
        let earlier = self.history.iter().filter(|(_, k)| *k == self.key).count();
        earlier >= 2
    }

    fn side_to_move(&self) -> Side {
        side_of(self.current.turn())
    }

    fn board_squares(&self) -> BoardGrid {
        let board = self.current.board();
        let mut grid = BoardGrid::default();
        for sq in board.occupied() {
            if let Some(piece) = board.piece_at(sq) {
                grid.set(
                    sq.file() as usize,
                    sq.rank() as usize,
                    Some(Occupant {
                        kind: kind_of(piece.role),
                        owner: side_of(piece.color),
                    }),
                );
            }
        }
        grid
    }

    /// Short algebraic text without disambiguation. Good enough to rank moves
    /// by how much they change.
    fn notation(&self, mv: &Move) -> String {
        let mut text = String::new();
        match kingside(mv) {
            Some(true) => text.push_str("O-O"),
            Some(false) => text.push_str("O-O-O"),
            None => {
                let role = mv.role();
                if role != Role::Pawn {
                    text.push(role_char(role).to_ascii_uppercase());
                }
                if mv.is_capture() {
                    if role == Role::Pawn
                        && let Some(from) = mv.from()
                    {
                        text.push((b'a' + from.file() as u8) as char);
                    }
                    text.push('x');
                }
                text.push_str(&mv.to().to_string());
                if let Some(promo) = mv.promotion() {
                    text.push('=');
                    text.push(role_char(promo).to_ascii_uppercase());
                }
            }
        }

        let after = self.after(mv);
        if after.is_checkmate() {
            text.push('#');
        } else if after.is_check() {
            text.push('+');
        }
        text
    }

    fn is_capture(&self, mv: &Move) -> bool {
        mv.is_capture()
    }

    fn is_promotion(&self, mv: &Move) -> bool {
        mv.is_promotion()
    }

    fn gives_check(&self, mv: &Move) -> bool {
        self.after(mv).is_check()
    }
}

impl fmt::Display for ChessGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grid = self.board_squares();
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                let c = match grid.get(file, rank) {
                    Some(occ) => {
                        let c = match occ.kind {
                            PieceKind::Pawn => 'p',
                            PieceKind::Knight => 'n',
                            PieceKind::Bishop => 'b',
                            PieceKind::Rook => 'r',
                            PieceKind::Queen => 'q',
                            PieceKind::King => 'k',
                        };
                        if occ.owner == Side::First { c.to_ascii_uppercase() } else { c }
                    }
                    None => '.',
                };
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")?;
        write!(
            f,
            "{} to move, key {:016x}",
            if self.side_to_move() == Side::First { "white" } else { "black" },
            self.key
        )
    }
}
