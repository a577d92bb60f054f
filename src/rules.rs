use std::ops::{Deref, DerefMut};

use arrayvec::ArrayVec;

/// Legal move counts in chess top out well below this.
pub type MoveList<M> = ArrayVec<M, 256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }

    pub fn to_index(self) -> usize {
        match self {
            Side::First => 0,
            Side::Second => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Occupant {
    pub kind: PieceKind,
    pub owner: Side,
}

/// 8x8 snapshot of the board, indexed `rank * 8 + file`.
/// Rank 0 is the first player's back rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardGrid {
    squares: [Option<Occupant>; 64],
}

impl Default for BoardGrid {
    fn default() -> Self {
        Self { squares: [None; 64] }
    }
}

impl BoardGrid {
    pub fn get(&self, file: usize, rank: usize) -> Option<Occupant> {
        self.squares[rank * 8 + file]
    }

    pub fn set(&mut self, file: usize, rank: usize, occupant: Option<Occupant>) {
        self.squares[rank * 8 + file] = occupant;
    }

    /// Occupied squares as `(square index, occupant)`.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, Occupant)> + '_ {
        self.squares
            .iter()
            .enumerate()
            .filter_map(|(sq, occ)| occ.map(|o| (sq, o)))
    }

    pub fn find(&self, kind: PieceKind, owner: Side) -> Option<usize> {
        self.occupied()
            .find(|(_, o)| o.kind == kind && o.owner == owner)
            .map(|(sq, _)| sq)
    }

    /// Mirror ranks and swap owners: the same position seen from the other side.
    pub fn flipped(&self) -> Self {
        let mut out = Self::default();
        for (sq, occ) in self.occupied() {
            out.set(
                file_of(sq),
                7 - rank_of(sq),
                Some(Occupant {
                    kind: occ.kind,
                    owner: occ.owner.opponent(),
                }),
            );
        }
        out
    }
}

pub fn file_of(sq: usize) -> usize {
    sq % 8
}

pub fn rank_of(sq: usize) -> usize {
    sq / 8
}

/// Canonical identity of a position (side to move, castling and en passant included).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PositionKey(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveFilter {
    All,
    Captures,
}

/// Everything the search needs from a rules engine. The engine owns one live
/// position; `apply`/`unapply` must be strictly nested.
pub trait Rules {
    type Move: Clone + PartialEq;

    fn apply(&mut self, mv: &Self::Move);
    fn unapply(&mut self);

    fn legal_moves(&self, filter: MoveFilter) -> MoveList<Self::Move>;
    fn position_key(&self) -> PositionKey;

    fn is_game_over(&self) -> bool;
    fn is_checkmate(&self) -> bool;
    /// Any drawn terminal state, repetition included.
    fn is_draw(&self) -> bool;
    fn is_threefold_repetition(&self) -> bool;

    fn side_to_move(&self) -> Side;
    fn board_squares(&self) -> BoardGrid;

    fn notation(&self, mv: &Self::Move) -> String;
    fn is_capture(&self, mv: &Self::Move) -> bool;
    fn is_promotion(&self, mv: &Self::Move) -> bool;
    fn gives_check(&self, mv: &Self::Move) -> bool;
}

/// A move applied for the lifetime of the guard. Derefs to the rules engine so
/// the child position can be searched; unapplies on drop, whatever the exit path.
pub struct MoveScope<'a, R: Rules> {
    rules: &'a mut R,
}

impl<'a, R: Rules> MoveScope<'a, R> {
    pub fn enter(rules: &'a mut R, mv: &R::Move) -> Self {
        rules.apply(mv);
        Self { rules }
    }
}

impl<R: Rules> Deref for MoveScope<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.rules
    }
}

impl<R: Rules> DerefMut for MoveScope<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.rules
    }
}

impl<R: Rules> Drop for MoveScope<'_, R> {
    fn drop(&mut self) {
        self.rules.unapply();
    }
}
