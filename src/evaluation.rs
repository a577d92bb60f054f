use std::ops::RangeInclusive;

use crate::pst::{self, EG_PIECE_VALUE, EG_TABLE, MG_PIECE_VALUE, MG_TABLE, PHASE_WEIGHT, TOTAL_PHASE};
use crate::rules::{file_of, rank_of, BoardGrid, Occupant, PieceKind, Rules, Side};
use crate::types::{Score, SCORE_MATE};

pub const PASSED_PAWN_BONUS: Score = 25;
pub const ISOLATED_PAWN_PENALTY: Score = 20;

/// A side with this many pieces or fewer (king included) puts the game in mop-up territory.
pub const ENDGAME_PIECE_LIMIT: usize = 5;
pub const MOPUP_MIN_ADVANTAGE: Score = 200;
pub const MOPUP_CENTER_WEIGHT: Score = 10;
pub const MOPUP_PROXIMITY_WEIGHT: Score = 4;

fn piece_index(kind: PieceKind) -> usize {
    match kind {
        PieceKind::Pawn => pst::PAWN,
        PieceKind::Knight => pst::KNIGHT,
        PieceKind::Bishop => pst::BISHOP,
        PieceKind::Rook => pst::ROOK,
        PieceKind::Queen => pst::QUEEN,
        PieceKind::King => pst::KING,
    }
}

/// Grid squares run a1=0..h8=63, tables a8=0..h1=63.
/// First player flips the rank; second player reads the table as-is, which mirrors it.
fn pst_index(sq: usize, owner: Side) -> usize {
    match owner {
        Side::First => sq ^ 56,
        Side::Second => sq,
    }
}

/// Static score of the live position, from the side to move, in centipawns.
/// A checkmated side to move scores exactly `-SCORE_MATE`; drawn positions score 0.
pub fn evaluate<R: Rules>(rules: &R) -> Score {
    if rules.is_draw() || rules.is_threefold_repetition() {
        return 0;
    }
    if rules.is_checkmate() {
        return -SCORE_MATE;
    }
    evaluate_board(&rules.board_squares(), rules.side_to_move())
}

/// Tapered material + piece-square score with pawn-structure and mop-up terms,
/// from `side`'s point of view. Ignores game-over status.
pub fn evaluate_board(grid: &BoardGrid, side: Side) -> Score {
    let mut mg_score: [Score; 2] = [0, 0]; // [first, second]
    let mut eg_score: [Score; 2] = [0, 0];
    let mut material: [Score; 2] = [0, 0];
    let mut pieces: [usize; 2] = [0, 0];
    let mut phase: i32 = 0;

    for (sq, occ) in grid.occupied() {
        let idx = piece_index(occ.kind);
        let s = occ.owner.to_index();
        let t = pst_index(sq, occ.owner);

        mg_score[s] += MG_PIECE_VALUE[idx] + MG_TABLE[idx][t];
        eg_score[s] += EG_PIECE_VALUE[idx] + EG_TABLE[idx][t];
        material[s] += MG_PIECE_VALUE[idx];
        pieces[s] += 1;
        phase += PHASE_WEIGHT[idx];
    }

    // Promotions can push the raw sum past a full board
    let phase = phase.clamp(0, TOTAL_PHASE);

    let mg = mg_score[0] - mg_score[1];
    let eg = eg_score[0] - eg_score[1];
    let mut score = (mg * phase + eg * (TOTAL_PHASE - phase)) / TOTAL_PHASE;

    score += pawn_structure(grid);

    if pieces[0] <= ENDGAME_PIECE_LIMIT || pieces[1] <= ENDGAME_PIECE_LIMIT {
        score += mop_up(grid, material[0] - material[1]);
    }

    match side {
        Side::First => score,
        Side::Second => -score,
    }
}

fn adjacent_files(file: usize) -> RangeInclusive<usize> {
    file.saturating_sub(1)..=(file + 1).min(7)
}

fn is_pawn_of(occ: Option<Occupant>, owner: Side) -> bool {
    matches!(occ, Some(o) if o.kind == PieceKind::Pawn && o.owner == owner)
}

/// No enemy pawn ahead on the pawn's file or either neighbour.
pub fn is_passed(grid: &BoardGrid, file: usize, rank: usize, owner: Side) -> bool {
    let ahead = match owner {
        Side::First => (rank + 1)..8,
        Side::Second => 0..rank,
    };
    let enemy = owner.opponent();
    adjacent_files(file).all(|f| ahead.clone().all(|r| !is_pawn_of(grid.get(f, r), enemy)))
}

/// No friendly pawn anywhere on a neighbouring file.
pub fn is_isolated(grid: &BoardGrid, file: usize, owner: Side) -> bool {
    adjacent_files(file)
        .filter(|&f| f != file)
        .all(|f| (0..8).all(|r| !is_pawn_of(grid.get(f, r), owner)))
}

/// Passed/isolated pawn terms for both sides, relative to the first player.
fn pawn_structure(grid: &BoardGrid) -> Score {
    let mut score = 0;
    for (sq, occ) in grid.occupied() {
        if occ.kind != PieceKind::Pawn {
            continue;
        }
        let (file, rank) = (file_of(sq), rank_of(sq));
        let mut term = 0;
        if is_passed(grid, file, rank, occ.owner) {
            term += PASSED_PAWN_BONUS;
        }
        if is_isolated(grid, file, occ.owner) {
            term -= ISOLATED_PAWN_PENALTY;
        }
        score += match occ.owner {
            Side::First => term,
            Side::Second => -term,
        };
    }
    score
}

/// Manhattan distance to the nearest of the four centre squares (0..=6).
pub fn center_distance(sq: usize) -> Score {
    let f = file_of(sq) as Score;
    let r = rank_of(sq) as Score;
    (3 - f).max(f - 4) + (3 - r).max(r - 4)
}

pub fn manhattan_distance(a: usize, b: usize) -> Score {
    let df = file_of(a) as Score - file_of(b) as Score;
    let dr = rank_of(a) as Score - rank_of(b) as Score;
    df.abs() + dr.abs()
}

/// Credits the side ahead on material for pushing the other king to the rim
/// and walking its own king towards it. Relative to the first player.
fn mop_up(grid: &BoardGrid, material_diff: Score) -> Score {
    if material_diff.abs() < MOPUP_MIN_ADVANTAGE {
        return 0;
    }
    let winner = if material_diff > 0 { Side::First } else { Side::Second };
    let (Some(strong_king), Some(weak_king)) = (
        grid.find(PieceKind::King, winner),
        grid.find(PieceKind::King, winner.opponent()),
    ) else {
        return 0;
    };

    let bonus = MOPUP_CENTER_WEIGHT * center_distance(weak_king)
        + MOPUP_PROXIMITY_WEIGHT * (14 - manhattan_distance(strong_king, weak_king));

    match winner {
        Side::First => bonus,
        Side::Second => -bonus,
    }
}
