use std::cmp::Reverse;

use arrayvec::ArrayVec;

use crate::rules::{MoveFilter, MoveList, Rules};
use crate::types::ActiveMoves;

pub struct ScoredMove<M> {
    pub mv: M,
    pub score: usize,
}

/// Longest notation first: captures, promotions and checks write longer than
/// quiet moves. Stable, so ties keep the rules engine's order.
fn by_impact<R: Rules>(rules: &R, moves: MoveList<R::Move>) -> MoveList<R::Move> {
    let mut scored: ArrayVec<ScoredMove<R::Move>, 256> = moves
        .into_iter()
        .map(|mv| ScoredMove {
            score: rules.notation(&mv).len(),
            mv,
        })
        .collect();

    scored.sort_by_key(|s| Reverse(s.score));
    scored.into_iter().map(|s| s.mv).collect()
}

/// All legal moves, ordered for alpha-beta.
pub fn order_moves<R: Rules>(rules: &R) -> MoveList<R::Move> {
    by_impact(rules, rules.legal_moves(MoveFilter::All))
}

pub fn is_active<R: Rules>(rules: &R, mv: &R::Move, set: ActiveMoves) -> bool {
    match set {
        ActiveMoves::Captures => rules.is_capture(mv),
        ActiveMoves::Tactical => {
            rules.is_capture(mv) || rules.is_promotion(mv) || rules.gives_check(mv)
        }
    }
}

/// The quiescence frontier, in the same order as `order_moves`.
pub fn order_active<R: Rules>(rules: &R, set: ActiveMoves) -> MoveList<R::Move> {
    let moves = match set {
        ActiveMoves::Captures => rules.legal_moves(MoveFilter::Captures),
        ActiveMoves::Tactical => rules
            .legal_moves(MoveFilter::All)
            .into_iter()
            .filter(|mv| is_active(rules, mv, set))
            .collect(),
    };
    by_impact(rules, moves)
}
