use log::{debug, trace};

use crate::evaluation::evaluate;
use crate::movegen::{order_active, order_moves};
use crate::rules::{MoveFilter, MoveScope, PositionKey, Rules};
use crate::time::Deadline;
use crate::tt::{Lookup, TranspositionTable};
use crate::types::{
    is_mate_score, Bound, EvaluationResult, Frontier, Score, SearchConfig, MAX_PLY, SCORE_INFINITY,
    SCORE_MATE,
};

/// Counters for the most recent search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub quiescence_nodes: u64,
    pub cache_hits: u64,
    pub timed_out: bool,
}

/// Mutable search state shared across recursion
struct SearchState<'a, M> {
    tt: &'a mut TranspositionTable<M>,
    config: &'a SearchConfig,
    deadline: Deadline,
    stats: SearchStats,
}

impl<M: Clone> SearchState<'_, M> {
    /// Latches once the budget runs out; every later node becomes a leaf.
    fn out_of_time(&mut self) -> bool {
        if !self.stats.timed_out && self.deadline.expired() {
            self.stats.timed_out = true;
        }
        self.stats.timed_out
    }

    /// Nothing searched after the budget expired is trusted enough to cache.
    fn store(&mut self, key: PositionKey, result: &EvaluationResult<M>, ply: usize) {
        if !self.stats.timed_out {
            self.tt.store(key, result.clone(), ply);
        }
    }
}

/// Owns the position cache across searches. One engine per game (or per test);
/// `clear` between games.
pub struct Engine<M> {
    tt: TranspositionTable<M>,
    stats: SearchStats,
}

impl<M: Clone> Default for Engine<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone> Engine<M> {
    pub fn new() -> Self {
        Self::with_table(TranspositionTable::new())
    }

    pub fn with_table(tt: TranspositionTable<M>) -> Self {
        Self {
            tt,
            stats: SearchStats::default(),
        }
    }

    pub fn table(&self) -> &TranspositionTable<M> {
        &self.tt
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.tt.clear();
    }

    /// Searches the live position of `rules` to `config.max_depth` plies.
    ///
    /// The returned move is present whenever the position has a legal move and
    /// the depth is at least 1: the root is always expanded, even when the time
    /// budget is already spent. `rules` is left exactly as it was given.
    pub fn best_move<R: Rules<Move = M>>(
        &mut self,
        rules: &mut R,
        config: &SearchConfig,
    ) -> EvaluationResult<M> {
        let mut state = SearchState {
            tt: &mut self.tt,
            config,
            deadline: Deadline::from_secs(config.time_limit_secs),
            stats: SearchStats::default(),
        };

        let result = negamax(
            rules,
            &mut state,
            config.max_depth,
            0,
            -SCORE_INFINITY,
            SCORE_INFINITY,
        );

        debug!(
            "depth {} {} ({:+.2}) nodes {} qnodes {} cache hits {} cached {} time {}ms{}",
            config.max_depth,
            format_score(result.score),
            result.pawns(),
            state.stats.nodes,
            state.stats.quiescence_nodes,
            state.stats.cache_hits,
            state.tt.len(),
            state.deadline.elapsed_ms(),
            if state.stats.timed_out { " (timed out)" } else { "" }
        );

        self.stats = state.stats;
        result
    }
}

/// Static score at `ply`, with checkmate pulled towards the root so that
/// shorter mates win out.
fn leaf_score<R: Rules>(rules: &R, ply: usize) -> Score {
    let score = evaluate(rules);
    if score == -SCORE_MATE {
        score + ply as Score
    } else {
        score
    }
}

fn classify(score: Score, alpha: Score, beta: Score) -> Bound {
    if score <= alpha {
        Bound::UpperBound
    } else if score >= beta {
        Bound::LowerBound
    } else {
        Bound::Exact
    }
}

/// Negamax with alpha-beta pruning and the position cache.
fn negamax<R: Rules>(
    rules: &mut R,
    state: &mut SearchState<'_, R::Move>,
    depth: u8,
    ply: usize,
    alpha: Score,
    beta: Score,
) -> EvaluationResult<R::Move> {
    state.stats.nodes += 1;
    let key = rules.position_key();

    let (mut alpha, beta) = match state.tt.lookup(key, depth, ply, alpha, beta) {
        // A moveless entry can't answer the root while moves remain
        Lookup::Cutoff(result) if ply > 0 || result.best_move.is_some() || depth == 0 => {
            state.stats.cache_hits += 1;
            return result;
        }
        Lookup::Cutoff(_) => (alpha, beta),
        Lookup::Search { alpha, beta } => (alpha, beta),
    };

    if ply > 0 && state.out_of_time() {
        // Approximate; never cached
        return EvaluationResult::leaf(leaf_score(rules, ply), 0, Bound::Exact);
    }

    if rules.is_game_over() {
        let result = EvaluationResult::leaf(leaf_score(rules, ply), depth, Bound::Exact);
        // Repetition draws depend on the path, not the position
        if !rules.is_threefold_repetition() {
            state.store(key, &result, ply);
        }
        return result;
    }

    if depth == 0 || ply >= MAX_PLY {
        let result = match state.config.frontier {
            Frontier::Static => EvaluationResult::leaf(leaf_score(rules, ply), 0, Bound::Exact),
            Frontier::Quiescence => {
                let score = quiescence(rules, state, ply, alpha, beta);
                EvaluationResult::leaf(score, 0, classify(score, alpha, beta))
            }
        };
        state.store(key, &result, ply);
        return result;
    }

    let moves = order_moves(rules);
    if moves.is_empty() {
        // Not game over yet nothing to play: the rules engine broke its contract
        return EvaluationResult::leaf(leaf_score(rules, ply), depth, Bound::Exact);
    }

    let window_alpha = alpha;
    let mut best_score = -SCORE_INFINITY;
    let mut best_move: Option<R::Move> = None;

    for mv in &moves {
        let score = {
            let mut child = MoveScope::enter(rules, mv);
            -negamax(&mut *child, state, depth - 1, ply + 1, -beta, -alpha).score
        };

        if score > best_score {
            best_score = score;
            best_move = Some(mv.clone());
        }

        if score > alpha {
            alpha = score;
        }

        // Beta cutoff
        if alpha >= beta {
            break;
        }
    }

    let result = EvaluationResult {
        score: best_score,
        best_move,
        depth,
        bound: classify(best_score, window_alpha, beta),
    };
    state.store(key, &result, ply);
    result
}

/// Quiescence search: plays active moves only, with standing pat always
/// allowed. Fail-hard, so the result lies in `[alpha, beta]` unless the ply
/// ceiling is hit.
fn quiescence<R: Rules>(
    rules: &mut R,
    state: &mut SearchState<'_, R::Move>,
    ply: usize,
    mut alpha: Score,
    beta: Score,
) -> Score {
    state.stats.quiescence_nodes += 1;

    let stand_pat = leaf_score(rules, ply);

    if ply >= MAX_PLY {
        trace!("quiescence ceiling reached at ply {}", ply);
        return stand_pat;
    }

    if stand_pat >= beta {
        return beta;
    }

    if stand_pat > alpha {
        alpha = stand_pat;
    }

    if rules.is_game_over() {
        return alpha;
    }

    let active = order_active(rules, state.config.active_moves);

    for mv in &active {
        let score = {
            let mut child = MoveScope::enter(rules, mv);
            -quiescence(&mut *child, state, ply + 1, -beta, -alpha)
        };

        if score >= beta {
            return beta;
        }
        if score > alpha {
            alpha = score;
        }
    }

    alpha
}

/// Follows cached best moves from the live position. `rules` is restored.
pub fn principal_variation<R: Rules>(
    rules: &mut R,
    tt: &TranspositionTable<R::Move>,
    max_moves: usize,
) -> Vec<R::Move> {
    let mut pv = Vec::new();
    let mut seen = Vec::new();

    for _ in 0..max_moves {
        let key = rules.position_key();
        if seen.contains(&key) {
            break;
        }
        seen.push(key);

        let Some(mv) = tt.probe(key).and_then(|entry| entry.best_move.clone()) else {
            break;
        };
        if !rules.legal_moves(MoveFilter::All).contains(&mv) {
            break;
        }
        rules.apply(&mv);
        pv.push(mv);
    }

    for _ in 0..pv.len() {
        rules.unapply();
    }
    pv
}

/// Format a score for UCI output (centipawns or mate-in-N).
pub fn format_score(score: Score) -> String {
    if is_mate_score(score) {
        let mate_ply = SCORE_MATE - score.abs();
        let mate_moves = (mate_ply + 1) / 2;
        if score > 0 {
            format!("score mate {}", mate_moves)
        } else {
            format!("score mate -{}", mate_moves)
        }
    } else {
        format!("score cp {}", score)
    }
}
