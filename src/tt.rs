use std::collections::HashMap;

use crate::rules::PositionKey;
use crate::types::{is_mate_score, Bound, EvaluationResult, Score};

/// Outcome of consulting the table at a node.
#[derive(Debug, PartialEq)]
pub enum Lookup<M> {
    /// The entry settles the node; return it as-is.
    Cutoff(EvaluationResult<M>),
    /// Search the node, with a window possibly narrowed by a bound entry.
    Search { alpha: Score, beta: Score },
}

/// Position cache. Unbounded: one entry per distinct position, every store
/// overwrites, nothing is evicted until `clear`.
pub struct TranspositionTable<M> {
    entries: HashMap<PositionKey, EvaluationResult<M>>,
}

impl<M: Clone> Default for TranspositionTable<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone> TranspositionTable<M> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with_capacity(positions: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(positions),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entry, mate scores still relative to the stored node.
    pub fn probe(&self, key: PositionKey) -> Option<&EvaluationResult<M>> {
        self.entries.get(&key)
    }

    /// Applies the freshness policy: an entry only counts if it was searched at
    /// least `depth` plies deep. Exact entries end the node; bound entries
    /// narrow the window and end it only if the window closes.
    pub fn lookup(
        &self,
        key: PositionKey,
        depth: u8,
        ply: usize,
        mut alpha: Score,
        mut beta: Score,
    ) -> Lookup<M> {
        let Some(entry) = self.entries.get(&key) else {
            return Lookup::Search { alpha, beta };
        };
        if entry.depth < depth {
            return Lookup::Search { alpha, beta };
        }

        let score = retrieve_score(entry.score, ply);
        match entry.bound {
            Bound::Exact => {}
            Bound::LowerBound => alpha = alpha.max(score),
            Bound::UpperBound => beta = beta.min(score),
        }

        if entry.bound == Bound::Exact || alpha >= beta {
            let mut result = entry.clone();
            result.score = score;
            Lookup::Cutoff(result)
        } else {
            Lookup::Search { alpha, beta }
        }
    }

    /// Store a node result, replacing whatever was there.
    pub fn store(&mut self, key: PositionKey, mut result: EvaluationResult<M>, ply: usize) {
        result.score = storage_score(result.score, ply);
        self.entries.insert(key, result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Mate scores are searched relative to the root but stored relative to the
/// node, so they stay valid when the position is reached at another ply.
fn storage_score(score: Score, ply: usize) -> Score {
    if !is_mate_score(score) {
        score
    } else if score > 0 {
        score + ply as Score
    } else {
        score - ply as Score
    }
}

fn retrieve_score(score: Score, ply: usize) -> Score {
    if !is_mate_score(score) {
        score
    } else if score > 0 {
        score - ply as Score
    } else {
        score + ply as Score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SCORE_INFINITY, SCORE_MATE};

    fn result(score: Score, depth: u8, bound: Bound) -> EvaluationResult<u8> {
        EvaluationResult {
            score,
            best_move: Some(7),
            depth,
            bound,
        }
    }

    const KEY: PositionKey = PositionKey(0x123456789ABCDEF0);

    #[test]
    fn test_tt_store_and_probe() {
        let mut tt = TranspositionTable::new();
        tt.store(KEY, result(100, 5, Bound::Exact), 0);

        let entry = tt.probe(KEY).unwrap();
        assert_eq!(entry.depth, 5);
        assert_eq!(entry.score, 100);
        assert_eq!(entry.bound, Bound::Exact);
        assert_eq!(entry.best_move, Some(7));
    }

    #[test]
    fn test_tt_miss() {
        let tt: TranspositionTable<u8> = TranspositionTable::new();
        assert!(tt.probe(PositionKey(0xDEADBEEF)).is_none());
        assert_eq!(
            tt.lookup(PositionKey(0xDEADBEEF), 1, 0, -5, 5),
            Lookup::Search { alpha: -5, beta: 5 }
        );
    }

    #[test]
    fn test_store_always_overwrites() {
        let mut tt = TranspositionTable::new();
        tt.store(KEY, result(50, 6, Bound::Exact), 0);
        // shallower result still replaces the deeper one
        tt.store(KEY, result(75, 3, Bound::LowerBound), 0);

        let entry = tt.probe(KEY).unwrap();
        assert_eq!(entry.depth, 3);
        assert_eq!(entry.score, 75);
        assert_eq!(tt.len(), 1);
    }

    #[test]
    fn test_shallow_entry_ignored() {
        let mut tt = TranspositionTable::new();
        tt.store(KEY, result(40, 2, Bound::Exact), 0);
        assert_eq!(
            tt.lookup(KEY, 3, 0, -SCORE_INFINITY, SCORE_INFINITY),
            Lookup::Search { alpha: -SCORE_INFINITY, beta: SCORE_INFINITY }
        );
        assert!(matches!(tt.lookup(KEY, 2, 0, -SCORE_INFINITY, SCORE_INFINITY), Lookup::Cutoff(_)));
    }

    #[test]
    fn test_exact_entry_cuts_off() {
        let mut tt = TranspositionTable::new();
        tt.store(KEY, result(40, 4, Bound::Exact), 0);
        match tt.lookup(KEY, 3, 0, -10, 10) {
            Lookup::Cutoff(r) => {
                assert_eq!(r.score, 40);
                assert_eq!(r.best_move, Some(7));
            }
            other => panic!("expected cutoff, got {:?}", other),
        }
    }

    #[test]
    fn test_bound_entries_narrow_window() {
        let mut tt = TranspositionTable::new();
        tt.store(KEY, result(20, 4, Bound::LowerBound), 0);
        assert_eq!(tt.lookup(KEY, 4, 0, -50, 50), Lookup::Search { alpha: 20, beta: 50 });

        tt.store(KEY, result(20, 4, Bound::UpperBound), 0);
        assert_eq!(tt.lookup(KEY, 4, 0, -50, 50), Lookup::Search { alpha: -50, beta: 20 });
    }

    #[test]
    fn test_bound_entry_closing_window_cuts_off() {
        let mut tt = TranspositionTable::new();
        tt.store(KEY, result(60, 4, Bound::LowerBound), 0);
        assert!(matches!(tt.lookup(KEY, 4, 0, -50, 50), Lookup::Cutoff(r) if r.score == 60));

        tt.store(KEY, result(-60, 4, Bound::UpperBound), 0);
        assert!(matches!(tt.lookup(KEY, 4, 0, -50, 50), Lookup::Cutoff(r) if r.score == -60));
    }

    #[test]
    fn test_mate_score_adjustment() {
        let mut tt = TranspositionTable::new();

        // Store mate score at ply 3
        tt.store(KEY, result(SCORE_MATE - 3, 10, Bound::Exact), 3);

        // stored score should be adjusted: SCORE_MATE - 3 + 3 = SCORE_MATE
        assert_eq!(tt.probe(KEY).unwrap().score, SCORE_MATE);

        // Retrieve at ply 5 should give SCORE_MATE - 5
        match tt.lookup(KEY, 1, 5, -SCORE_INFINITY, SCORE_INFINITY) {
            Lookup::Cutoff(r) => assert_eq!(r.score, SCORE_MATE - 5),
            other => panic!("expected cutoff, got {:?}", other),
        }
    }

    #[test]
    fn test_losing_mate_adjustment() {
        let mut tt = TranspositionTable::new();
        tt.store(KEY, result(-(SCORE_MATE - 2), 1, Bound::Exact), 2);
        assert_eq!(tt.probe(KEY).unwrap().score, -SCORE_MATE);
        match tt.lookup(KEY, 0, 4, -SCORE_INFINITY, SCORE_INFINITY) {
            Lookup::Cutoff(r) => assert_eq!(r.score, -(SCORE_MATE - 4)),
            other => panic!("expected cutoff, got {:?}", other),
        }
    }

    #[test]
    fn test_with_capacity_grows_past_reservation() {
        let mut tt = TranspositionTable::with_capacity(1);
        assert!(tt.is_empty());
        tt.store(KEY, result(1, 1, Bound::Exact), 0);
        tt.store(PositionKey(0xDEADBEEF), result(2, 1, Bound::Exact), 0);
        assert_eq!(tt.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut tt = TranspositionTable::new();
        tt.store(KEY, result(1, 1, Bound::Exact), 0);
        tt.clear();
        assert!(tt.is_empty());
    }
}
