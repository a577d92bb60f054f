use thiserror::Error;

pub type Score = i32;

pub const SCORE_INFINITY: Score = 30_000;
pub const SCORE_MATE: Score = 29_000;
pub const MAX_PLY: usize = 128;
pub const MAX_DEPTH: u8 = 64;
pub const DEFAULT_DEPTH: u8 = 3;

/// True for scores that encode a forced mate (either side).
pub fn is_mate_score(score: Score) -> bool {
    score.abs() > SCORE_MATE - MAX_PLY as Score
}

/// Centipawns to pawn units.
pub fn to_pawns(score: Score) -> f64 {
    score as f64 / 100.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Exact,
    LowerBound, // fail-high: true score >= stored score
    UpperBound, // fail-low: true score <= stored score
}

/// Result of searching one node. `score` is from the side to move at that node.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationResult<M> {
    pub score: Score,
    pub best_move: Option<M>,
    pub depth: u8,
    pub bound: Bound,
}

impl<M> EvaluationResult<M> {
    pub fn leaf(score: Score, depth: u8, bound: Bound) -> Self {
        Self {
            score,
            best_move: None,
            depth,
            bound,
        }
    }

    pub fn pawns(&self) -> f64 {
        to_pawns(self.score)
    }
}

/// What the depth-zero base case scores with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Frontier {
    Static,
    #[default]
    Quiescence,
}

/// Which moves quiescence keeps playing past the horizon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ActiveMoves {
    #[default]
    Captures,
    /// Captures, promotions and checking moves.
    Tactical,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("search depth {0} exceeds the maximum of {max}", max = MAX_DEPTH)]
    DepthTooLarge(u8),
    #[error("time limit must be a finite, non-negative number of seconds (got {0})")]
    InvalidTimeLimit(f64),
}

/// Immutable for the duration of one top-level search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    pub max_depth: u8,
    /// 0 = unlimited.
    pub time_limit_secs: f64,
    pub frontier: Frontier,
    pub active_moves: ActiveMoves,
}

impl SearchConfig {
    pub fn new(max_depth: u8, time_limit_secs: f64) -> Result<Self, ConfigError> {
        if max_depth > MAX_DEPTH {
            return Err(ConfigError::DepthTooLarge(max_depth));
        }
        if !time_limit_secs.is_finite() || time_limit_secs < 0.0 {
            return Err(ConfigError::InvalidTimeLimit(time_limit_secs));
        }
        Ok(Self {
            max_depth,
            time_limit_secs,
            frontier: Frontier::default(),
            active_moves: ActiveMoves::default(),
        })
    }

    pub fn with_frontier(mut self, frontier: Frontier) -> Self {
        self.frontier = frontier;
        self
    }

    pub fn with_active_moves(mut self, active_moves: ActiveMoves) -> Self {
        self.active_moves = active_moves;
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_DEPTH,
            time_limit_secs: 0.0,
            frontier: Frontier::default(),
            active_moves: ActiveMoves::default(),
        }
    }
}

/// Shell-level settings, changed through `setoption`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub depth: u8,
    pub frontier: Frontier,
    pub active_moves: ActiveMoves,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            frontier: Frontier::default(),
            active_moves: ActiveMoves::default(),
        }
    }
}
