//! Chess move selection: negamax with alpha-beta pruning, quiescence search,
//! a position cache and a tapered static evaluator, driven through the
//! [`rules::Rules`] trait. [`game::ChessGame`] plugs in standard chess.

pub mod evaluation;
pub mod game;
pub mod movegen;
pub mod pst;
pub mod rules;
pub mod search;
pub mod time;
pub mod tt;
pub mod types;
pub mod uci;

pub use game::ChessGame;
pub use search::{Engine, SearchStats};
pub use types::{EvaluationResult, SearchConfig};

/// One-shot search with a fresh cache.
pub fn best_move<R: rules::Rules>(rules: &mut R, config: &SearchConfig) -> EvaluationResult<R::Move> {
    Engine::new().best_move(rules, config)
}
