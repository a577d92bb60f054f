//! Property-based tests for search and evaluation invariants

use proptest::prelude::*;
use shakmaty::Move;
use vinci::evaluation::{evaluate, evaluate_board};
use vinci::game::ChessGame;
use vinci::movegen::{order_active, order_moves};
use vinci::rules::{MoveFilter, Rules, Side};
use vinci::types::{ActiveMoves, Frontier, Score, SearchConfig, SCORE_INFINITY, SCORE_MATE};
use vinci::Engine;

const SEEDS: [&str; 4] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
];

// Seed position plus a short random walk of legal moves
fn random_game() -> impl Strategy<Value = ChessGame> {
    (prop::sample::select(SEEDS.to_vec()), prop::collection::vec(any::<prop::sample::Index>(), 0..6)).prop_map(
        |(fen, walk)| {
            let mut game = ChessGame::from_fen(fen).unwrap();
            for idx in walk {
                if game.is_game_over() {
                    break;
                }
                let moves = game.legal_moves(MoveFilter::All);
                game.apply(idx.get(&moves));
            }
            game
        },
    )
}

fn leaf(game: &ChessGame, ply: usize) -> Score {
    let score = evaluate(game);
    if score == -SCORE_MATE { score + ply as Score } else { score }
}

/// Stand pat or any active move, searched without cutoffs.
fn reference_quiescence(game: &mut ChessGame, ply: usize) -> Score {
    let mut best = leaf(game, ply);
    if game.is_game_over() {
        return best;
    }
    for mv in order_active(game, ActiveMoves::Captures) {
        game.apply(&mv);
        best = best.max(-reference_quiescence(game, ply + 1));
        game.unapply();
    }
    best
}

/// Full-window negamax with no pruning and no cache.
fn reference_search(game: &mut ChessGame, frontier: Frontier, depth: u8, ply: usize) -> (Score, Option<Move>) {
    if game.is_game_over() {
        return (leaf(game, ply), None);
    }
    if depth == 0 {
        return match frontier {
            Frontier::Static => (leaf(game, ply), None),
            Frontier::Quiescence => (reference_quiescence(game, ply), None),
        };
    }
    let mut best = -SCORE_INFINITY;
    let mut best_move = None;
    for mv in order_moves(game) {
        game.apply(&mv);
        let score = -reference_search(game, frontier, depth - 1, ply + 1).0;
        game.unapply();
        if score > best {
            best = score;
            best_move = Some(mv);
        }
    }
    (best, best_move)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_evaluation_is_zero_sum(game in random_game()) {
        let grid = game.board_squares();
        prop_assert_eq!(evaluate_board(&grid, Side::First), -evaluate_board(&grid, Side::Second));
        prop_assert_eq!(
            evaluate_board(&grid, Side::First),
            evaluate_board(&grid.flipped(), Side::Second)
        );
    }

    #[test]
    fn test_pruning_never_changes_result(mut game in random_game()) {
        for frontier in [Frontier::Static, Frontier::Quiescence] {
            let expected = reference_search(&mut game, frontier, 2, 0);
            let cfg = SearchConfig::new(2, 0.0).unwrap().with_frontier(frontier);
            let result = Engine::new().best_move(&mut game, &cfg);
            prop_assert_eq!(result.score, expected.0);
            prop_assert_eq!(result.best_move, expected.1);
        }
    }

    #[test]
    fn test_cache_is_transparent(mut game in random_game()) {
        let cfg = SearchConfig::new(2, 0.0).unwrap();
        let cold = Engine::new().best_move(&mut game, &cfg);

        let mut warm = Engine::new();
        warm.best_move(&mut game, &cfg);
        let again = warm.best_move(&mut game, &cfg);

        prop_assert_eq!(cold.score, again.score);
        prop_assert_eq!(cold.best_move, again.best_move);
    }

    #[test]
    fn test_quiescence_floor(mut game in random_game()) {
        let frontier_only = |frontier| SearchConfig::new(0, 0.0).unwrap().with_frontier(frontier);
        let stand_pat = Engine::new().best_move(&mut game, &frontier_only(Frontier::Static)).score;
        let quiet = Engine::new().best_move(&mut game, &frontier_only(Frontier::Quiescence)).score;
        prop_assert!(quiet >= stand_pat, "quiescence {} below static {}", quiet, stand_pat);
    }

    #[test]
    fn test_search_leaves_game_untouched(mut game in random_game()) {
        let key = game.position_key();
        let ply = game.ply();
        Engine::new().best_move(&mut game, &SearchConfig::new(2, 0.0).unwrap());
        prop_assert_eq!(game.position_key(), key);
        prop_assert_eq!(game.ply(), ply);
    }
}
