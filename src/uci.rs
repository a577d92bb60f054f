use std::io::{self, BufRead, Write};

use log::{debug, warn};
use rand::seq::SliceRandom;
use shakmaty::{Color, Move, Position};

use crate::game::{uci, ChessGame};
use crate::rules::{MoveFilter, Rules};
use crate::search::{format_score, principal_variation, Engine};
use crate::tt::TranspositionTable;
use crate::types::{ActiveMoves, EngineConfig, Frontier, SearchConfig, MAX_DEPTH};

/// Cache slots reserved up front; the table still grows past this.
const SHELL_CACHE_POSITIONS: usize = 1 << 16;

/// Runs the shell over stdin/stdout until `quit` or end of input.
pub fn run() -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut shell = Shell::new();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut out = stdout.lock();
        let keep_going = shell.handle(&line, &mut out)?;
        out.flush()?;
        if !keep_going {
            break;
        }
    }
    Ok(())
}

/// Shell state: the game being played, the engine and its cache, settings.
pub struct Shell {
    game: ChessGame,
    engine: Engine<Move>,
    config: EngineConfig,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    pub fn new() -> Self {
        Self {
            game: ChessGame::new(),
            engine: Engine::with_table(TranspositionTable::with_capacity(SHELL_CACHE_POSITIONS)),
            config: EngineConfig::default(),
        }
    }

    pub fn game(&self) -> &ChessGame {
        &self.game
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handles one command line. Returns `false` once the shell should exit.
    pub fn handle<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<bool> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Ok(true);
        };

        match command {
            "uci" => {
                writeln!(out, "id name vinci")?;
                writeln!(out, "id author vinci developers")?;
                writeln!(
                    out,
                    "option name Depth type spin default {} min 1 max {}",
                    self.config.depth, MAX_DEPTH
                )?;
                writeln!(out, "option name Frontier type combo default Quiescence var Static var Quiescence")?;
                writeln!(out, "option name QuiescenceChecks type check default false")?;
                writeln!(out, "uciok")?;
            }
            "isready" => writeln!(out, "readyok")?,
            "ucinewgame" => {
                self.game = ChessGame::new();
                self.engine.clear();
            }
            "position" => parse_position(&tokens, &mut self.game),
            "go" => self.go(&parse_go(&tokens), out)?,
            "setoption" => parse_setoption(&tokens, &mut self.config),
            "d" | "print" => writeln!(out, "{}", self.game)?,
            "quit" => return Ok(false),
            other => debug!("ignoring unknown command {:?}", other),
        }
        Ok(true)
    }

    fn go<W: Write>(&mut self, params: &GoParams, out: &mut W) -> io::Result<()> {
        let depth = params.depth.unwrap_or(self.config.depth).min(MAX_DEPTH);
        let side = self.game.position().turn();
        let time_ms = params.compute_time_ms(side);

        let config = match SearchConfig::new(depth, time_ms as f64 / 1000.0) {
            Ok(config) => config
                .with_frontier(self.config.frontier)
                .with_active_moves(self.config.active_moves),
            Err(e) => {
                warn!("{}; falling back to defaults", e);
                SearchConfig::default()
            }
        };

        let result = self.engine.best_move(&mut self.game, &config);
        let stats = self.engine.stats();
        let pv = principal_variation(&mut self.game, self.engine.table(), depth as usize);
        let pv: Vec<String> = pv.iter().map(uci).collect();

        writeln!(
            out,
            "info depth {} {} nodes {} pv {}",
            result.depth,
            format_score(result.score),
            stats.nodes + stats.quiescence_nodes,
            pv.join(" ")
        )?;

        let chosen = result.best_move.or_else(|| self.random_move());
        match chosen {
            Some(mv) => writeln!(out, "bestmove {}", uci(&mv)),
            None => writeln!(out, "bestmove 0000"),
        }
    }

    /// Any legal move, for when the search comes back empty-handed.
    fn random_move(&self) -> Option<Move> {
        let moves = self.game.legal_moves(MoveFilter::All);
        let mv = moves.choose(&mut rand::thread_rng()).cloned();
        if mv.is_some() {
            warn!("search returned no move; playing a random legal move");
        }
        mv
    }
}

/// Parsed `go` command parameters.
#[derive(Debug, Default)]
struct GoParams {
    depth: Option<u8>,
    movetime: Option<u64>,
    wtime: Option<u64>,
    btime: Option<u64>,
    winc: Option<u64>,
    binc: Option<u64>,
    moves_to_go: Option<u64>,
    infinite: bool,
}

impl GoParams {
    /// Compute the time limit for this search in milliseconds. 0 = no limit.
    fn compute_time_ms(&self, side: Color) -> u64 {
        if self.infinite {
            return 0;
        }
        if let Some(mt) = self.movetime {
            return mt;
        }

        let (my_time, my_inc) = match side {
            Color::White => (self.wtime.unwrap_or(0), self.winc.unwrap_or(0)),
            Color::Black => (self.btime.unwrap_or(0), self.binc.unwrap_or(0)),
        };

        if my_time == 0 {
            return 0;
        }

        let moves_left = self.moves_to_go.unwrap_or(30);
        let allocated = my_time / moves_left.max(1) + my_inc * 3 / 4;

        // Don't use more than 80% of remaining time
        allocated.min(my_time * 4 / 5)
    }
}

fn parse_go(tokens: &[&str]) -> GoParams {
    let mut params = GoParams::default();
    let mut iter = tokens.iter().skip(1);

    while let Some(&token) = iter.next() {
        let mut value = || iter.next().and_then(|v| v.parse::<u64>().ok());
        match token {
            "depth" => params.depth = value().map(|d| d.min(MAX_DEPTH as u64) as u8),
            "movetime" => params.movetime = value(),
            "wtime" => params.wtime = value(),
            "btime" => params.btime = value(),
            "winc" => params.winc = value(),
            "binc" => params.binc = value(),
            "movestogo" => params.moves_to_go = value(),
            "infinite" => params.infinite = true,
            _ => {}
        }
    }

    params
}

/// `position startpos|fen <fields> [moves ...]`. A bad FEN leaves the game
/// untouched; moves stop at the first illegal one.
fn parse_position(tokens: &[&str], game: &mut ChessGame) {
    let moves_at = tokens.iter().position(|&t| t == "moves");
    let setup = &tokens[1..moves_at.unwrap_or(tokens.len())];

    let fresh = match setup.split_first() {
        Some((&"startpos", _)) => ChessGame::new(),
        Some((&"fen", fields)) => match ChessGame::from_fen(&fields.join(" ")) {
            Ok(g) => g,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        },
        _ => return,
    };
    *game = fresh;

    if let Some(idx) = moves_at {
        for &text in &tokens[idx + 1..] {
            if let Err(e) = game.play_uci(text) {
                warn!("{}", e);
                break;
            }
        }
    }
}

fn parse_setoption(tokens: &[&str], config: &mut EngineConfig) {
    let name_idx = tokens.iter().position(|&t| t == "name");
    let value_idx = tokens.iter().position(|&t| t == "value");

    let (Some(ni), Some(vi)) = (name_idx, value_idx) else {
        return;
    };
    if vi <= ni {
        return;
    }
    let name = tokens[ni + 1..vi].join(" ");
    let value = tokens[vi + 1..].join(" ");

    match name.to_lowercase().as_str() {
        "depth" => match value.parse::<u8>() {
            Ok(d) if (1..=MAX_DEPTH).contains(&d) => config.depth = d,
            _ => warn!("ignoring Depth {:?}", value),
        },
        "frontier" => match value.to_lowercase().as_str() {
            "static" => config.frontier = Frontier::Static,
            "quiescence" => config.frontier = Frontier::Quiescence,
            _ => warn!("ignoring Frontier {:?}", value),
        },
        "quiescencechecks" => {
            config.active_moves = if value.eq_ignore_ascii_case("true") {
                ActiveMoves::Tactical
            } else {
                ActiveMoves::Captures
            };
        }
        _ => debug!("unknown option {:?}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_lines(shell: &mut Shell, lines: &[&str]) -> String {
        let mut out = Vec::new();
        for line in lines {
            shell.handle(line, &mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_position_startpos() {
        let mut game = ChessGame::from_fen("8/8/8/8/8/8/8/K6k w - - 0 1").unwrap();
        parse_position(&["position", "startpos"], &mut game);
        assert_eq!(game.position_key(), ChessGame::new().position_key());
    }

    #[test]
    fn test_parse_position_startpos_with_moves() {
        let mut game = ChessGame::new();
        parse_position(&["position", "startpos", "moves", "e2e4", "e7e5"], &mut game);
        assert_ne!(game.position_key(), ChessGame::new().position_key());
        assert_eq!(game.ply(), 2);
    }

    #[test]
    fn test_parse_position_fen() {
        let mut game = ChessGame::new();
        let tokens = vec![
            "position", "fen",
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR",
            "b", "KQkq", "e3", "0", "1",
        ];
        parse_position(&tokens, &mut game);
        assert_eq!(game.side_to_move(), crate::rules::Side::Second);
        assert_eq!(game.ply(), 0);
    }

    #[test]
    fn test_bad_fen_keeps_position() {
        let mut game = ChessGame::new();
        parse_position(&["position", "fen", "not", "a", "fen"], &mut game);
        assert_eq!(game.position_key(), ChessGame::new().position_key());
    }

    #[test]
    fn test_illegal_move_stops_replay() {
        let mut game = ChessGame::new();
        parse_position(&["position", "startpos", "moves", "e2e4", "e2e5", "e7e5"], &mut game);
        assert_eq!(game.ply(), 1);
    }

    #[test]
    fn test_position_history_tracking() {
        let mut game = ChessGame::new();
        parse_position(
            &["position", "startpos", "moves", "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"],
            &mut game,
        );
        assert!(game.is_threefold_repetition());
    }

    #[test]
    fn test_parse_go_depth() {
        let params = parse_go(&["go", "depth", "6"]);
        assert_eq!(params.depth, Some(6));
        assert_eq!(parse_go(&["go", "depth", "200"]).depth, Some(MAX_DEPTH));
    }

    #[test]
    fn test_parse_go_time() {
        let tokens = vec!["go", "wtime", "60000", "btime", "60000", "winc", "1000", "binc", "1000"];
        let params = parse_go(&tokens);
        assert_eq!(params.wtime, Some(60000));
        assert_eq!(params.btime, Some(60000));
        assert_eq!(params.winc, Some(1000));
        assert_eq!(params.binc, Some(1000));
    }

    #[test]
    fn test_compute_time_ms() {
        let params = GoParams {
            wtime: Some(60000),
            winc: Some(1000),
            ..GoParams::default()
        };
        let time = params.compute_time_ms(Color::White);
        assert!(time > 0 && time <= 48000, "Time allocation {} out of range", time);
        assert_eq!(params.compute_time_ms(Color::Black), 0);
        assert_eq!(GoParams { movetime: Some(250), ..GoParams::default() }.compute_time_ms(Color::White), 250);
    }

    #[test]
    fn test_parse_setoption() {
        let mut config = EngineConfig::default();
        parse_setoption(&["setoption", "name", "Depth", "value", "5"], &mut config);
        assert_eq!(config.depth, 5);

        parse_setoption(&["setoption", "name", "Depth", "value", "0"], &mut config);
        assert_eq!(config.depth, 5);

        parse_setoption(&["setoption", "name", "Frontier", "value", "Static"], &mut config);
        assert_eq!(config.frontier, Frontier::Static);

        parse_setoption(&["setoption", "name", "QuiescenceChecks", "value", "true"], &mut config);
        assert_eq!(config.active_moves, ActiveMoves::Tactical);
    }

    #[test]
    fn test_uci_handshake() {
        let mut shell = Shell::new();
        let out = run_lines(&mut shell, &["uci", "isready"]);
        assert!(out.contains("uciok"));
        assert!(out.trim_end().ends_with("readyok"));
    }

    #[test]
    fn test_go_reports_bestmove() {
        let mut shell = Shell::new();
        let out = run_lines(
            &mut shell,
            &[
                "position fen r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
                "go depth 2",
            ],
        );
        assert!(out.contains("score mate 1"), "{}", out);
        assert!(out.contains("bestmove h5f7"), "{}", out);
    }

    #[test]
    fn test_go_without_moves() {
        let mut shell = Shell::new();
        let out = run_lines(&mut shell, &["position fen 7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", "go depth 1"]);
        assert!(out.contains("bestmove 0000"), "{}", out);
    }

    #[test]
    fn test_random_move_is_legal() {
        let shell = Shell::new();
        let mv = shell.random_move().unwrap();
        assert!(shell.game().find_uci(&uci(&mv)).is_some());
    }

    #[test]
    fn test_quit_stops_shell() {
        let mut shell = Shell::new();
        let mut out = Vec::new();
        assert!(shell.handle("isready", &mut out).unwrap());
        assert!(!shell.handle("quit", &mut out).unwrap());
    }
}
