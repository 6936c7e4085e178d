use std::path::PathBuf;

use clap::Parser;
use cutlist_optimizer::config::SolverConfig;
use cutlist_optimizer::render;
use cutlist_optimizer::solver::Solver;
use cutlist_optimizer::types::{Demand, PackingResult, Strategy, expand_demands};
use tracing::Level;

/// Upper bound on pieces after expanding quantities.
const MAX_PIECES: u64 = 1_000_000;

#[derive(Parser)]
#[command(
    name = "cutlist_optimizer",
    about = "1D cutting stock optimizer: fewest stock lengths, least waste"
)]
struct Cli {
    /// Stock length shared by every stock piece (e.g. 2400)
    #[arg(long, value_parser = parse_length)]
    stock: u32,

    /// Pieces to cut as LEN or LEN:qty (e.g. 800 600:3 450:2)
    #[arg(long = "pieces", num_args = 1.., required = true)]
    pieces: Vec<String>,

    /// Packing strategy, overrides the config file
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Stop the exact search after this many nodes
    #[arg(long)]
    node_budget: Option<u64>,

    /// Stop the exact search after this many milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// JSON solver config (strategy, node_budget, time_limit_ms)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run both strategies and report each
    #[arg(long)]
    compare: bool,

    /// Draw each stock to scale
    #[arg(long)]
    layout: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Log level written to stderr
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

fn parse_length(s: &str) -> Result<u32, String> {
    let length = s
        .parse::<u32>()
        .map_err(|_| format!("invalid length '{}'", s))?;
    if length == 0 {
        return Err(format!("length must be non-zero in '{}'", s));
    }
    Ok(length)
}

fn parse_piece(s: &str) -> Result<Demand, String> {
    let (length, qty) = match s.split_once(':') {
        Some((length, qty)) => {
            let qty = qty
                .parse::<u32>()
                .map_err(|_| format!("invalid quantity in '{}'", s))?;
            if qty == 0 {
                return Err(format!("quantity must be non-zero in '{}'", s));
            }
            if qty as u64 > MAX_PIECES {
                return Err(format!("quantity exceeds {} in '{}'", MAX_PIECES, s));
            }
            (length, qty)
        }
        None => (s, 1),
    };
    Ok(Demand::new(parse_length(length)?, qty))
}

fn check_piece_count(demands: &[Demand]) -> Result<(), String> {
    let total: u64 = demands.iter().map(|d| d.qty as u64).sum();
    if total > MAX_PIECES {
        return Err(format!(
            "{} pieces requested, at most {} are supported",
            total, MAX_PIECES
        ));
    }
    Ok(())
}

fn summary_line(result: &PackingResult) -> String {
    format!(
        "Summary: {} stock{} used, {} cut, waste {} ({:.1}%){}",
        result.bins_used,
        if result.bins_used == 1 { "" } else { "s" },
        result.total_length(),
        result.waste,
        result.waste_percent(),
        if result.optimal { "" } else { ", not proven optimal" },
    )
}

fn compare_json(exact: &PackingResult, greedy: &PackingResult) -> serde_json::Value {
    serde_json::json!({ "exact": exact, "greedy": greedy })
}

fn print_result(label: Option<Strategy>, result: &PackingResult, layout: bool) {
    if let Some(strategy) = label {
        println!("== {strategy} ==");
    }
    for (i, stock) in result.stocks().iter().enumerate() {
        let joined = stock
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("Stock #{}: {}", i + 1, joined);
        if layout {
            print!("{}", render::render_bar(result.stock_length, stock));
        }
    }
    println!();

    println!("{}", summary_line(result));
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(cli.log_level)
        .init();

    let mut config = match &cli.config {
        Some(path) => SolverConfig::from_file(path).unwrap_or_else(|e| fail(e)),
        None => SolverConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if cli.node_budget.is_some() {
        config.node_budget = cli.node_budget;
    }
    if cli.time_limit_ms.is_some() {
        config.time_limit_ms = cli.time_limit_ms;
    }
    tracing::debug!(?config, "solver config");

    let demands: Vec<Demand> = cli
        .pieces
        .iter()
        .map(|p| parse_piece(p))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| fail(e));
    check_piece_count(&demands).unwrap_or_else(|e| fail(e));

    let solver = Solver::new(cli.stock, expand_demands(&demands)).with_limits(config.limits());

    if cli.compare {
        let exact = solver.solve(Strategy::Exact).unwrap_or_else(|e| fail(e));
        let greedy = solver.solve(Strategy::Greedy).unwrap_or_else(|e| fail(e));
        if cli.json {
            let both = compare_json(&exact, &greedy);
            println!("{}", serde_json::to_string_pretty(&both).unwrap_or_else(|e| fail(e)));
        } else {
            print_result(Some(Strategy::Exact), &exact, cli.layout);
            println!();
            print_result(Some(Strategy::Greedy), &greedy, cli.layout);
        }
        return;
    }

    let result = solver.solve(config.strategy).unwrap_or_else(|e| fail(e));
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result).unwrap_or_else(|e| fail(e)));
    } else {
        print_result(None, &result, cli.layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_piece() {
        assert_eq!(parse_piece("800").unwrap(), Demand::new(800, 1));
        assert_eq!(parse_piece("600:3").unwrap(), Demand::new(600, 3));
        assert!(parse_piece("600:0").is_err());
        assert!(parse_piece("0").is_err());
        assert!(parse_piece("abc:2").is_err());
        assert!(parse_piece("60:x").is_err());
    }

    #[test]
    fn test_piece_count_capped() {
        assert!(parse_piece("600:4000000000").is_err());
        assert!(parse_piece("600:1000000").is_ok());
        assert!(check_piece_count(&[Demand::new(600, 1_000_000)]).is_ok());
        let err = check_piece_count(&[Demand::new(600, 600_000), Demand::new(50, 600_000)])
            .unwrap_err();
        assert!(err.contains("1200000 pieces requested"));
    }

    #[test]
    fn test_summary_line() {
        let lengths = vec![60, 35, 45, 65, 70, 120];
        let solver = Solver::new(200, lengths);
        let exact = summary_line(&solver.solve_exact().unwrap());
        assert!(exact.starts_with("Summary: 2 stocks used, 395 cut, waste 5 ("));
        assert!(!exact.contains("not proven optimal"));
        assert_eq!(
            summary_line(&solver.solve_greedy().unwrap()),
            "Summary: 3 stocks used, 395 cut, waste 205 (34.2%), not proven optimal"
        );

        let single = Solver::new(100, vec![100]).solve_exact().unwrap();
        assert_eq!(summary_line(&single), "Summary: 1 stock used, 100 cut, waste 0 (0.0%)");
    }

    #[test]
    fn test_compare_json() {
        let solver = Solver::new(200, vec![60, 35, 45, 65, 70, 120]);
        let exact = solver.solve_exact().unwrap();
        let greedy = solver.solve_greedy().unwrap();

        let text = serde_json::to_string_pretty(&compare_json(&exact, &greedy)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["exact"]["bins_used"], 2);
        assert_eq!(value["exact"]["waste"], 5);
        assert_eq!(value["exact"]["optimal"], true);
        assert_eq!(value["greedy"]["bins_used"], 3);
        assert_eq!(value["greedy"]["assignments"], serde_json::json!([1, 2, 1, 1, 0, 0]));
        assert_eq!(value["greedy"]["nodes"], 0);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "cutlist_optimizer",
            "--stock",
            "200",
            "--pieces",
            "60",
            "35:2",
            "--strategy",
            "greedy",
            "--node-budget",
            "1000",
        ])
        .unwrap();
        assert_eq!(cli.stock, 200);
        assert_eq!(cli.pieces, vec!["60", "35:2"]);
        assert_eq!(cli.strategy, Some(Strategy::Greedy));
        assert_eq!(cli.node_budget, Some(1000));
        assert_eq!(cli.log_level, Level::WARN);
    }

    #[test]
    fn test_cli_rejects_zero_stock() {
        assert!(Cli::try_parse_from(["cutlist_optimizer", "--stock", "0", "--pieces", "10"]).is_err());
    }
}
