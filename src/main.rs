//! trip-settle CLI
//!
//! Compute balances and settlement plans for a trip snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Net balance per member
//! trip-settle balances --input trip.json
//!
//! # Who pays whom, as JSON
//! trip-settle plan --input trip.json --format json
//!
//! # Generate a random trip for testing
//! trip-settle generate --members 6 --expenses 20 --currencies USD,GBP
//! ```

use log::{debug, error};
use std::fs;
use std::process;
use trip_settle::config::SettlementConfig;
use trip_settle::core::currency::CurrencyCode;
use trip_settle::settlement::{compute_balances, SettlementCalculator, SettlementReport};
use trip_settle::simulation::trip_generator::{generate_random_trip, TripConfig};
use trip_settle::store::{MemoryStore, TripSnapshot};

fn print_usage() {
    eprintln!(
        r#"trip-settle: expense splitting and settlement for group trips

USAGE:
    trip-settle <COMMAND> [OPTIONS]

COMMANDS:
    balances    Net balance of every member of a trip
    plan        Settlement plan that clears the balances
    generate    Generate a random trip snapshot (for testing)
    help        Show this message

OPTIONS (balances, plan):
    --input <FILE>      Path to JSON trip snapshot
    --format <FORMAT>   Output format: text (default) or json
    --config <FILE>     JSON settlement config (tolerance, spend_milestone)

OPTIONS (generate):
    --members <N>       Number of members (default: 6)
    --expenses <N>      Number of expenses (default: 20)
    --base <CODE>       Base currency (default: EUR)
    --currencies <LIST> Comma-separated foreign currency codes
    --output <FILE>     Write to file instead of stdout

Set RUST_LOG=debug for a trace of the computation.

EXAMPLES:
    trip-settle balances --input trip.json
    trip-settle plan --input trip.json --format json --config settle.json
    trip-settle generate --members 4 --expenses 12 --currencies USD,GBP --output trip.json"#
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    error!("{}", message);
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn next_value(args: &[String], i: &mut usize, flag: &str, what: &str) -> String {
    *i += 1;
    args.get(*i)
        .cloned()
        .unwrap_or_else(|| fail(format!("{} requires {}", flag, what)))
}

struct ReportArgs {
    input: String,
    json: bool,
    config: SettlementConfig,
}

fn parse_report_args(args: &[String]) -> ReportArgs {
    let mut input = None;
    let mut format = "text".to_string();
    let mut config = SettlementConfig::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => input = Some(next_value(args, &mut i, "--input", "a file path")),
            "--format" => format = next_value(args, &mut i, "--format", "'text' or 'json'"),
            "--config" => {
                let path = next_value(args, &mut i, "--config", "a file path");
                config = SettlementConfig::load(&path).unwrap_or_else(|e| fail(e));
            }
            other => fail(format!("unknown option: {}", other)),
        }
        i += 1;
    }
    if format != "text" && format != "json" {
        fail(format!("unknown format '{}'", format));
    }
    ReportArgs {
        input: input.unwrap_or_else(|| fail("--input <FILE> is required")),
        json: format == "json",
        config,
    }
}

fn load_snapshot(path: &str) -> TripSnapshot {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("reading '{}': {}", path, e)));
    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Expected a trip snapshot:");
        eprintln!(
            r#"{{
  "trip": {{ "id": "t1", "name": "Lisbon", "base_currency": "EUR" }},
  "expenses": [ ... ],
  "assignments": [ ... ]
}}"#
        );
        fail(format!("parsing '{}': {}", path, e))
    })
}

fn build_report(args: &ReportArgs) -> SettlementReport {
    let snapshot = load_snapshot(&args.input);
    let trip_id = snapshot.trip.id.clone();
    let currency = snapshot.trip.base_currency.clone();
    debug!(
        "loaded trip {} with {} expenses and {} assignments",
        trip_id,
        snapshot.expenses.len(),
        snapshot.assignments.len()
    );
    let store = MemoryStore::from_snapshot(snapshot).unwrap_or_else(|e| fail(e));
    let tx = store.begin();
    let balances = compute_balances(&tx, &trip_id).unwrap_or_else(|e| fail(e));
    let transfers = SettlementCalculator::new(args.config.clone())
        .compute_settlement_plan(&balances)
        .unwrap_or_else(|e| fail(e));
    SettlementReport {
        currency,
        balances,
        transfers,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| fail(e))
}

fn cmd_balances(args: &[String]) {
    let args = parse_report_args(args);
    let report = build_report(&args);
    if args.json {
        println!("{}", to_json(&report.balances));
    } else {
        println!("Balances ({})", report.currency);
        for balance in &report.balances {
            println!("  {}", balance);
        }
    }
}

fn cmd_plan(args: &[String]) {
    let args = parse_report_args(args);
    let report = build_report(&args);
    if args.json {
        println!("{}", to_json(&report));
    } else {
        println!("{}", report);
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = TripConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--members" => {
                config.member_count = next_value(args, &mut i, "--members", "a number")
                    .parse()
                    .unwrap_or_else(|_| fail("--members requires a number"));
            }
            "--expenses" => {
                config.expense_count = next_value(args, &mut i, "--expenses", "a number")
                    .parse()
                    .unwrap_or_else(|_| fail("--expenses requires a number"));
            }
            "--base" => {
                config.base_currency =
                    CurrencyCode::new(next_value(args, &mut i, "--base", "a currency code"));
            }
            "--currencies" => {
                config.currencies = next_value(args, &mut i, "--currencies", "a comma-separated list")
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| CurrencyCode::new(s.trim()))
                    .collect();
            }
            "--output" => output_path = Some(next_value(args, &mut i, "--output", "a file path")),
            other => fail(format!("unknown option: {}", other)),
        }
        i += 1;
    }

    let snapshot = generate_random_trip(&config).unwrap_or_else(|e| fail(e));
    let json = to_json(&snapshot);

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| fail(format!("writing '{}': {}", path, e)));
        eprintln!(
            "Generated {} expenses across {} members → {}",
            snapshot.expenses.len(),
            snapshot.trip.members.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "balances" => cmd_balances(rest),
        "plan" => cmd_plan(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
