//! Replay driver - feed an instruction file through the engine.
//!
//! Applies each record, prints a summary block after every instruction,
//! and finally checks the book against the file's `R` line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use matchbook::{instructions, Engine};

#[derive(Parser)]
#[command(name = "replay")]
#[command(about = "Replay an order book instruction file and verify its result line")]
struct Args {
    /// Path to the instruction file
    file: PathBuf,

    /// Suppress per-instruction summaries
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let script = match instructions::read_script(&args.file) {
        Ok(script) => script,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(count = script.instructions.len(), "parsed instruction file");

    let engine = Engine::with_capacity(script.instructions.len());

    for (index, &instruction) in script.instructions.iter().enumerate() {
        let trades = engine.apply(instruction);

        if !args.quiet {
            let (bids, asks) = engine.level_infos();
            println!("=== Instruction {index} ===");
            println!("orderbook size: {}", engine.size());
            println!("ask levels:     {}", asks.len());
            println!("bid levels:     {}", bids.len());
            println!("trades:         {}", trades.len());
            println!();
        }
    }

    let (bids, asks) = engine.level_infos();
    let total = engine.size();
    let expected = script.expected;

    if total as u32 != expected.total_orders
        || bids.len() as u32 != expected.bid_levels
        || asks.len() as u32 != expected.ask_levels
    {
        eprintln!(
            "final state mismatch: got ({total} orders, {} bid levels, {} ask levels), \
             expected ({} orders, {} bid levels, {} ask levels)",
            bids.len(),
            asks.len(),
            expected.total_orders,
            expected.bid_levels,
            expected.ask_levels
        );
        return ExitCode::FAILURE;
    }

    println!(
        "final state matches: {total} orders, {} bid levels, {} ask levels",
        bids.len(),
        asks.len()
    );
    ExitCode::SUCCESS
}
