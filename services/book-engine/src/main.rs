//! Command-file driver
//!
//! Reads one command per line from `cmds.txt` in the working directory
//! (or the path given as the first argument), applies each command in
//! order, and prints the book and exception dumps at periodic
//! checkpoints and at end of input.

use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::Context;
use book_engine::OrderBookManager;

/// Dump cadence of the demo driver
const CHECKPOINT_INTERVAL: usize = 10;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let path = env::args().nth(1).unwrap_or_else(|| "cmds.txt".to_string());
    let file = File::open(&path).with_context(|| format!("opening command file {path}"))?;
    let reader = BufReader::new(file);

    tracing::info!(%path, "processing command stream");

    let mut manager = OrderBookManager::new();
    let mut line_count = 0usize;

    for line in reader.lines() {
        let line = line.with_context(|| format!("reading {path}"))?;
        manager.apply_line(&line);

        line_count += 1;
        if line_count % CHECKPOINT_INTERVAL == 0 {
            manager.print_books();
            manager.print_exceptions();
        }
    }

    manager.print_books();
    manager.print_exceptions();

    tracing::info!(line_count, "command stream complete");

    Ok(())
}
