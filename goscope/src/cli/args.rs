//! CLI argument definitions

use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "goscope",
    about = "Reconstruct goroutine and processor timelines from Go execution traces",
    after_help = "\
EXAMPLES:
    goscope events.json                            Print a summary
    goscope events.json --goroutine 42             Per-state statistics of goroutine 42
    goscope events.json --export trace.json        Write a Chrome trace for Perfetto"
)]
pub struct Args {
    /// Decoded trace events (JSON event tables)
    #[arg(value_name = "EVENTS")]
    pub events: PathBuf,

    /// Finalization threads (default: one per core)
    #[arg(short, long)]
    pub workers: Option<NonZeroUsize>,

    /// Export timelines to file in Chrome Trace Event format
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Print per-state statistics of one goroutine
    #[arg(short, long, value_name = "ID")]
    pub goroutine: Option<u64>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
