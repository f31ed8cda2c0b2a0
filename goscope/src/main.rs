//! # goscope - Main Entry Point
//!
//! Loads decoded trace events, reconstructs the timelines and then:
//! - prints a summary (default)
//! - prints per-state statistics of one goroutine (`--goroutine <ID>`)
//! - writes a Chrome trace for Perfetto (`--export trace.json`)

// Progress percentages and durations are converted for display
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};

use goscope::cli::Args;
use goscope::domain::GoroutineId;
use goscope::export::ChromeTraceExporter;
use goscope::model::{goroutine_stats, Trace};
use goscope::{load_trace, LoadOptions};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.to_string().to_lowercase().contains("no goroutine with id") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    if !quiet {
        println!("goscope v{}", env!("CARGO_PKG_VERSION"));
        println!("events: {}", args.events.display());
    }

    // Progress display runs until the sender is dropped with the options
    let (progress_tx, progress_rx) = bounded::<f32>(16);
    let display = (!quiet).then(|| {
        std::thread::spawn(move || {
            for fraction in progress_rx {
                eprint!("\r   Loading: {:>3}%", (fraction * 100.0).round() as u32);
                std::io::stderr().flush().ok();
            }
            eprintln!();
        })
    });

    let options = LoadOptions { workers: args.workers, parser_stages: 0, progress: Some(progress_tx) };
    let loaded = load_trace(&args.events, &options);
    drop(options);
    if let Some(handle) = display {
        handle.join().ok();
    }
    let trace = loaded.with_context(|| format!("Failed to load {}", args.events.display()))?;

    if !quiet {
        print_summary(&trace);
    }

    if let Some(id) = args.goroutine {
        print_goroutine_stats(&trace, GoroutineId(id))?;
    }

    if let Some(ref export_path) = args.export {
        let mut exporter = ChromeTraceExporter::new();
        exporter.add_trace(&trace);
        info!("Exporting {} trace events", exporter.event_count());

        let file = File::create(export_path).context("Failed to create trace output file")?;
        let writer = BufWriter::new(file);
        exporter.export(writer).context("Failed to export trace")?;

        if !quiet {
            println!("saved: {}", export_path.display());
        }
    }

    Ok(())
}

fn print_summary(trace: &Trace) {
    let spans: usize = trace.goroutines().iter().map(|g| g.spans().len()).sum();
    println!("duration: {}", trace.total_duration());
    println!("goroutines: {} ({spans} spans)", trace.goroutines().len());
    println!("processors: {}", trace.processors().len());
    println!("GC: {}, STW: {}", trace.gc().len(), trace.stw().len());
}

fn print_goroutine_stats(trace: &Trace, id: GoroutineId) -> Result<()> {
    let g = trace.goroutine(id).with_context(|| format!("No goroutine with id {}", id.0))?;

    println!("\n{g}");
    println!(
        "{:<26} {:>7} {:>11} {:>11} {:>11} {:>11} {:>11}",
        "State", "Count", "Total", "Min", "Max", "Mean", "Median"
    );
    for s in goroutine_stats(trace, g) {
        println!(
            "{:<26} {:>7} {:>11} {:>11} {:>11} {:>11} {:>11}",
            s.state.name(),
            s.count,
            s.total.to_string(),
            s.min.to_string(),
            s.max.to_string(),
            goscope::domain::Duration(s.mean.round() as u64).to_string(),
            goscope::domain::Duration(s.median.round() as u64).to_string(),
        );
    }
    Ok(())
}
