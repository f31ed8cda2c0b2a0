//! # goscope - Go Execution Trace Span Reconstruction
//!
//! goscope turns the flat event stream of a Go runtime execution trace into a
//! structured model of what ran where: one timeline per goroutine, one per
//! processor, and the garbage-collection and stop-the-world intervals, each
//! cut into non-overlapping spans labelled with a scheduling state.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Trace decoder (goscope-common::EventTables)        │
//! │        events · stack table · PC table · string table           │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ events, in order
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     goscope (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   classify   │──▶│ Reconstructor│──▶│   finalize   │         │
//! │  │ (per event)  │   │ (sequential) │   │  (parallel)  │         │
//! │  └──────────────┘   └──────┬───────┘   └──────┬───────┘         │
//! │                            │                  │                 │
//! │                            ▼                  ▼                 │
//! │                     ┌──────────────┐   ┌──────────────┐         │
//! │                     │ transition   │   │   patterns   │         │
//! │                     │    table     │   │ (stack rules)│         │
//! │                     └──────────────┘   └──────────────┘         │
//! │                                               │                 │
//! │                                               ▼                 │
//! │                    ┌──────────────┐   ┌──────────────┐          │
//! │                    │    Export    │◀──│    Trace     │          │
//! │                    │ (trace.json) │   │   (model)    │          │
//! │                    └──────────────┘   └──────────────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core Pipeline Modules
//!
//! - [`state`]: Scheduling states and the legal-transition table
//! - [`reconstruct`]: The sequential pass from events to raw timelines
//!   - `classify`: What one event means for goroutines, processors and GC
//! - [`patterns`]: Stack-pattern classifier refining coarse states
//! - [`finalize`]: Per-goroutine post-processing on a worker pool
//! - [`model`]: The finished [`model::Trace`] and its queries
//!   - `stats`: Per-state statistics of a goroutine
//!
//! ### Supporting Modules
//!
//! - [`export`]: Chrome Trace Event Format JSON for Perfetto and chrome://tracing
//! - [`progress`]: Lossy, monotonic progress reporting
//! - [`cli`]: Command-line argument parsing
//! - [`domain`]: Core domain types (`GoroutineId`, `EventId`, `Timestamp`) and errors
//!
//! ## Typical Usage
//!
//! ```no_run
//! use goscope::{load_trace, LoadOptions};
//!
//! # fn example() -> Result<(), goscope::domain::TraceError> {
//! let trace = load_trace("events.json", &LoadOptions::default())?;
//! for g in trace.goroutines() {
//!     println!("{g}: {} spans", g.spans().len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! - **Span**: Maximal interval during which one goroutine or processor holds one state
//! - **Side event**: An event recorded against a goroutine without ending its span
//! - **Mark assist**: A user goroutine doing GC mark work inline
//! - **Event reference**: An index into the event table, used instead of copying events

pub mod cli;
pub mod domain;
pub mod export;
pub mod finalize;
pub mod loader;
pub mod model;
pub mod patterns;
pub mod progress;
pub mod reconstruct;
pub mod state;

pub use loader::{build_trace, load_trace, LoadOptions};
