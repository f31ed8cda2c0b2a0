//! Trace export functionality
//!
//! Writes a reconstructed [`crate::model::Trace`] in formats other tools can
//! display. Currently supports the Chrome Trace Event Format, readable by
//! Perfetto and chrome://tracing.

pub mod chrome_trace;

pub use chrome_trace::ChromeTraceExporter;
