use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::Write;

use crate::domain::ExportError;
use crate::model::{Span, Trace};

/// Process ids grouping the timelines in the viewer
const PID_GOROUTINES: u32 = 1;
const PID_PROCESSORS: u32 = 2;
const PID_GARBAGE_COLLECTION: u32 = 3;

const TID_GC: i64 = 0;
const TID_STW: i64 = 1;

/// Viewer row a span is drawn on
#[derive(Debug, Clone, Copy)]
struct Track {
    cat: &'static str,
    pid: u32,
    tid: i64,
}

impl Track {
    fn goroutine(tid: i64) -> Self {
        Self { cat: "goroutine", pid: PID_GOROUTINES, tid }
    }

    fn processor(tid: i64) -> Self {
        Self { cat: "processor", pid: PID_PROCESSORS, tid }
    }

    fn gc(tid: i64) -> Self {
        Self { cat: "gc", pid: PID_GARBAGE_COLLECTION, tid }
    }
}

/// Chrome Trace Event format
/// Format: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChromeTraceEvent {
    /// Event name (state name, or the goroutine a processor ran)
    name: String,
    /// Category for filtering/coloring
    cat: String,
    /// Phase: "X" = complete, "M" = metadata
    ph: String,
    /// Timestamp in microseconds, relative to the start of the trace
    ts: f64,
    /// Duration in microseconds, for complete events
    #[serde(skip_serializing_if = "Option::is_none")]
    dur: Option<f64>,
    pid: u32,
    tid: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<HashMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: String,
}

/// Chrome trace exporter for timeline visualization
///
/// Goroutines, processors and GC/STW intervals each appear as one process
/// in the viewer, with one thread per goroutine or processor.
#[derive(Debug, Default)]
pub struct ChromeTraceExporter {
    events: Vec<ChromeTraceEvent>,
}

impl ChromeTraceExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert every span of the trace
    pub fn add_trace(&mut self, trace: &Trace) {
        self.add_process_name(PID_GOROUTINES, "Goroutines");
        for g in trace.goroutines() {
            let tid = goroutine_tid(g.id().0);
            self.add_thread_name(PID_GOROUTINES, tid, g.to_string());
            for span in g.spans() {
                let mut args = HashMap::new();
                if let Some(function) = trace.at_function(span) {
                    args.insert("at".to_string(), serde_json::json!(function));
                }
                if let Some(reason) = trace.reason(span) {
                    args.insert("reason".to_string(), serde_json::json!(reason.as_str()));
                }
                if !span.tags().is_empty() {
                    args.insert("tags".to_string(), serde_json::json!(span.tags().labels()));
                }
                let events = trace.span_events(span, g.events()).len();
                if events > 0 {
                    args.insert("events".to_string(), serde_json::json!(events));
                }
                self.add_span(trace, span, Track::goroutine(tid), span.state().name().to_string(), args);
            }
        }

        self.add_process_name(PID_PROCESSORS, "Processors");
        for p in trace.processors() {
            let tid = i64::from(p.id().0);
            self.add_thread_name(PID_PROCESSORS, tid, format!("processor {}", p.id().0));
            for span in p.spans() {
                let g = trace.running_goroutine(span);
                let name = trace.goroutine(g).map_or_else(|| format!("goroutine {}", g.0), ToString::to_string);
                let mut args = HashMap::new();
                args.insert("goroutine".to_string(), serde_json::json!(g.0));
                self.add_span(trace, span, Track::processor(tid), name, args);
            }
        }

        self.add_process_name(PID_GARBAGE_COLLECTION, "Garbage collection");
        self.add_thread_name(PID_GARBAGE_COLLECTION, TID_GC, "GC".to_string());
        self.add_thread_name(PID_GARBAGE_COLLECTION, TID_STW, "STW".to_string());
        for span in trace.gc() {
            self.add_span(trace, span, Track::gc(TID_GC), "GC".to_string(), HashMap::new());
        }
        for span in trace.stw() {
            self.add_span(trace, span, Track::gc(TID_STW), "STW".to_string(), HashMap::new());
        }
    }

    fn add_span(&mut self, trace: &Trace, span: &Span, track: Track, name: String, args: HashMap<String, JsonValue>) {
        let start = trace.start(span);
        self.events.push(ChromeTraceEvent {
            name,
            cat: track.cat.to_string(),
            ph: "X".to_string(), // Complete
            ts: start.since(trace.start_time()).as_micros_f64(),
            dur: Some(trace.duration(span).as_micros_f64()),
            pid: track.pid,
            tid: track.tid,
            args: (!args.is_empty()).then_some(args),
        });
    }

    fn add_process_name(&mut self, pid: u32, name: &str) {
        self.add_metadata("process_name", pid, 0, name.to_string());
    }

    fn add_thread_name(&mut self, pid: u32, tid: i64, name: String) {
        self.add_metadata("thread_name", pid, tid, name);
    }

    fn add_metadata(&mut self, kind: &str, pid: u32, tid: i64, name: String) {
        let mut args = HashMap::new();
        args.insert("name".to_string(), serde_json::json!(name));
        self.events.push(ChromeTraceEvent {
            name: kind.to_string(),
            cat: String::new(),
            ph: "M".to_string(), // Metadata
            ts: 0.0,
            dur: None,
            pid,
            tid,
            args: Some(args),
        });
    }

    /// Export the trace to any writer (file, stdout, buffer, etc.)
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let trace = ChromeTrace {
            trace_events: self.events.clone(),
            display_time_unit: "ms".to_string(),
        };
        serde_json::to_writer_pretty(writer, &trace)?;
        Ok(())
    }

    /// Get the number of events collected
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Goroutine ids are u64; the viewer wants signed thread ids.
fn goroutine_tid(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}
