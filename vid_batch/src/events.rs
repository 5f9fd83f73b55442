//! Batch event stream
//!
//! Everything observers learn about a batch arrives as a [`BatchEvent`]:
//! accepted/rejected files, per-job start and outcome, tier fallbacks, and
//! progress values. The CLI renders them; `--json` consumers get the summary.

use crate::scheduler::BatchSummary;
use crate::settings::ConversionSettings;
use crate::strategy::TierKind;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    FileAccepted {
        path: PathBuf,
        size_bytes: u64,
        /// `None` when the probe failed
        duration_seconds: Option<f64>,
        native_fps: Option<f64>,
        /// Extension outside the usual video set
        unusual_extension: bool,
    },
    FileRejected {
        path: PathBuf,
        reason: String,
    },
    BatchStarted {
        total: usize,
        total_duration_seconds: f64,
        settings: ConversionSettings,
    },
    JobStarted {
        job: usize,
        total: usize,
        input: PathBuf,
        output: PathBuf,
    },
    TierStarted {
        job: usize,
        tier: TierKind,
    },
    TierFallback {
        job: usize,
        tier: TierKind,
        reason: String,
    },
    JobProgress {
        job: usize,
        percent: u8,
    },
    JobSucceeded {
        job: usize,
        input: PathBuf,
        output: PathBuf,
        tier: TierKind,
        input_bytes: u64,
        output_bytes: u64,
        reduction_percent: f64,
    },
    JobFailed {
        job: usize,
        input: PathBuf,
        reason: String,
    },
    OverallProgress {
        percent: u8,
        completed: usize,
        total: usize,
    },
    BatchFinished {
        summary: BatchSummary,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: BatchEvent);
}

/// Channel sink; a dropped receiver silently discards events.
impl EventSink for Sender<BatchEvent> {
    fn emit(&self, event: BatchEvent) {
        let _ = self.send(event);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: BatchEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<BatchEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BatchEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: BatchEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_channel_sink_delivers_and_tolerates_closed_receiver() {
        let (tx, rx) = channel();
        tx.emit(BatchEvent::JobProgress { job: 0, percent: 4 });
        assert_eq!(
            rx.recv().unwrap(),
            BatchEvent::JobProgress { job: 0, percent: 4 }
        );
        drop(rx);
        tx.emit(BatchEvent::JobProgress { job: 0, percent: 6 });
    }

    #[test]
    fn test_event_json_shape() {
        let e = BatchEvent::TierFallback {
            job: 2,
            tier: TierKind::LibraryMinimal,
            reason: "boom".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event"], "tier_fallback");
        assert_eq!(json["tier"], "library-minimal");
        assert_eq!(json["job"], 2);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.emit(BatchEvent::OverallProgress {
            percent: 50,
            completed: 1,
            total: 2,
        });
        NullSink.emit(BatchEvent::JobProgress { job: 0, percent: 1 });
        assert_eq!(sink.events().len(), 1);
    }
}
