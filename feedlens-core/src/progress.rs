//! Run progress events and sinks

use crate::outcome::Notice;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Classifying,
    Summarizing,
    Aggregating,
    Complete,
}

/// Units whose batch has been attempted, over all units. Monotonically non-decreasing
/// within a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub attempted: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.attempted as f64 / self.total as f64
        }
    }

    /// Percentage of overall work when classification is allotted `share` of it
    /// (0.70 in the default dashboard).
    pub fn scaled_percentage(&self, share: f64) -> u8 {
        (self.fraction() * share * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Phase { phase: RunPhase },
    Progress {
        attempted: usize,
        total: usize,
        fraction: f64,
    },
    Notice { notice: Notice },
}

impl ProgressEvent {
    pub fn progress(attempted: usize, total: usize) -> Self {
        let fraction = Progress { attempted, total }.fraction();
        ProgressEvent::Progress {
            attempted,
            total,
            fraction,
        }
    }
}

/// Receives progress events as a run advances.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards everything.
impl ProgressSink for () {
    fn emit(&self, _event: ProgressEvent) {}
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // Receiver gone means nobody is watching; the run still completes.
        let _ = self.send(event);
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn progress_points(&self) -> Vec<Progress> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress {
                    attempted, total, ..
                } => Some(Progress {
                    attempted: *attempted,
                    total: *total,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Notice { notice } => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_percentage() {
        let p = Progress {
            attempted: 15,
            total: 32,
        };
        assert_eq!(p.scaled_percentage(0.7), 33);
        assert_eq!(
            Progress {
                attempted: 32,
                total: 32
            }
            .scaled_percentage(0.7),
            70
        );
    }

    #[test]
    fn test_progress_event_carries_fraction() {
        let event = ProgressEvent::progress(8, 32);
        assert_eq!(
            event,
            ProgressEvent::Progress {
                attempted: 8,
                total: 32,
                fraction: 0.25,
            }
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["fraction"], 0.25);
    }

    #[test]
    fn test_empty_run_is_complete() {
        assert_eq!(Progress { attempted: 0, total: 0 }.fraction(), 1.0);
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.emit(ProgressEvent::Phase {
            phase: RunPhase::Classifying,
        });
    }
}
