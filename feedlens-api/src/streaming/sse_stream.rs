use actix_web_lab::sse::{self, Sse};
use feedlens_core::progress::{Progress, ProgressEvent, RunPhase};
use feedlens_core::{FailureKind, RunSummary, StoredReport};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Phase {
        phase: RunPhase,
    },
    Progress {
        attempted: usize,
        total: usize,
        /// Overall percentage, with classification scaled to its configured share
        percentage: u8,
    },
    Notice {
        title: String,
        message: String,
        kind: FailureKind,
    },
    Complete {
        report: StoredReport,
        summary: RunSummary,
    },
    Error {
        message: String,
        recoverable: bool,
    },
    Heartbeat,
}

impl StreamEvent {
    pub fn from_progress(event: ProgressEvent, classification_share: f64) -> Self {
        match event {
            ProgressEvent::Phase { phase } => StreamEvent::Phase { phase },
            ProgressEvent::Progress {
                attempted, total, ..
            } => StreamEvent::Progress {
                attempted,
                total,
                percentage: Progress { attempted, total }.scaled_percentage(classification_share),
            },
            ProgressEvent::Notice { notice } => StreamEvent::Notice {
                title: notice.title,
                message: notice.message,
                kind: notice.kind,
            },
        }
    }

    /// SSE `event:` name
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Phase { .. } => "phase",
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::Notice { .. } => "notice",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Heartbeat => "heartbeat",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

pub struct SseStream {
    receiver: mpsc::Receiver<StreamEvent>,
    keep_alive: Duration,
}

impl SseStream {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Sender<StreamEvent>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (
            Self {
                receiver,
                keep_alive: Duration::from_secs(15),
            },
            sender,
        )
    }

    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    /// Ends after the first terminal event or when every sender is dropped.
    pub fn into_sse(self) -> impl actix_web::Responder {
        let mut receiver = self.receiver;

        let event_stream = async_stream::stream! {
            while let Some(event) = receiver.recv().await {
                if let StreamEvent::Heartbeat = event {
                    yield Ok::<_, Infallible>(sse::Event::Comment("heartbeat".into()));
                    continue;
                }

                match sse::Data::new_json(&event) {
                    Ok(data) => yield Ok(sse::Event::Data(data.event(event.name()))),
                    Err(e) => warn!("Dropping unserializable stream event: {}", e),
                }

                if event.is_terminal() {
                    break;
                }
            }
        };

        Sse::from_stream(event_stream)
            .with_retry_duration(Duration::from_secs(5))
            .with_keep_alive(self.keep_alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedlens_core::Notice;

    #[test]
    fn test_progress_is_scaled() {
        let event = StreamEvent::from_progress(
            ProgressEvent::progress(30, 32),
            0.7,
        );
        match event {
            StreamEvent::Progress { percentage, .. } => assert_eq!(percentage, 66),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_notice_event_shape() {
        let event = StreamEvent::from_progress(
            ProgressEvent::Notice {
                notice: Notice {
                    title: "Batch 2 Analysis Error".into(),
                    message: "failed".into(),
                    kind: FailureKind::Capacity,
                },
            },
            0.7,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["kind"], "capacity");
        assert_eq!(event.name(), "notice");
        assert!(!event.is_terminal());
    }
}
