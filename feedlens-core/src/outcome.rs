//! Retry-less "attempt and record outcome" wrapper for remote calls

use crate::errors::FailureKind;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{error, warn};

/// Upper bound on error text copied into user-facing notices
const NOTICE_DETAIL_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFailure {
    pub label: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug)]
pub enum CallOutcome<T> {
    Succeeded(T),
    Failed(CallFailure),
}

impl<T> CallOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            CallOutcome::Succeeded(value) => Some(value),
            CallOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CallOutcome::Failed(_))
    }
}

/// Await `call` once. Errors are logged and folded into [`CallOutcome::Failed`],
/// never propagated.
pub async fn attempt<T, F>(label: &str, call: F) -> CallOutcome<T>
where
    F: Future<Output = Result<T>>,
{
    match call.await {
        Ok(value) => CallOutcome::Succeeded(value),
        Err(e) => {
            let kind = e.failure_kind();
            let message = e.to_string();
            match kind {
                FailureKind::Capacity => warn!("{} limited by API capacity: {}", label, message),
                FailureKind::Other => error!("{} failed: {}", label, message),
            }
            CallOutcome::Failed(CallFailure {
                label: label.to_string(),
                kind,
                message,
            })
        }
    }
}

/// User-visible, non-blocking warning about a recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub kind: FailureKind,
}

pub fn truncate_detail(message: &str) -> String {
    message.chars().take(NOTICE_DETAIL_CHARS).collect()
}
