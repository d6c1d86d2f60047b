//! Client identity: an opaque, locally persisted id that scopes saved reports
//!
//! Not a credential. Callers obtain it once and pass it explicitly to save/list.

use crate::{FeedbackError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_id(&self) -> Result<String>;
}

/// Fixed id, for tests and server-side callers that already know the user.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub String);

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn user_id(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Generates a UUID v4 on first use and stores it at `path`; later calls, including
/// from later processes, return the stored value.
pub struct FileIdentityProvider {
    path: PathBuf,
    cached: Mutex<Option<String>>,
}

impl FileIdentityProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl IdentityProvider for FileIdentityProvider {
    async fn user_id(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let id = match fs::read_to_string(&self.path).await {
            Ok(existing) if !existing.trim().is_empty() => existing.trim().to_string(),
            Ok(_) => self.generate().await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.generate().await?,
            Err(e) => return Err(FeedbackError::Io(e)),
        };

        *cached = Some(id.clone());
        Ok(id)
    }
}

impl FileIdentityProvider {
    async fn generate(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, &id).await?;
        info!("Generated client identity at {}", self.path.display());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_identity_is_stable_across_providers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("client_id");

        let first = FileIdentityProvider::new(&path).user_id().await.unwrap();
        assert!(Uuid::parse_str(&first).is_ok());

        let provider = FileIdentityProvider::new(&path);
        assert_eq!(provider.user_id().await.unwrap(), first);
        assert_eq!(provider.user_id().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_static_identity() {
        let provider = StaticIdentity("session-1".into());
        assert_eq!(provider.user_id().await.unwrap(), "session-1");
    }
}
