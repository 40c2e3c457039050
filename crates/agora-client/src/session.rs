//! Persisted session id.
//!
//! The file holds exactly the trimmed id. Missing, unreadable or blank files
//! all mean "no session"; persistence failures are logged and never abort a turn.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::transport::RunService;

pub struct SessionManager {
    path: PathBuf,
}

impl SessionManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted id.
    pub async fn load(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => {
                let id = data.trim();
                (!id.is_empty()).then(|| id.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), %e, "Failed to read session file");
                None
            }
        }
    }

    /// Persist `id`, best-effort.
    pub async fn save(&self, id: &str) {
        if let Err(e) = self.write(id).await {
            warn!(path = %self.path.display(), %e, "Failed to save session id");
        }
    }

    async fn write(&self, id: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Atomic write: write to temp then rename
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, id.trim().as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Saved session id");
        Ok(())
    }

    /// Return the persisted id unless `reset`; otherwise create one on the server and persist it.
    ///
    /// `None` means the caller should run without a session.
    pub async fn ensure(&self, service: &dyn RunService, reset: bool) -> Option<String> {
        if !reset {
            if let Some(existing) = self.load().await {
                return Some(existing);
            }
        }

        let created = match service.create_session().await {
            Ok(created) => created,
            Err(e) => {
                warn!(%e, "Failed to create session, falling back to sessionless runs");
                return None;
            }
        };

        match created.into_id() {
            Some(id) => {
                info!(session_id = %id, "Created session");
                self.save(&id).await;
                Some(id)
            }
            None => {
                warn!("Session creation returned no id, using sessionless runs");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use agora_core::protocol::AssistantInfo;

    use super::*;
    use crate::error::RunError;
    use crate::transport::{CreatedSession, EventStream, RunRequest};

    struct Creator {
        result: Option<CreatedSession>,
        calls: AtomicUsize,
    }

    impl Creator {
        fn new(result: Option<CreatedSession>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RunService for Creator {
        async fn create_session(&self) -> Result<CreatedSession, RunError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .ok_or_else(|| RunError::Transport("connection refused".into()))
        }

        async fn stream_run(&self, _request: RunRequest) -> Result<EventStream, RunError> {
            Err(RunError::Transport("not used".into()))
        }

        async fn list_assistants(&self) -> Result<Vec<AssistantInfo>, RunError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_load_missing_and_blank() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::new(dir.path().join("thread.txt"));
        assert_eq!(sessions.load().await, None);

        std::fs::write(sessions.path(), "  \n").unwrap();
        assert_eq!(sessions.load().await, None);
    }

    #[tokio::test]
    async fn test_save_then_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::new(dir.path().join("nested/dir/thread.txt"));
        sessions.save(" t-42 \n").await;

        assert_eq!(std::fs::read_to_string(sessions.path()).unwrap(), "t-42");
        assert_eq!(sessions.load().await.as_deref(), Some("t-42"));
        assert_eq!(sessions.load().await.as_deref(), Some("t-42"));
    }

    #[tokio::test]
    async fn test_save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // The parent "directory" is a regular file, so the write must fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let sessions = SessionManager::new(blocker.join("thread.txt"));
        sessions.save("t-1").await;
        assert_eq!(sessions.load().await, None);
    }

    #[tokio::test]
    async fn test_ensure_prefers_persisted_id() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::new(dir.path().join("thread.txt"));
        sessions.save("existing").await;

        let service = Creator::new(Some(CreatedSession::Thread { thread_id: "fresh".into() }));
        assert_eq!(sessions.ensure(&service, false).await.as_deref(), Some("existing"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_reset_creates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::new(dir.path().join("thread.txt"));
        sessions.save("existing").await;

        let service = Creator::new(Some(CreatedSession::Keyed { id: "fresh".into() }));
        assert_eq!(sessions.ensure(&service, true).await.as_deref(), Some("fresh"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sessions.load().await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_ensure_creation_failure_is_sessionless() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionManager::new(dir.path().join("thread.txt"));
        let service = Creator::new(None);
        assert_eq!(sessions.ensure(&service, false).await, None);
        assert_eq!(sessions.load().await, None);
    }
}
