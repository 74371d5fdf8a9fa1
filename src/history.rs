//! Conversation history persistence.
//!
//! History is a flat UTF-8 text file of `User: … / Agent: …` turns, read
//! back as one opaque string and fed into the prompt template — it is never
//! parsed back into structured turns. Turns appear in chronological append
//! order; the file survives process restarts and is cleared explicitly when
//! a new (non-follow-up) conversation begins.
//!
//! Writes are serialised behind an async mutex: two requests racing on the
//! same history file would otherwise interleave their appends.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ExplainError;

/// File-backed store of prior conversation turns.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryStore {
    /// Store backed by the file at `path`. Nothing is created until the
    /// first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// Read the whole transcript. Empty string when no history exists yet.
    pub async fn read(&self) -> Result<String, ExplainError> {
        let _guard = self.inner.lock.lock().await;
        match fs::read_to_string(&self.inner.path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ExplainError::HistoryIo { source: e }),
        }
    }

    /// Append one completed turn.
    pub async fn append(&self, user_prompt: &str, agent_response: &str) -> Result<(), ExplainError> {
        let _guard = self.inner.lock.lock().await;
        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ExplainError::HistoryIo { source: e })?;
        }
        let entry = format!("User: {user_prompt}\n\nAgent: {agent_response}\n\n");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .await
            .map_err(|e| ExplainError::HistoryIo { source: e })?;
        file.write_all(entry.as_bytes())
            .await
            .map_err(|e| ExplainError::HistoryIo { source: e })?;
        debug!("appended conversation turn ({} bytes)", entry.len());
        Ok(())
    }

    /// Delete the stored history. Deleting a missing file is a no-op.
    pub async fn clear(&self) -> Result<(), ExplainError> {
        let _guard = self.inner.lock.lock().await;
        match fs::remove_file(&self.inner.path).await {
            Ok(()) => {
                debug!("cleared conversation history");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExplainError::HistoryIo { source: e }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().join("conversation_history.txt"))
    }

    #[tokio::test]
    async fn turns_round_trip_with_exact_framing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.append("p1", "r1").await.unwrap();
        store.append("p2", "r2").await.unwrap();

        let transcript = store.read().await.unwrap();
        assert_eq!(transcript, "User: p1\n\nAgent: r1\n\nUser: p2\n\nAgent: r2\n\n");
    }

    #[tokio::test]
    async fn missing_history_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).read().await.unwrap(), "");
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        // Nothing exists yet: clearing must not error.
        store.clear().await.unwrap();

        store.append("p", "r").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.read().await.unwrap(), "");

        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn append_creates_the_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested/data/history.txt"));
        store.append("p", "r").await.unwrap();
        assert!(store.read().await.unwrap().starts_with("User: p"));
    }
}
