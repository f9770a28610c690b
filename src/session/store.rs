//! Durable session persistence.
//!
//! Sessions must survive a crash and be resumable. The
//! `SessionStore` trait is the seam; `JsonFileSessionStore` is the default
//! on-disk backend (one `<session_id>.json` file per session, written with
//! a write-temp-then-rename so a crash mid-write never corrupts the last
//! good checkpoint) and `InMemorySessionStore` is the test double used by
//! the integration tests. Layout and error style follow
//! `config::ProjectConfig::load` (read-whole-file, `anyhow::Context`) with
//! the atomic-replace step added for durability under crash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::StoreError;
use crate::mission::Artifact;
use crate::session::{Phase, SessionError, SessionState};

/// Persistence seam for session state. Implementations must make `save`
/// durable against a crash between write and replace: a recovered session
/// must reflect the last successful checkpoint, never a partial one.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: SessionState) -> Result<(), StoreError>;
    async fn load(&self, session_id: &str) -> Result<SessionState, StoreError>;
    async fn save(&self, session: &SessionState) -> Result<(), StoreError>;

    async fn update_phase(&self, session_id: &str, phase: Phase) -> Result<(), StoreError> {
        let mut session = self.load(session_id).await?;
        session.transition(phase);
        self.save(&session).await
    }

    async fn add_artifact(&self, session_id: &str, artifact: Artifact) -> Result<(), StoreError> {
        let mut session = self.load(session_id).await?;
        session.add_artifact(artifact);
        self.save(&session).await
    }

    async fn add_error(&self, session_id: &str, error: SessionError) -> Result<(), StoreError> {
        let mut session = self.load(session_id).await?;
        session.add_error(error);
        self.save(&session).await
    }

    /// Write an immutable, timestamp-suffixed snapshot of the session
    /// alongside the latest state and update `last_checkpoint=now`.
    /// Checkpoints are never garbage-collected by the core.
    async fn checkpoint(&self, session_id: &str) -> Result<(), StoreError>;

    /// Reload a session for resumption, forcing its phase to
    /// `ErrorRecovery`. Prefers the newest checkpoint snapshot; falls back
    /// to the latest saved state if the session has never been
    /// checkpointed. Fails with `SessionNotRecoverable` only if neither a
    /// checkpoint nor a saved session exists.
    async fn recover(&self, session_id: &str) -> Result<SessionState, StoreError>;

    async fn find_active(&self, mission_id: &str) -> Result<Option<SessionState>, StoreError>;
    async fn list(&self) -> Result<Vec<SessionState>, StoreError>;
}

/// On-disk session store: one flat `<session_id>.json` file per session
/// directly under `root`.
pub struct JsonFileSessionStore {
    root: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{session_id}.json"))
    }

    fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    /// The newest checkpoint file for `session_id`, if any (file names are
    /// `<session_id>-<unix_nanos>.json`, so lexicographic order is
    /// chronological for a fixed-width nanosecond suffix).
    fn newest_checkpoint(&self, session_id: &str) -> Result<Option<PathBuf>, StoreError> {
        let dir = self.checkpoints_dir();
        if !dir.is_dir() {
            return Ok(None);
        }
        let prefix = format!("{session_id}-");
        let mut matches: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        matches.sort();
        Ok(matches.pop())
    }

    fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn create(&self, session: SessionState) -> Result<(), StoreError> {
        self.save(&session).await
    }

    async fn load(&self, session_id: &str) -> Result<SessionState, StoreError> {
        let path = self.session_path(session_id);
        let contents = std::fs::read_to_string(&path)
            .map_err(|_| StoreError::NotFound(session_id.to_string()))?;
        let session = serde_json::from_str(&contents)?;
        Ok(session)
    }

    async fn save(&self, session: &SessionState) -> Result<(), StoreError> {
        let path = self.session_path(&session.session_id);
        let json = serde_json::to_string_pretty(session)?;
        Self::write_atomic(&path, &json)
    }

    async fn checkpoint(&self, session_id: &str) -> Result<(), StoreError> {
        let mut session = self.load(session_id).await?;
        session.last_checkpoint = Some(chrono::Utc::now());
        self.save(&session).await?;

        // Nanosecond resolution keeps back-to-back checkpoints from
        // colliding on the same file name.
        let suffix = session.last_checkpoint.unwrap().timestamp_nanos_opt().unwrap_or_default();
        let snapshot_path = self.checkpoints_dir().join(format!("{session_id}-{suffix}.json"));
        let json = serde_json::to_string_pretty(&session)?;
        Self::write_atomic(&snapshot_path, &json)
    }

    async fn recover(&self, session_id: &str) -> Result<SessionState, StoreError> {
        let mut session = match self.newest_checkpoint(session_id)? {
            Some(checkpoint_path) => {
                let contents = std::fs::read_to_string(&checkpoint_path)?;
                serde_json::from_str(&contents)?
            }
            None => self.load(session_id).await.map_err(|_| {
                StoreError::SessionNotRecoverable(session_id.to_string())
            })?,
        };
        session.transition(Phase::ErrorRecovery);
        self.save(&session).await?;
        Ok(session)
    }

    async fn find_active(&self, mission_id: &str) -> Result<Option<SessionState>, StoreError> {
        let sessions = self.list().await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.mission_id == mission_id)
            .filter(|s| !matches!(s.current_phase, Phase::Completion))
            .max_by_key(|s| s.timestamp))
    }

    async fn list(&self) -> Result<Vec<SessionState>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)?;
            sessions.push(serde_json::from_str(&contents)?);
        }
        Ok(sessions)
    }
}

/// In-memory session store for tests and the demo CLI path. Not durable
/// across process restarts by design. Keeps a `Vec` of checkpoint
/// snapshots per session, mirroring the file backend's `checkpoints/` dir.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
    checkpoints: Mutex<HashMap<String, Vec<SessionState>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: SessionState) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<SessionState, StoreError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    async fn save(&self, session: &SessionState) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn checkpoint(&self, session_id: &str) -> Result<(), StoreError> {
        let mut session = self.load(session_id).await?;
        session.last_checkpoint = Some(chrono::Utc::now());
        self.save(&session).await?;
        self.checkpoints.lock().unwrap().entry(session_id.to_string()).or_default().push(session);
        Ok(())
    }

    async fn recover(&self, session_id: &str) -> Result<SessionState, StoreError> {
        let snapshot = {
            let checkpoints = self.checkpoints.lock().unwrap();
            checkpoints.get(session_id).and_then(|snaps| snaps.last().cloned())
        };
        let mut session = match snapshot {
            Some(session) => session,
            None => self.load(session_id).await.map_err(|_| {
                StoreError::SessionNotRecoverable(session_id.to_string())
            })?,
        };
        session.transition(Phase::ErrorRecovery);
        self.save(&session).await?;
        Ok(session)
    }

    async fn find_active(&self, mission_id: &str) -> Result<Option<SessionState>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.mission_id == mission_id)
            .filter(|s| !matches!(s.current_phase, Phase::Completion))
            .max_by_key(|s| s.timestamp)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<SessionState>, StoreError> {
        Ok(self.sessions.lock().unwrap().values().cloned().collect())
    }
}
