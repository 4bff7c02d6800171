use crate::backend::{BackendError, SessionBackend};
use crate::models::{NewStudySession, StudySessionRecord};
use crate::storage::{LocalStore, SAVED_SESSIONS_KEY};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_SESSION_SECS: u64 = 10;
const SAVED_ENTRY_TTL_HOURS: i64 = 24;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedEntry {
    pub saved: bool,
    pub marked_at: DateTime<Utc>,
}

/// Session ids whose duration has already been handed to the backend.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct SavedSessionIndex {
    entries: BTreeMap<String, SavedEntry>,
}

impl SavedSessionIndex {
    pub fn is_saved(&self, session_id: &str) -> bool {
        self.entries.get(session_id).is_some_and(|e| e.saved)
    }

    pub fn mark(&mut self, session_id: &str, at: DateTime<Utc>) {
        self.entries.insert(
            session_id.to_string(),
            SavedEntry {
                saved: true,
                marked_at: at,
            },
        );
    }

    pub fn unmark(&mut self, session_id: &str) {
        self.entries.remove(session_id);
    }

    /// Drops entries older than 24 hours. Returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(SAVED_ENTRY_TTL_HOURS);
        let before = self.entries.len();
        self.entries.retain(|_, e| e.marked_at > cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub session_id: String,
    pub duration_seconds: u64,
    pub session_date: NaiveDate,
    /// Partial saves (pause, reset, mode switch) are subject to the minimum.
    pub partial: bool,
}

#[derive(Debug)]
pub enum SaveOutcome {
    Saved(StudySessionRecord),
    AlreadySaved,
    BelowThreshold,
    Failed(BackendError),
}

impl SaveOutcome {
    /// True when the session is now known to be recorded.
    pub fn is_recorded(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_) | SaveOutcome::AlreadySaved)
    }
}

pub struct SessionRecorder<B: SessionBackend> {
    backend: B,
    index: SavedSessionIndex,
    user_id: String,
    min_session_secs: u64,
}

impl<B: SessionBackend> SessionRecorder<B> {
    pub fn new(backend: B, user_id: String, min_session_secs: u64) -> Self {
        Self {
            backend,
            index: SavedSessionIndex::default(),
            user_id,
            min_session_secs,
        }
    }

    /// Loads the persisted index and prunes stale entries.
    pub fn load_index(&mut self, store: &LocalStore, now: DateTime<Utc>) {
        self.index = store.get(SAVED_SESSIONS_KEY).unwrap_or_default();
        let pruned = self.index.prune(now);
        if pruned > 0 {
            log::debug!("pruned {} saved-session entries", pruned);
            self.persist_index(store);
        }
        log::debug!("{} saved-session entries loaded", self.index.len());
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_saved(&self, session_id: &str) -> bool {
        self.index.is_saved(session_id)
    }

    pub fn save(
        &mut self,
        store: &LocalStore,
        request: &SaveRequest,
        now: DateTime<Utc>,
    ) -> SaveOutcome {
        if request.duration_seconds == 0
            || (request.partial && request.duration_seconds < self.min_session_secs)
        {
            log::debug!(
                "session {} not saved: {}s below minimum",
                request.session_id,
                request.duration_seconds
            );
            return SaveOutcome::BelowThreshold;
        }

        if self.is_saved(&request.session_id) {
            log::debug!("session {} already saved, skipping", request.session_id);
            return SaveOutcome::AlreadySaved;
        }

        // Mark before writing so an overlapping trigger sees the session as taken.
        self.index.mark(&request.session_id, now);
        self.persist_index(store);

        let row = NewStudySession {
            session_id: request.session_id.clone(),
            user_id: self.user_id.clone(),
            duration_seconds: request.duration_seconds,
            session_date: request.session_date,
        };

        match self.backend.insert_session(&row) {
            Ok(record) => {
                log::info!(
                    "saved study session {} ({}s)",
                    record.session_id,
                    record.duration_seconds
                );
                if self.index.prune(now) > 0 {
                    self.persist_index(store);
                }
                SaveOutcome::Saved(record)
            }
            Err(e) => {
                log::error!("failed to save session {}: {}", request.session_id, e);
                self.index.unmark(&request.session_id);
                self.persist_index(store);
                SaveOutcome::Failed(e)
            }
        }
    }

    fn persist_index(&self, store: &LocalStore) {
        if let Err(e) = store.set(SAVED_SESSIONS_KEY, &self.index) {
            log::warn!("could not persist saved-session index: {}", e);
        }
    }
}
