use crate::models::{NewStudySession, StudySessionRecord};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session store is corrupt: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session rejected: {0}")]
    Rejected(String),
}

/// Where study sessions are durably recorded.
pub trait SessionBackend {
    /// Inserts one session row. `session_id` is an idempotency key: a second
    /// insert with the same id returns the row already stored.
    fn insert_session(&self, session: &NewStudySession)
        -> Result<StudySessionRecord, BackendError>;

    fn list_sessions(&self) -> Result<Vec<StudySessionRecord>, BackendError>;

    fn sessions_on(&self, date: NaiveDate) -> Result<Vec<StudySessionRecord>, BackendError> {
        Ok(self
            .list_sessions()?
            .into_iter()
            .filter(|s| s.session_date == date)
            .collect())
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct SessionTable {
    next_id: u64,
    sessions: Vec<StudySessionRecord>,
}

/// Session table kept in a single JSON document.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new() -> anyhow::Result<Self> {
        let path = crate::storage::get_base_dir()?;
        Ok(Self::from_path(path.join("sessions.json")))
    }

    pub fn from_path(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                let _ = fs::create_dir_all(parent);
            }
        }
        Self { path }
    }

    fn load(&self) -> Result<SessionTable, BackendError> {
        if !self.path.exists() {
            return Ok(SessionTable::default());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, table: &SessionTable) -> Result<(), BackendError> {
        let data = serde_json::to_string_pretty(table)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl SessionBackend for FileBackend {
    fn insert_session(
        &self,
        session: &NewStudySession,
    ) -> Result<StudySessionRecord, BackendError> {
        if session.duration_seconds == 0 {
            return Err(BackendError::Rejected(
                "duration must be positive".to_string(),
            ));
        }

        let mut table = self.load()?;
        if let Some(existing) = table
            .sessions
            .iter()
            .find(|s| s.session_id == session.session_id)
        {
            log::debug!("session {} already stored", session.session_id);
            return Ok(existing.clone());
        }

        table.next_id += 1;
        let record = StudySessionRecord {
            id: table.next_id,
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            duration_seconds: session.duration_seconds,
            session_date: session.session_date,
            created_at: Utc::now(),
        };
        table.sessions.push(record.clone());
        self.save(&table)?;
        Ok(record)
    }

    fn list_sessions(&self) -> Result<Vec<StudySessionRecord>, BackendError> {
        Ok(self.load()?.sessions)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_session(id: &str, secs: u64, date: NaiveDate) -> NewStudySession {
        NewStudySession {
            session_id: id.to_string(),
            user_id: "local".to_string(),
            duration_seconds: secs,
            session_date: date,
        }
    }

    #[test]
    fn test_insert_and_list() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::from_path(dir.path().join("sessions.json"));
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let first = backend.insert_session(&new_session("a", 1500, date))?;
        let second = backend.insert_session(&new_session("b", 40, date))?;

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        let all = backend.list_sessions()?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].duration_seconds, 40);

        Ok(())
    }

    #[test]
    fn test_insert_is_idempotent_on_session_id() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::from_path(dir.path().join("sessions.json"));
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let first = backend.insert_session(&new_session("a", 1500, date))?;
        let again = backend.insert_session(&new_session("a", 1500, date))?;

        assert_eq!(first, again);
        assert_eq!(backend.list_sessions()?.len(), 1);

        Ok(())
    }

    #[test]
    fn test_zero_duration_is_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::from_path(dir.path().join("sessions.json"));
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let result = backend.insert_session(&new_session("a", 0, date));
        assert!(matches!(result, Err(BackendError::Rejected(_))));
        assert!(backend.list_sessions()?.is_empty());

        Ok(())
    }

    #[test]
    fn test_sessions_on_filters_by_date() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::from_path(dir.path().join("sessions.json"));
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        backend.insert_session(&new_session("a", 600, monday))?;
        backend.insert_session(&new_session("b", 900, tuesday))?;

        let on_tuesday = backend.sessions_on(tuesday)?;
        assert_eq!(on_tuesday.len(), 1);
        assert_eq!(on_tuesday[0].session_id, "b");

        Ok(())
    }

    #[test]
    fn test_corrupt_table_is_an_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sessions.json");
        fs::write(&path, "[")?;
        let backend = FileBackend::from_path(path);

        assert!(matches!(backend.list_sessions(), Err(BackendError::Json(_))));

        Ok(())
    }
}
