use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

pub const TIMER_STATE_KEY: &str = "timerState";
pub const SAVED_SESSIONS_KEY: &str = "savedStudySessions";
pub const STUDY_CYCLES_KEY: &str = "studyCycles";
pub const COMPLETED_CYCLES_KEY: &str = "completedCycles";
pub const WEEKLY_PROGRESS_KEY: &str = "weeklyProgressData";

pub fn get_base_dir() -> Result<PathBuf> {
    let mut path =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    path.push(".prepclock");
    if !path.exists() {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

/// Key/value store of plain JSON blobs, one file per key.
///
/// Reads never fail: a missing or unreadable value is reported as absent so
/// a corrupt file cannot block startup. Concurrent writers are last-writer-wins.
#[derive(Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new() -> Result<Self> {
        let dir = get_base_dir()?.join("local");
        Ok(Self::from_dir(dir))
    }

    pub fn from_dir(dir: PathBuf) -> Self {
        if !dir.exists() {
            if let Err(e) = fs::create_dir_all(&dir) {
                log::warn!("could not create local store {}: {}", dir.display(), e);
            }
        }
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("failed to read {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("ignoring corrupt {} entry: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string_pretty(value)?;
        let path = self.path_for(key);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TimerMode, TimerState};
    use tempfile::tempdir;

    #[test]
    fn test_store_set_get() -> Result<()> {
        let dir = tempdir()?;
        let store = LocalStore::from_dir(dir.path().join("local"));

        let state = TimerState::fresh(TimerMode::Study, 1500);
        store.set(TIMER_STATE_KEY, &state)?;

        let loaded: Option<TimerState> = store.get(TIMER_STATE_KEY);
        assert_eq!(loaded, Some(state));
        assert!(dir.path().join("local/timerState.json").exists());

        Ok(())
    }

    #[test]
    fn test_store_get_missing() -> Result<()> {
        let dir = tempdir()?;
        let store = LocalStore::from_dir(dir.path().to_path_buf());

        let loaded: Option<u32> = store.get(COMPLETED_CYCLES_KEY);
        assert!(loaded.is_none());

        Ok(())
    }

    #[test]
    fn test_store_corrupt_entry_reads_as_absent() -> Result<()> {
        let dir = tempdir()?;
        let store = LocalStore::from_dir(dir.path().to_path_buf());
        fs::write(dir.path().join("timerState.json"), "{not json")?;

        let loaded: Option<TimerState> = store.get(TIMER_STATE_KEY);
        assert!(loaded.is_none());

        Ok(())
    }

    #[test]
    fn test_store_remove() -> Result<()> {
        let dir = tempdir()?;
        let store = LocalStore::from_dir(dir.path().to_path_buf());
        store.set(COMPLETED_CYCLES_KEY, &3u32)?;
        store.remove(COMPLETED_CYCLES_KEY)?;
        store.remove(COMPLETED_CYCLES_KEY)?;

        let loaded: Option<u32> = store.get(COMPLETED_CYCLES_KEY);
        assert!(loaded.is_none());

        Ok(())
    }
}
