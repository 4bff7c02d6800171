use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest interval the timer accepts, in seconds.
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    Study,
    Break,
}

impl TimerMode {
    pub fn other(self) -> Self {
        match self {
            TimerMode::Study => TimerMode::Break,
            TimerMode::Break => TimerMode::Study,
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimerMode::Study => "Study",
            TimerMode::Break => "Break",
        };
        write!(f, "{label}")
    }
}

/// Snapshot of the live timer, persisted under the `timerState` key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: TimerMode,
    pub remaining_seconds: u64,
    pub interval_seconds: u64,
    pub is_running: bool,
    pub target_end_epoch_ms: Option<i64>,
    pub session_id: Option<String>,
    pub session_saved: bool,
    #[serde(default)]
    pub next_reminder_epoch_ms: Option<i64>,
    /// Study sessions whose save failed; retried until the backend accepts them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_saves: Vec<PendingSave>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingSave {
    pub session_id: String,
    pub duration_seconds: u64,
    pub session_date: NaiveDate,
}

impl TimerState {
    pub fn fresh(mode: TimerMode, interval_seconds: u64) -> Self {
        Self {
            mode,
            remaining_seconds: interval_seconds,
            interval_seconds,
            is_running: false,
            target_end_epoch_ms: None,
            session_id: None,
            session_saved: false,
            next_reminder_epoch_ms: None,
            pending_saves: Vec::new(),
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.interval_seconds.saturating_sub(self.remaining_seconds)
    }

    /// A snapshot claiming to run without a target, or holding an interval
    /// outside `1..=MAX_INTERVAL_SECS`, cannot be resumed.
    pub fn is_consistent(&self) -> bool {
        (!self.is_running || self.target_end_epoch_ms.is_some())
            && (1..=MAX_INTERVAL_SECS).contains(&self.interval_seconds)
            && self.remaining_seconds <= self.interval_seconds
    }
}

/// A study session row as stored by the backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StudySessionRecord {
    pub id: u64,
    pub session_id: String,
    pub user_id: String,
    pub duration_seconds: u64,
    pub session_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewStudySession {
    pub session_id: String,
    pub user_id: String,
    pub duration_seconds: u64,
    pub session_date: NaiveDate,
}

/// One completed Study→Break pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleEntry {
    pub completed_at: DateTime<Utc>,
    pub study_seconds: u64,
    pub break_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_is_idle() {
        let state = TimerState::fresh(TimerMode::Study, 1500);
        assert_eq!(state.remaining_seconds, 1500);
        assert_eq!(state.elapsed_seconds(), 0);
        assert!(!state.is_running);
        assert!(state.session_id.is_none());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_snapshot_uses_camel_case_keys() {
        let mut state = TimerState::fresh(TimerMode::Break, 300);
        state.is_running = true;
        state.target_end_epoch_ms = Some(1_700_000_000_000);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["mode"], "break");
        assert_eq!(json["remainingSeconds"], 300);
        assert_eq!(json["targetEndEpochMs"], 1_700_000_000_000i64);
        assert_eq!(json["sessionSaved"], false);
    }

    #[test]
    fn test_running_without_target_is_inconsistent() {
        let mut state = TimerState::fresh(TimerMode::Study, 60);
        state.is_running = true;
        assert!(!state.is_consistent());
    }

    #[test]
    fn test_out_of_range_snapshot_is_inconsistent() {
        let mut state = TimerState::fresh(TimerMode::Study, 1500);
        state.remaining_seconds = u64::MAX / 4;
        assert!(!state.is_consistent());

        let state = TimerState::fresh(TimerMode::Study, MAX_INTERVAL_SECS + 1);
        assert!(!state.is_consistent());

        let state = TimerState::fresh(TimerMode::Study, 0);
        assert!(!state.is_consistent());
    }

    #[test]
    fn test_snapshot_without_pending_saves_still_loads() {
        let json = r#"{
            "mode": "study",
            "remainingSeconds": 900,
            "intervalSeconds": 1500,
            "isRunning": false,
            "targetEndEpochMs": null,
            "sessionId": "abc",
            "sessionSaved": false
        }"#;
        let state: TimerState = serde_json::from_str(json).unwrap();
        assert!(state.pending_saves.is_empty());
        assert!(state.is_consistent());

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("pendingSaves").is_none());
    }

    #[test]
    fn test_mode_other() {
        assert_eq!(TimerMode::Study.other(), TimerMode::Break);
        assert_eq!(TimerMode::Break.other(), TimerMode::Study);
        assert_eq!(TimerMode::Break.to_string(), "Break");
    }
}
