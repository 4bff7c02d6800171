use crate::backend::SessionBackend;
use crate::clock::{remaining_from_target, target_from_remaining, Clock};
use crate::config::TimerSettings;
use crate::models::{CycleEntry, PendingSave, StudySessionRecord, TimerMode, TimerState};
use crate::notify::Notifier;
use crate::recorder::{SaveOutcome, SaveRequest, SessionRecorder};
use crate::reminders::ReminderScheduler;
use crate::stats::weekly_progress;
use crate::storage::{
    LocalStore, COMPLETED_CYCLES_KEY, STUDY_CYCLES_KEY, TIMER_STATE_KEY, WEEKLY_PROGRESS_KEY,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Started(TimerMode),
    Paused { remaining_seconds: u64 },
    Completed { finished: TimerMode, next: TimerMode },
    SessionSaved(StudySessionRecord),
    SaveFailed(String),
    Reminder(&'static str),
    Reset(TimerMode),
    ModeSwitched(TimerMode),
}

/// Owns the live timer and everything that reacts to it. One engine exists
/// per open timer view; its lifetime is the view's lifetime.
pub struct TimerEngine<B: SessionBackend, C: Clock> {
    settings: TimerSettings,
    clock: C,
    store: LocalStore,
    recorder: SessionRecorder<B>,
    reminders: ReminderScheduler,
    notifier: Box<dyn Notifier>,
    state: TimerState,
    cycles_completed: u32,
}

impl<B: SessionBackend, C: Clock> TimerEngine<B, C> {
    /// Builds an engine with a fresh study interval. Call [`restore`] to pick
    /// up a persisted snapshot.
    ///
    /// [`restore`]: TimerEngine::restore
    pub fn new(
        settings: TimerSettings,
        backend: B,
        store: LocalStore,
        clock: C,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let mut recorder = SessionRecorder::new(
            backend,
            settings.user_id.clone(),
            settings.min_session_secs,
        );
        recorder.load_index(&store, clock.now());
        let cycles_completed = store.get(COMPLETED_CYCLES_KEY).unwrap_or(0);
        let reminders = ReminderScheduler::new(settings.reminder_interval_mins);
        let state = TimerState::fresh(TimerMode::Study, settings.study_seconds);

        Self {
            settings,
            clock,
            store,
            recorder,
            reminders,
            notifier,
            state,
            cycles_completed,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn reminders_enabled(&self) -> bool {
        self.reminders.is_enabled()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn interval_for(&self, mode: TimerMode) -> u64 {
        match mode {
            TimerMode::Study => self.settings.study_seconds,
            TimerMode::Break => self.settings.break_seconds,
        }
    }

    fn local_date(now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&Local).date_naive()
    }

    /// Loads the persisted snapshot. A running interval whose target passed
    /// while nothing was watching is completed immediately.
    pub fn restore(&mut self) -> Vec<TimerEvent> {
        let now = self.clock.now();
        let snapshot: Option<TimerState> = self.store.get(TIMER_STATE_KEY);
        let Some(snapshot) = snapshot else {
            log::debug!("no timer snapshot, starting fresh");
            return Vec::new();
        };

        if !snapshot.is_consistent() {
            log::warn!(
                "discarding inconsistent timer snapshot ({}s of {}s, running: {})",
                snapshot.remaining_seconds,
                snapshot.interval_seconds,
                snapshot.is_running
            );
            return Vec::new();
        }

        self.state = snapshot;
        let mut events = self.retry_pending(now);

        // An untouched idle interval follows the current configuration.
        if !self.state.is_running
            && self.state.session_id.is_none()
            && self.state.elapsed_seconds() == 0
        {
            let mode = self.state.mode;
            self.reset_to(mode);
            return events;
        }

        if !self.state.is_running {
            log::info!(
                "restored paused {} interval with {}s left",
                self.state.mode,
                self.state.remaining_seconds
            );
            return events;
        }

        self.refresh(now);
        if self.state.remaining_seconds == 0 {
            log::info!("{} interval completed while away", self.state.mode);
            events.extend(self.complete(now));
            return events;
        }

        if self.state.mode == TimerMode::Study && self.state.next_reminder_epoch_ms.is_none() {
            self.reminders.schedule(&mut self.state, now);
        }
        log::info!(
            "resumed running {} interval with {}s left",
            self.state.mode,
            self.state.remaining_seconds
        );
        self.persist();
        events
    }

    /// Starts a new interval, or resumes a paused one from where it stopped.
    pub fn start(&mut self) -> Vec<TimerEvent> {
        if self.state.is_running {
            return Vec::new();
        }
        let now = self.clock.now();
        let mut events = self.retry_pending(now);

        if self.state.remaining_seconds == 0 {
            self.state.remaining_seconds = self.state.interval_seconds;
        }
        if self.state.mode == TimerMode::Study && self.state.session_id.is_none() {
            let id = Uuid::new_v4().to_string();
            log::debug!("new study session {}", id);
            self.state.session_id = Some(id);
            self.state.session_saved = false;
        }

        self.state.is_running = true;
        self.state.target_end_epoch_ms = Some(target_from_remaining(
            now.timestamp_millis(),
            self.state.remaining_seconds,
        ));
        if self.state.mode == TimerMode::Study {
            self.reminders.schedule(&mut self.state, now);
        }
        self.persist();

        events.push(TimerEvent::Started(self.state.mode));
        events
    }

    pub fn pause(&mut self) -> Vec<TimerEvent> {
        if !self.state.is_running {
            return Vec::new();
        }
        let now = self.clock.now();
        let mut events = self.retry_pending(now);
        self.refresh(now);
        if self.state.remaining_seconds == 0 {
            events.extend(self.complete(now));
            return events;
        }

        self.state.is_running = false;
        self.state.target_end_epoch_ms = None;
        self.reminders.clear(&mut self.state);

        events.push(TimerEvent::Paused {
            remaining_seconds: self.state.remaining_seconds,
        });
        events.extend(self.save_current(true, now));
        self.persist();
        events
    }

    pub fn toggle(&mut self) -> Vec<TimerEvent> {
        if self.state.is_running {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Periodic poll while the view is open.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        if !self.state.is_running {
            return Vec::new();
        }
        let now = self.clock.now();
        self.refresh(now);
        if self.state.remaining_seconds == 0 {
            let mut events = self.retry_pending(now);
            events.extend(self.complete(now));
            return events;
        }

        if self.state.mode == TimerMode::Study {
            if let Some(message) = self.reminders.poll(&mut self.state, now) {
                self.notifier.chime();
                self.persist();
                return vec![TimerEvent::Reminder(message)];
            }
        }
        Vec::new()
    }

    /// The view became visible again; recompute now instead of waiting for
    /// the next poll.
    pub fn visibility_restored(&mut self) -> Vec<TimerEvent> {
        log::debug!("view visible again, recomputing");
        self.tick()
    }

    pub fn visibility_hidden(&mut self) {
        if self.state.is_running {
            let now = self.clock.now();
            self.refresh(now);
        }
        self.persist();
    }

    pub fn reset(&mut self) -> Vec<TimerEvent> {
        let now = self.clock.now();
        let mut events = self.retry_pending(now);
        events.extend(self.complete_if_expired(now));
        events.extend(self.save_current(true, now));

        let mode = self.state.mode;
        self.reset_to(mode);
        self.persist();
        log::info!("timer reset to {}", mode);

        events.push(TimerEvent::Reset(mode));
        events
    }

    pub fn switch_mode(&mut self, mode: TimerMode) -> Vec<TimerEvent> {
        let now = self.clock.now();
        let mut events = self.retry_pending(now);
        events.extend(self.complete_if_expired(now));
        events.extend(self.save_current(true, now));

        self.reset_to(mode);
        self.persist();
        log::info!("switched to {}", mode);

        events.push(TimerEvent::ModeSwitched(mode));
        events
    }

    /// The view is going away. A running interval stays running in the
    /// snapshot and is recorded when it completes, possibly on a later launch.
    pub fn shutdown(&mut self) {
        if self.state.is_running {
            let now = self.clock.now();
            self.refresh(now);
        }
        self.persist();
        log::debug!(
            "timer view closed ({} {}s left, running: {})",
            self.state.mode,
            self.state.remaining_seconds,
            self.state.is_running
        );
    }

    pub fn today_sessions(&self) -> Vec<StudySessionRecord> {
        let today = Self::local_date(self.clock.now());
        match self.recorder.backend().sessions_on(today) {
            Ok(sessions) => sessions,
            Err(e) => {
                log::warn!("could not load today's sessions: {}", e);
                Vec::new()
            }
        }
    }

    pub fn all_sessions(&self) -> Vec<StudySessionRecord> {
        match self.recorder.backend().list_sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                log::warn!("could not load sessions: {}", e);
                Vec::new()
            }
        }
    }

    fn refresh(&mut self, now: DateTime<Utc>) {
        if !self.state.is_running {
            return;
        }
        if let Some(target) = self.state.target_end_epoch_ms {
            self.state.remaining_seconds = remaining_from_target(target, now.timestamp_millis())
                .min(self.state.interval_seconds);
        }
    }

    /// Brings a running interval up to date and completes it if its target
    /// already passed.
    fn complete_if_expired(&mut self, now: DateTime<Utc>) -> Vec<TimerEvent> {
        self.refresh(now);
        if self.state.is_running && self.state.remaining_seconds == 0 {
            log::debug!("{} interval expired before the next poll", self.state.mode);
            return self.complete(now);
        }
        Vec::new()
    }

    /// Replaces the live interval with an idle one, keeping unsaved sessions.
    fn reset_to(&mut self, mode: TimerMode) {
        let pending = std::mem::take(&mut self.state.pending_saves);
        self.state = TimerState::fresh(mode, self.interval_for(mode));
        self.state.pending_saves = pending;
    }

    fn complete(&mut self, now: DateTime<Utc>) -> Vec<TimerEvent> {
        let finished = self.state.mode;
        let next = finished.other();
        self.state.remaining_seconds = 0;

        let mut events = Vec::new();
        match finished {
            TimerMode::Study => events.extend(self.save_current(false, now)),
            TimerMode::Break => self.record_cycle(now),
        }

        let body = match next {
            TimerMode::Break => format!(
                "Study interval complete. Take a {} minute break.",
                self.settings.break_seconds / 60
            ),
            TimerMode::Study => "Break is over. Ready for the next study interval?".to_string(),
        };
        if let Err(e) = self.notifier.notify(&format!("{finished} complete"), &body) {
            log::warn!("system notification unavailable: {}", e);
        }

        self.reset_to(next);
        if next == TimerMode::Break && self.settings.auto_start_breaks {
            self.state.is_running = true;
            self.state.target_end_epoch_ms = Some(target_from_remaining(
                now.timestamp_millis(),
                self.state.remaining_seconds,
            ));
        }
        self.persist();

        events.push(TimerEvent::Completed { finished, next });
        events
    }

    fn record_cycle(&mut self, now: DateTime<Utc>) {
        self.cycles_completed += 1;
        if let Err(e) = self.store.set(COMPLETED_CYCLES_KEY, &self.cycles_completed) {
            log::warn!("could not persist cycle count: {}", e);
        }

        let mut entries: Vec<CycleEntry> = self.store.get(STUDY_CYCLES_KEY).unwrap_or_default();
        entries.push(CycleEntry {
            completed_at: now,
            study_seconds: self.settings.study_seconds,
            break_seconds: self.state.interval_seconds,
        });
        if let Err(e) = self.store.set(STUDY_CYCLES_KEY, &entries) {
            log::warn!("could not persist cycle log: {}", e);
        }
        log::info!("cycle {} completed", self.cycles_completed);
    }

    /// Records the current study interval. Partial saves use the elapsed
    /// time; a completed interval records its configured length.
    fn save_current(&mut self, partial: bool, now: DateTime<Utc>) -> Vec<TimerEvent> {
        if self.state.mode != TimerMode::Study || self.state.session_saved {
            return Vec::new();
        }
        let Some(session_id) = self.state.session_id.clone() else {
            return Vec::new();
        };

        let request = SaveRequest {
            session_id,
            duration_seconds: if partial {
                self.state.elapsed_seconds()
            } else {
                self.state.interval_seconds
            },
            session_date: Self::local_date(now),
            partial,
        };

        let outcome = self.recorder.save(&self.store, &request, now);
        self.state.session_saved = outcome.is_recorded();
        if outcome.is_recorded() || matches!(outcome, SaveOutcome::Failed(_)) {
            self.state
                .pending_saves
                .retain(|p| p.session_id != request.session_id);
        }
        if let SaveOutcome::Failed(_) = outcome {
            self.state.pending_saves.push(PendingSave {
                session_id: request.session_id.clone(),
                duration_seconds: request.duration_seconds,
                session_date: request.session_date,
            });
        }
        match outcome {
            SaveOutcome::Saved(record) => {
                self.store_weekly_progress(now);
                vec![TimerEvent::SessionSaved(record)]
            }
            SaveOutcome::Failed(e) => {
                vec![TimerEvent::SaveFailed(format!("Could not save study session: {e}"))]
            }
            SaveOutcome::AlreadySaved | SaveOutcome::BelowThreshold => Vec::new(),
        }
    }

    /// Retries saves that failed earlier; called on every transition. The
    /// study session still in progress is left to its own next save, which
    /// carries the newer duration.
    fn retry_pending(&mut self, now: DateTime<Utc>) -> Vec<TimerEvent> {
        if self.state.pending_saves.is_empty() {
            return Vec::new();
        }
        let active = if self.state.mode == TimerMode::Study && !self.state.session_saved {
            self.state.session_id.clone()
        } else {
            None
        };

        let mut events = Vec::new();
        let mut still_pending = Vec::new();
        let mut backend_down = false;
        let mut saved_any = false;
        for entry in std::mem::take(&mut self.state.pending_saves) {
            if backend_down || active.as_deref() == Some(entry.session_id.as_str()) {
                still_pending.push(entry);
                continue;
            }

            let request = SaveRequest {
                session_id: entry.session_id.clone(),
                duration_seconds: entry.duration_seconds,
                session_date: entry.session_date,
                partial: false,
            };
            match self.recorder.save(&self.store, &request, now) {
                SaveOutcome::Saved(record) => {
                    saved_any = true;
                    events.push(TimerEvent::SessionSaved(record));
                }
                SaveOutcome::AlreadySaved => {}
                SaveOutcome::BelowThreshold => {
                    log::warn!(
                        "dropping pending session {} with no duration",
                        entry.session_id
                    );
                }
                SaveOutcome::Failed(e) => {
                    backend_down = true;
                    events.push(TimerEvent::SaveFailed(format!(
                        "Could not save study session: {e}"
                    )));
                    still_pending.push(entry);
                }
            }
        }

        log::debug!("{} session(s) still waiting to be saved", still_pending.len());
        self.state.pending_saves = still_pending;
        if saved_any {
            self.store_weekly_progress(now);
        }
        self.persist();
        events
    }

    fn store_weekly_progress(&self, now: DateTime<Utc>) {
        let sessions = self.all_sessions();
        let progress = weekly_progress(&sessions, Self::local_date(now));
        if let Err(e) = self.store.set(WEEKLY_PROGRESS_KEY, &progress) {
            log::warn!("could not persist weekly progress: {}", e);
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.set(TIMER_STATE_KEY, &self.state) {
            log::warn!("could not persist timer state: {}", e);
        }
    }
}
