use crate::models::TimerState;
use chrono::{DateTime, Duration, Utc};

pub const REMINDER_MESSAGES: [&str; 4] = [
    "Drink some water",
    "Check your posture and sit up straight",
    "Rest your eyes: look at something 20 feet away for 20 seconds",
    "Stand up and stretch your shoulders",
];

/// Advisory prompts during a study interval, independent of the countdown.
pub struct ReminderScheduler {
    interval: Option<Duration>,
    next_message: usize,
}

impl ReminderScheduler {
    pub fn new(interval_mins: Option<u64>) -> Self {
        let interval = interval_mins
            .filter(|m| *m > 0)
            .map(|m| Duration::minutes(m as i64));
        Self {
            interval,
            next_message: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub fn schedule(&self, state: &mut TimerState, now: DateTime<Utc>) {
        state.next_reminder_epoch_ms = self
            .interval
            .map(|interval| (now + interval).timestamp_millis());
    }

    /// Fires at most one reminder per call. A reminder that came due long ago
    /// is not replayed; the next one is scheduled from `now`.
    pub fn poll(&mut self, state: &mut TimerState, now: DateTime<Utc>) -> Option<&'static str> {
        let due = state.next_reminder_epoch_ms?;
        if now.timestamp_millis() < due {
            return None;
        }
        let message = REMINDER_MESSAGES[self.next_message % REMINDER_MESSAGES.len()];
        self.next_message = (self.next_message + 1) % REMINDER_MESSAGES.len();
        self.schedule(state, now);
        Some(message)
    }

    pub fn clear(&self, state: &mut TimerState) {
        state.next_reminder_epoch_ms = None;
    }
}
