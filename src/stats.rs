use crate::models::StudySessionRecord;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

#[derive(Default, Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub total_seconds: u64,
    pub count: u32,
    pub longest: Option<u64>,
    pub shortest: Option<u64>,
}

impl SessionSummary {
    pub fn average_seconds(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_seconds / self.count as u64
        }
    }
}

pub struct Stats {
    pub daily_totals: BTreeMap<NaiveDate, SessionSummary>,
    pub today_summary: SessionSummary,
    pub week_summary: SessionSummary,
    pub today: NaiveDate,
    pub week_start: NaiveDate,
}

pub fn summarize<'a, I>(sessions: I) -> SessionSummary
where
    I: IntoIterator<Item = &'a StudySessionRecord>,
{
    let mut summary = SessionSummary::default();
    for session in sessions {
        let secs = session.duration_seconds;
        summary.total_seconds += secs;
        summary.count += 1;
        summary.longest = Some(summary.longest.map_or(secs, |m| m.max(secs)));
        summary.shortest = Some(summary.shortest.map_or(secs, |m| m.min(secs)));
    }
    summary
}

pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.weekday().num_days_from_monday() as i64)
}

pub fn calculate_stats(sessions: &[StudySessionRecord], today: NaiveDate) -> Stats {
    let week_start = week_start(today);
    let week_end = week_start + Duration::days(6);

    let mut by_day: BTreeMap<NaiveDate, Vec<&StudySessionRecord>> = BTreeMap::new();
    for session in sessions {
        by_day.entry(session.session_date).or_default().push(session);
    }

    let daily_totals = by_day
        .iter()
        .map(|(date, day)| (*date, summarize(day.iter().copied())))
        .collect();

    Stats {
        daily_totals,
        today_summary: summarize(sessions.iter().filter(|s| s.session_date == today)),
        week_summary: summarize(
            sessions
                .iter()
                .filter(|s| s.session_date >= week_start && s.session_date <= week_end),
        ),
        today,
        week_start,
    }
}

/// Study seconds for each of the last seven days, oldest first, including
/// days without sessions.
pub fn weekly_progress(
    sessions: &[StudySessionRecord],
    today: NaiveDate,
) -> BTreeMap<NaiveDate, u64> {
    let first = today - Duration::days(6);
    let mut progress: BTreeMap<NaiveDate, u64> =
        (0..7).map(|i| (first + Duration::days(i), 0)).collect();
    for session in sessions {
        if let Some(total) = progress.get_mut(&session.session_date) {
            *total += session.duration_seconds;
        }
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(id: &str, secs: u64, date: NaiveDate) -> StudySessionRecord {
        StudySessionRecord {
            id: 0,
            session_id: id.to_string(),
            user_id: "local".to_string(),
            duration_seconds: secs,
            session_date: date,
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&Vec::<StudySessionRecord>::new());
        assert_eq!(summary.total_seconds, 0);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_seconds(), 0);
        assert!(summary.longest.is_none());
    }

    #[test]
    fn test_summarize_mixed() {
        let day = date(2024, 3, 6);
        let sessions = vec![
            session("a", 1500, day),
            session("b", 40, day),
            session("c", 600, day),
        ];

        let summary = summarize(&sessions);
        assert_eq!(summary.total_seconds, 2140);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.longest, Some(1500));
        assert_eq!(summary.shortest, Some(40));
    }

    #[test]
    fn test_calculate_stats_today_and_week() {
        // Wednesday
        let today = date(2024, 3, 6);
        let sessions = vec![
            session("last-week", 1500, date(2024, 3, 3)),
            session("monday", 1500, date(2024, 3, 4)),
            session("today-1", 1500, today),
            session("today-2", 300, today),
        ];

        let stats = calculate_stats(&sessions, today);
        assert_eq!(stats.week_start, date(2024, 3, 4));
        assert_eq!(stats.today_summary.count, 2);
        assert_eq!(stats.today_summary.total_seconds, 1800);
        assert_eq!(stats.week_summary.count, 3);
        assert_eq!(stats.daily_totals.len(), 3);
        assert_eq!(stats.daily_totals[&date(2024, 3, 3)].total_seconds, 1500);
    }

    #[test]
    fn test_weekly_progress_covers_seven_days() {
        let today = date(2024, 3, 6);
        let sessions = vec![
            session("old", 900, date(2024, 2, 28)),
            session("a", 600, date(2024, 2, 29)),
            session("b", 1500, today),
            session("c", 60, today),
        ];

        let progress = weekly_progress(&sessions, today);
        assert_eq!(progress.len(), 7);
        assert_eq!(progress.keys().next(), Some(&date(2024, 2, 29)));
        assert_eq!(progress[&date(2024, 2, 29)], 600);
        assert_eq!(progress[&today], 1560);
        assert_eq!(progress[&date(2024, 3, 1)], 0);
    }
}
