use crate::backend::SessionBackend;
use crate::stats::calculate_stats;
use crate::storage::{LocalStore, COMPLETED_CYCLES_KEY};
use crate::utils::format_duration;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::io::{self, Write};

pub struct Reporter<B: SessionBackend> {
    backend: B,
    store: LocalStore,
}

impl<B: SessionBackend> Reporter<B> {
    pub fn new(backend: B, store: LocalStore) -> Self {
        Self { backend, store }
    }

    pub fn report(&self) -> Result<()> {
        let today = Local::now().date_naive();
        self.report_to(&mut io::stdout(), today)
    }

    pub fn report_to<W: Write>(&self, out: &mut W, today: NaiveDate) -> Result<()> {
        let sessions = self.backend.list_sessions()?;
        if sessions.is_empty() {
            writeln!(out, "No study sessions recorded yet.")?;
            return Ok(());
        }

        let stats = calculate_stats(&sessions, today);

        writeln!(out, "Prepclock Report")?;
        writeln!(out, "================")?;

        for (date, day) in &stats.daily_totals {
            if *date < stats.week_start {
                continue;
            }

            let date_str = if *date == stats.today {
                format!("{} (Today)", date)
            } else {
                date.to_string()
            };

            writeln!(out, "\nDate: {}", date_str)?;
            writeln!(
                out,
                "  Study Time:        {}",
                format_duration(day.total_seconds as i64)
            )?;
            writeln!(out, "  Sessions:          {}", day.count)?;
            writeln!(
                out,
                "  Avg Session:       {}",
                format_duration(day.average_seconds() as i64)
            )?;
        }

        let week = &stats.week_summary;
        writeln!(out, "\nWeekly Summary (Starting Monday {})", stats.week_start)?;
        writeln!(out, "-------------------------------------------")?;
        writeln!(
            out,
            "Total Study Time:    {}",
            format_duration(week.total_seconds as i64)
        )?;
        writeln!(out, "Sessions:            {}", week.count)?;
        if let Some(longest) = week.longest {
            writeln!(out, "Longest Session:     {}", format_duration(longest as i64))?;
        }
        if week.count > 0 {
            writeln!(
                out,
                "Avg Session:         {}",
                format_duration(week.average_seconds() as i64)
            )?;
        }

        let cycles: u32 = self.store.get(COMPLETED_CYCLES_KEY).unwrap_or(0);
        writeln!(out, "Completed Cycles:    {}", cycles)?;

        Ok(())
    }
}
