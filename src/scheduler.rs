//! Daily maintenance cycle: overdue marking, reservation expiry, then fines.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::{
    dto::fines::CycleReport,
    error::AppResult,
    services::{
        fine_service::run_fine_sweep, loan_service::mark_overdue_loans,
        reservation_service::expire_reservations,
    },
    state::AppState,
};

/// Wall-clock time of day (UTC) at which the cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    pub hour: u32,
    pub minute: u32,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self { hour: 0, minute: 0 }
    }
}

impl SweepSchedule {
    /// Parses `HH:MM` in 24-hour form.
    pub fn parse(raw: &str) -> Option<Self> {
        let (hour, minute) = raw.trim().split_once(':')?;
        let hour: u32 = hour.parse().ok()?;
        let minute: u32 = minute.parse().ok()?;
        NaiveTime::from_hms_opt(hour, minute, 0)?;
        Some(Self { hour, minute })
    }

    fn time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// First scheduled instant strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.time()).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

/// Runs one full cycle evaluated at `as_of`.
///
/// Overdue marking runs first so that loans that fell due are fined in the same
/// cycle.
pub async fn run_sweep_cycle(state: &AppState, as_of: DateTime<Utc>) -> AppResult<CycleReport> {
    let loans_marked_overdue = mark_overdue_loans(state, as_of).await?;
    let reservations_expired = expire_reservations(state, as_of).await?;
    let fines = run_fine_sweep(state, as_of).await?;

    Ok(CycleReport {
        as_of,
        loans_marked_overdue,
        reservations_expired,
        fines,
    })
}

/// Sleeps until each scheduled instant and runs the cycle. Never returns.
pub async fn run_daily(state: AppState, schedule: SweepSchedule) {
    loop {
        let now = Utc::now();
        let next = schedule.next_run_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next_run = %next, "sweep scheduled");
        tokio::time::sleep(wait).await;

        let as_of = Utc::now();
        match run_sweep_cycle(&state, as_of).await {
            Ok(report) => tracing::info!(
                as_of = %report.as_of,
                overdue = report.loans_marked_overdue,
                expired = report.reservations_expired,
                fines = report.fines.created.len(),
                failures = report.fines.failures.len(),
                "sweep cycle finished"
            ),
            Err(err) => tracing::error!(error = %err, "sweep cycle failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_hh_mm() {
        assert_eq!(
            SweepSchedule::parse("03:30"),
            Some(SweepSchedule { hour: 3, minute: 30 })
        );
        assert_eq!(SweepSchedule::parse(" 0:00 "), Some(SweepSchedule::default()));
        assert_eq!(SweepSchedule::parse("24:00"), None);
        assert_eq!(SweepSchedule::parse("12:60"), None);
        assert_eq!(SweepSchedule::parse("noon"), None);
    }

    #[test]
    fn next_run_is_strictly_after_now() {
        let schedule = SweepSchedule::default();
        let midnight = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run_after(midnight),
            Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap()
        );

        let schedule = SweepSchedule { hour: 6, minute: 15 };
        let early = Utc.with_ymd_and_hms(2025, 1, 10, 5, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run_after(early),
            Utc.with_ymd_and_hms(2025, 1, 10, 6, 15, 0).unwrap()
        );
        let late = Utc.with_ymd_and_hms(2025, 1, 10, 23, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run_after(late),
            Utc.with_ymd_and_hms(2025, 1, 11, 6, 15, 0).unwrap()
        );
    }
}
