use chrono::{DateTime, Duration, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Lending periods and the daily fine rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingPolicy {
    pub loan_days: i64,
    pub reservation_days: i64,
    /// Fine per full day late, in cents.
    pub daily_fine_cents: i64,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            loan_days: 14,
            reservation_days: 3,
            daily_fine_cents: 250,
        }
    }
}

impl LendingPolicy {
    pub fn due_date_from(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start + Duration::days(self.loan_days)
    }

    pub fn reservation_expiry_from(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start + Duration::days(self.reservation_days)
    }

    /// Whole days elapsed since `due_date`, rounded down. Negative before the due date.
    pub fn days_late(&self, due_date: DateTime<Utc>, as_of: DateTime<Utc>) -> i64 {
        (as_of - due_date).num_seconds().div_euclid(SECONDS_PER_DAY)
    }

    /// Fine owed for a loan due at `due_date`, or `None` if not a full day late.
    pub fn fine_cents(&self, due_date: DateTime<Utc>, as_of: DateTime<Utc>) -> Option<i64> {
        let days = self.days_late(due_date, as_of);
        if days > 0 {
            Some(days.saturating_mul(self.daily_fine_cents))
        } else {
            None
        }
    }
}

/// Copies left once open loans and pending reservations are subtracted, floored at zero.
pub fn available_copies(total_copies: i32, open_loans: u64, pending_reservations: u64) -> i64 {
    let held = open_loans.saturating_add(pending_reservations);
    let held = i64::try_from(held).unwrap_or(i64::MAX);
    (i64::from(total_copies) - held).max(0)
}

/// Renders cents as a decimal amount with two places, e.g. `2500` as `"25.00"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn ten_days_late_costs_twenty_five() {
        let policy = LendingPolicy::default();
        let due = at(2025, 1, 1, 0);
        let today = at(2025, 1, 11, 0);
        assert_eq!(policy.days_late(due, today), 10);
        assert_eq!(policy.fine_cents(due, today), Some(2500));
        assert_eq!(format_cents(2500), "25.00");
    }

    #[test]
    fn partial_days_round_down() {
        let policy = LendingPolicy::default();
        let due = at(2025, 1, 1, 12);
        assert_eq!(policy.days_late(due, at(2025, 1, 2, 11)), 0);
        assert_eq!(policy.fine_cents(due, at(2025, 1, 2, 11)), None);
        assert_eq!(policy.days_late(due, at(2025, 1, 3, 12)), 2);
        assert_eq!(policy.days_late(due, at(2025, 1, 1, 0)), -1);
    }

    #[test]
    fn no_fine_before_due_date() {
        let policy = LendingPolicy::default();
        let due = at(2025, 3, 10, 0);
        assert_eq!(policy.fine_cents(due, at(2025, 3, 1, 0)), None);
        assert_eq!(policy.fine_cents(due, at(2025, 3, 10, 23)), None);
    }

    #[test]
    fn periods_follow_policy() {
        let policy = LendingPolicy {
            loan_days: 7,
            reservation_days: 1,
            daily_fine_cents: 100,
        };
        let start = at(2025, 5, 1, 9);
        assert_eq!(policy.due_date_from(start), at(2025, 5, 8, 9));
        assert_eq!(policy.reservation_expiry_from(start), at(2025, 5, 2, 9));
        assert_eq!(LendingPolicy::default().due_date_from(start), at(2025, 5, 15, 9));
    }

    #[test]
    fn availability_never_negative() {
        assert_eq!(available_copies(3, 1, 1), 1);
        assert_eq!(available_copies(1, 0, 1), 0);
        assert_eq!(available_copies(1, 2, 3), 0);
        assert_eq!(available_copies(0, 0, 0), 0);
        assert_eq!(available_copies(2, u64::MAX, u64::MAX), 0);
    }

    #[test]
    fn cents_formatting() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(12345), "123.45");
        assert_eq!(format_cents(-250), "-2.50");
    }
}
