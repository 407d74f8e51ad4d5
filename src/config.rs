use std::env;

use anyhow::Context;

use crate::{domain::LendingPolicy, scheduler::SweepSchedule};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub policy: LendingPolicy,
    pub sweep_schedule: SweepSchedule,
    pub sweeps_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parsed_or("APP_PORT", 3000);
        let jwt_ttl_hours = parsed_or("JWT_TTL_HOURS", 3);

        let defaults = LendingPolicy::default();
        let policy = LendingPolicy {
            loan_days: positive_or("LOAN_DAYS", defaults.loan_days)?,
            reservation_days: positive_or("RESERVATION_DAYS", defaults.reservation_days)?,
            daily_fine_cents: positive_or("DAILY_FINE_CENTS", defaults.daily_fine_cents)?,
        };

        let sweep_schedule = match env::var("SWEEP_AT") {
            Ok(raw) => SweepSchedule::parse(&raw)
                .with_context(|| format!("SWEEP_AT must be HH:MM, got {raw:?}"))?,
            Err(_) => SweepSchedule::default(),
        };
        let sweeps_enabled = parsed_or("SWEEPS_ENABLED", true);

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours,
            policy,
            sweep_schedule,
            sweeps_enabled,
        })
    }
}

fn positive_or(key: &str, default: i64) -> anyhow::Result<i64> {
    parse_positive(key, env::var(key).ok().as_deref(), default)
}

/// A set value must parse and be greater than zero; unset falls back to `default`.
fn parse_positive(key: &str, raw: Option<&str>, default: i64) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be an integer, got {raw:?}"))?;
    anyhow::ensure!(value > 0, "{key} must be positive, got {value}");
    Ok(value)
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lending_values_must_be_positive_integers() {
        assert_eq!(parse_positive("LOAN_DAYS", None, 14).unwrap(), 14);
        assert_eq!(parse_positive("LOAN_DAYS", Some(" 21 "), 14).unwrap(), 21);

        let err = parse_positive("DAILY_FINE_CENTS", Some("-250"), 250).unwrap_err();
        assert!(err.to_string().contains("DAILY_FINE_CENTS must be positive"));
        assert!(parse_positive("LOAN_DAYS", Some("-3"), 14).is_err());
        assert!(parse_positive("RESERVATION_DAYS", Some("0"), 3).is_err());

        let err = parse_positive("LOAN_DAYS", Some("two weeks"), 14).unwrap_err();
        assert!(err.to_string().contains("LOAN_DAYS must be an integer"));
    }
}
