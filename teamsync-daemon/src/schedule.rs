//! Run schedule parsing.
//!
//! Accepted forms:
//! - 5-field cron (`min hour dom month dow`), run at second 0
//! - 6/7-field cron with a leading seconds field (and optional year)
//! - aliases: `@hourly`, `@daily`, `@weekly`, `@monthly`, `@yearly`
//! - `@every <duration>`, e.g. `@every 90s`, `@every 1h30m`

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{schedule_err, DaemonError};

const EVERY_PREFIX: &str = "@every";

#[derive(Debug, Clone)]
pub enum Schedule {
    Cron(Box<cron::Schedule>),
    Every(Duration),
}

impl Schedule {
    pub fn parse(expr: &str) -> Result<Self, DaemonError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(schedule_err(expr, "empty expression"));
        }

        if let Some(rest) = trimmed.strip_prefix(EVERY_PREFIX) {
            return parse_interval(rest.trim())
                .map(Schedule::Every)
                .ok_or_else(|| schedule_err(expr, "expected @every <n><h|m|s>..."));
        }

        let normalized = if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_owned()
        };
        cron::Schedule::from_str(&normalized)
            .map(|s| Schedule::Cron(Box::new(s)))
            .map_err(|e| schedule_err(expr, e.to_string()))
    }

    /// Time to wait from `now` until the next trigger. `None` when a cron
    /// schedule has no future occurrence.
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Schedule::Every(interval) => Some(*interval),
            Schedule::Cron(schedule) => {
                let next = schedule.after(&now).next()?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schedule::parse(s)
    }
}

/// `1h30m`, `45s`, `10m`. Zero is rejected.
fn parse_interval(text: &str) -> Option<Duration> {
    if text.is_empty() {
        return None;
    }
    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let unit = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        let n: u64 = digits.parse().ok()?;
        total = total.checked_add(n.checked_mul(unit)?)?;
        digits.clear();
    }
    if !digits.is_empty() || total == 0 {
        return None;
    }
    Some(Duration::from_secs(total))
}
