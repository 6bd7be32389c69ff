//! Timestamp source for signatures.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestamperError {
    #[error("Invalid timestamper scheme: expected 'system' or 'fixed:<RFC3339>'")]
    InvalidScheme,
    #[error("Invalid fixed timestamp: {0}")]
    InvalidInstant(String),
}

/// Where the signing instant comes from. Instants are truncated to
/// millisecond precision, the precision the record persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamper {
    /// Wall clock (UTC).
    System,
    /// A pinned instant, for reproducible fixtures and replays.
    Fixed(DateTime<Utc>),
}

impl FromStr for Timestamper {
    type Err = TimestamperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "system" {
            Ok(Timestamper::System)
        } else if let Some(ts) = s.strip_prefix("fixed:") {
            let parsed = DateTime::parse_from_rfc3339(ts)
                .map_err(|e| TimestamperError::InvalidInstant(e.to_string()))?;
            Ok(Timestamper::Fixed(parsed.with_timezone(&Utc)))
        } else {
            Err(TimestamperError::InvalidScheme)
        }
    }
}

impl Timestamper {
    pub fn now(&self) -> DateTime<Utc> {
        let instant = match self {
            Timestamper::System => Utc::now(),
            Timestamper::Fixed(ts) => *ts,
        };
        truncate_to_millis(instant)
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_has_millisecond_precision() {
        let ts = Timestamper::System.now();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn fixed_instant_is_truncated() {
        let t: Timestamper = "fixed:2026-01-26T15:30:00.123456Z".parse().unwrap();
        assert_eq!(
            t.now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "2026-01-26T15:30:00.123000Z"
        );
    }
}
