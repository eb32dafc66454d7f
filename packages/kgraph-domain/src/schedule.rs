use std::str::FromStr;

use cron::Schedule;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::node::RefreshPolicy;

/// Resolves the next due instant for a [`RefreshPolicy`]. `cron` wins over
/// `interval_seconds` when both are set. `cron`'s `Schedule` speaks
/// `chrono::DateTime<Utc>`, while the rest of the workspace speaks
/// `time::OffsetDateTime`; this function is the only place that crosses
/// between the two.
pub fn next_due(policy: &RefreshPolicy, since: OffsetDateTime) -> Result<Option<OffsetDateTime>> {
	if let Some(expr) = &policy.cron {
		let schedule = Schedule::from_str(expr).map_err(|e| Error::InvalidCron(e.to_string()))?;
		let since_chrono = to_chrono(since);
		return Ok(schedule.after(&since_chrono).next().map(from_chrono));
	}
	if let Some(interval) = policy.interval_seconds {
		if interval <= 0 {
			return Err(Error::Validation("interval_seconds must be positive".into()));
		}
		return Ok(Some(since + time::Duration::seconds(interval)));
	}
	Ok(None)
}

fn to_chrono(value: OffsetDateTime) -> chrono::DateTime<chrono::Utc> {
	let unix_nanos = value.unix_timestamp_nanos();
	chrono::DateTime::from_timestamp(
		(unix_nanos / 1_000_000_000) as i64,
		(unix_nanos.rem_euclid(1_000_000_000)) as u32,
	)
	.unwrap_or_default()
}

fn from_chrono(value: chrono::DateTime<chrono::Utc>) -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp_nanos(value.timestamp_nanos_opt().unwrap_or_default() as i128)
		.unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cron_wins_over_interval() {
		let policy = RefreshPolicy {
			interval_seconds: Some(60),
			cron: Some("0 0 * * * *".to_string()),
			drift_threshold: None,
		};
		let since = OffsetDateTime::from_unix_timestamp(0).unwrap();
		let due = next_due(&policy, since).unwrap();
		assert!(due.is_some());
	}

	#[test]
	fn falls_back_to_interval_without_cron() {
		let policy = RefreshPolicy { interval_seconds: Some(120), cron: None, drift_threshold: None };
		let since = OffsetDateTime::from_unix_timestamp(0).unwrap();
		let due = next_due(&policy, since).unwrap().unwrap();
		assert_eq!(due, since + time::Duration::seconds(120));
	}

	#[test]
	fn invalid_cron_is_rejected() {
		let policy = RefreshPolicy { interval_seconds: None, cron: Some("not a cron".into()), drift_threshold: None };
		let since = OffsetDateTime::from_unix_timestamp(0).unwrap();
		assert!(next_due(&policy, since).is_err());
	}
}
