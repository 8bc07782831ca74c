#![forbid(unsafe_code)]

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Unix seconds for a UTC timestamp.
#[inline]
pub fn unix_seconds(t: DateTime<Utc>) -> i64 {
	t.timestamp()
}

/// UTC timestamp from stored unix seconds.
#[inline]
pub fn from_unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
	DateTime::from_timestamp(secs, 0)
}

/// UTC bounds `[start, end)` of the local calendar day containing `now`.
pub fn local_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
	let date = now.with_timezone(&Local).date_naive();
	let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
	(local_midnight_utc(date), local_midnight_utc(next))
}

fn local_midnight_utc(date: NaiveDate) -> DateTime<Utc> {
	// Midnight can be skipped by a DST jump; probe forward an hour at a time.
	for hour in 0..=3u64 {
		let naive = date.and_time(NaiveTime::MIN) + chrono::Duration::hours(hour as i64);
		if let Some(local) = Local.from_local_datetime(&naive).earliest() {
			return local.with_timezone(&Utc);
		}
	}
	date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn day_bounds_cover_now_and_span_a_day() {
		let now = Utc::now();
		let (start, end) = local_day_bounds(now);
		assert!(start <= now && now < end);

		let span = end - start;
		// 23..25h tolerates DST transitions.
		assert!(span >= chrono::Duration::hours(23) && span <= chrono::Duration::hours(25));
	}

	#[test]
	fn unix_seconds_round_trip() {
		let now = Utc::now();
		let secs = unix_seconds(now);
		let back = from_unix_seconds(secs).unwrap();
		assert_eq!(back.timestamp(), now.timestamp());
	}
}
