//! Run window resolution and time conversion helpers.
//!
//! Gridded fields and tracks carry time as seconds since the Unix epoch
//! (`f64`), which keeps the interpolation code free of calendar types.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// The calendar window covered by one daily run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunWindow {
    pub init_date: NaiveDate,
    pub final_date: NaiveDate,
}

impl RunWindow {
    /// Resolve the window, rejecting a final date before the initial date.
    pub fn resolve(init_date: NaiveDate, final_date: NaiveDate) -> PipelineResult<Self> {
        if final_date < init_date {
            return Err(PipelineError::Config(format!(
                "final date {} is before initial date {}",
                final_date, init_date
            )));
        }
        Ok(Self {
            init_date,
            final_date,
        })
    }

    /// Window of `days` whole days ending at `final_date`.
    pub fn trailing(final_date: NaiveDate, days: u32) -> PipelineResult<Self> {
        let init_date = final_date
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| {
                PipelineError::Config(format!("{} days before {} is out of range", days, final_date))
            })?;
        Self::resolve(init_date, final_date)
    }

    /// Whole days between the initial and final date.
    pub fn day_count(&self) -> i64 {
        (self.final_date - self.init_date).num_days()
    }

    /// Every calendar day from the initial to the final date, both included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.init_date
            .iter_days()
            .take_while(move |d| *d <= self.final_date)
    }

    /// `YYYYMMDD` stamp of the final date, used in directory names.
    pub fn date_stamp(&self) -> String {
        date_stamp(self.final_date)
    }

    /// Start of the window (initial date, 00:00 UTC).
    pub fn start(&self) -> DateTime<Utc> {
        day_start(self.init_date)
    }

    /// Exclusive end of the window (day after the final date, 00:00 UTC).
    pub fn end(&self) -> DateTime<Utc> {
        day_start(self.final_date) + Duration::days(1)
    }

    /// Half-open containment test on a UTC instant.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start() && t < self.end()
    }

    /// Half-open containment test on epoch seconds.
    pub fn contains_epoch(&self, seconds: f64) -> bool {
        seconds.is_finite()
            && seconds >= to_epoch_seconds(self.start())
            && seconds < to_epoch_seconds(self.end())
    }
}

/// `YYYYMMDD` formatting of a calendar date.
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Midnight UTC of a calendar date.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn to_epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9
}

/// Convert epoch seconds back to a UTC instant, rounded to the millisecond.
pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Parse a date given as `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}

/// Parse a timestamp given as RFC 3339, a naive `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    parse_date(s).map(day_start)
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}
