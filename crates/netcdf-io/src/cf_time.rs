//! CF-convention time units (`<unit> since <reference>`).

use ocean_common::time::{parse_timestamp, to_epoch_seconds};

use crate::error::{NetCdfError, NetCdfResult};

/// Units written for every time axis produced by the pipeline.
pub const EPOCH_SECONDS_UNITS: &str = "seconds since 1970-01-01 00:00:00";

/// A parsed CF time unit: value `v` means `reference + v * scale` seconds
/// since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfTimeUnits {
    pub scale: f64,
    pub reference: f64,
}

impl CfTimeUnits {
    pub fn parse(units: &str) -> NetCdfResult<Self> {
        let lower = units.trim().to_ascii_lowercase();
        let (unit, since) = lower
            .split_once(" since ")
            .ok_or_else(|| NetCdfError::InvalidFormat(format!("not a CF time unit: '{}'", units)))?;

        let scale = match unit.trim() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600.0,
            "days" | "day" | "d" => 86_400.0,
            other => {
                return Err(NetCdfError::InvalidFormat(format!(
                    "unsupported time unit '{}'",
                    other
                )))
            }
        };

        // Reference strings come in many shapes: "1950-01-01", "1950-01-01 00:00:00",
        // "1950-01-01T00:00:00Z", sometimes with a trailing "utc".
        let since = since.trim().trim_end_matches("utc").trim();
        let since = since.to_ascii_uppercase();
        let reference = parse_timestamp(&since)
            .or_else(|_| parse_timestamp(since.trim_end_matches('Z')))
            .map_err(|_| {
                NetCdfError::InvalidFormat(format!("unparseable time reference in '{}'", units))
            })?;

        Ok(Self {
            scale,
            reference: to_epoch_seconds(reference),
        })
    }

    pub fn to_epoch(&self, value: f64) -> f64 {
        self.reference + value * self.scale
    }

    pub fn from_epoch(&self, seconds: f64) -> f64 {
        (seconds - self.reference) / self.scale
    }
}
