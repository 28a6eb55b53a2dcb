//! Geographic bounding box of the mapping domain.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// A geographic bounding box in degrees.
///
/// Longitudes may use either the [-180, 180) or the [0, 360) convention;
/// point tests wrap the query longitude into the box's own convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    /// Create a bounding box without validation.
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        }
    }

    /// Create a bounding box, rejecting non-finite or inverted extents.
    pub fn validated(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> PipelineResult<Self> {
        let bbox = Self::new(lon_min, lon_max, lat_min, lat_max);
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check the extents are finite, ordered and inside the globe.
    pub fn validate(&self) -> PipelineResult<()> {
        let values = [self.lon_min, self.lon_max, self.lat_min, self.lat_max];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Config(format!(
                "bounding box has non-finite extent: {}",
                self.to_arg_string()
            )));
        }
        if self.lon_min >= self.lon_max {
            return Err(PipelineError::Config(format!(
                "lon_min ({}) must be smaller than lon_max ({})",
                self.lon_min, self.lon_max
            )));
        }
        if self.lat_min >= self.lat_max {
            return Err(PipelineError::Config(format!(
                "lat_min ({}) must be smaller than lat_max ({})",
                self.lat_min, self.lat_max
            )));
        }
        if self.lat_min < -90.0 || self.lat_max > 90.0 {
            return Err(PipelineError::Config(format!(
                "latitudes must lie within [-90, 90], got [{}, {}]",
                self.lat_min, self.lat_max
            )));
        }
        if self.lon_max - self.lon_min > 360.0 {
            return Err(PipelineError::Config(format!(
                "longitude span exceeds 360 degrees: [{}, {}]",
                self.lon_min, self.lon_max
            )));
        }
        Ok(())
    }

    /// Parse a `lon_min,lon_max,lat_min,lat_max` string.
    pub fn from_arg_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Format as `lon_min,lon_max,lat_min,lat_max`, the inverse of `from_arg_string`.
    pub fn to_arg_string(&self) -> String {
        format!(
            "{},{},{},{}",
            self.lon_min, self.lon_max, self.lat_min, self.lat_max
        )
    }

    /// The extents as the `(lon_min, lon_max, lat_min, lat_max)` 4-tuple.
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.lon_min, self.lon_max, self.lat_min, self.lat_max)
    }

    /// Longitudinal extent in degrees.
    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    /// Latitudinal extent in degrees.
    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Grow the box by `margin` degrees on every side, clamping latitudes to the poles.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            lon_min: self.lon_min - margin,
            lon_max: self.lon_max + margin,
            lat_min: (self.lat_min - margin).max(-90.0),
            lat_max: (self.lat_max + margin).min(90.0),
        }
    }

    /// Closed containment test; the longitude is wrapped into the box's convention.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        if !lon.is_finite() || !lat.is_finite() {
            return false;
        }
        let lon = wrap_longitude(lon, self.lon_min);
        lon <= self.lon_max && lat >= self.lat_min && lat <= self.lat_max
    }
}

/// Wrap `lon` into the half-open 360 degree range starting at `reference_min`.
pub fn wrap_longitude(lon: f64, reference_min: f64) -> f64 {
    (lon - reference_min).rem_euclid(360.0) + reference_min
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bounding box format: {0}. Expected 'lon_min,lon_max,lat_min,lat_max'")]
    InvalidFormat(String),

    #[error("Invalid number in bounding box: {0}")]
    InvalidNumber(String),
}
