//! Along-track satellite observations.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::time::RunWindow;

/// One along-track measurement. `time` is in epoch seconds; `ssh` is `None`
/// where the file holds a fill value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    pub time: f64,
    pub lon: f64,
    pub lat: f64,
    pub ssh: Option<f64>,
}

/// The samples of one satellite pass, read once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackObservation {
    pub id: String,
    pub samples: Vec<TrackSample>,
}

impl TrackObservation {
    pub fn new(id: impl Into<String>, samples: Vec<TrackSample>) -> Self {
        Self {
            id: id.into(),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Copy keeping only samples inside the bounding box and run window.
    pub fn restrict(&self, bbox: &BoundingBox, window: &RunWindow) -> TrackObservation {
        let samples = self
            .samples
            .iter()
            .filter(|s| bbox.contains_point(s.lon, s.lat) && window.contains_epoch(s.time))
            .copied()
            .collect();
        TrackObservation {
            id: self.id.clone(),
            samples,
        }
    }

    /// Samples carrying a measured height.
    pub fn measured(&self) -> impl Iterator<Item = &TrackSample> {
        self.samples.iter().filter(|s| s.ssh.is_some_and(f64::is_finite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{day_start, to_epoch_seconds};
    use chrono::NaiveDate;

    #[test]
    fn test_restrict_filters_space_and_time() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let window = RunWindow::resolve(day(1), day(2)).unwrap();
        let inside = to_epoch_seconds(day_start(day(2)));
        let after = to_epoch_seconds(day_start(day(3)));
        let bbox = BoundingBox::new(-65.0, -47.0, 5.0, 22.0);

        let track = TrackObservation::new(
            "obs_1",
            vec![
                TrackSample { time: inside, lon: -60.0, lat: 10.0, ssh: Some(0.1) },
                TrackSample { time: inside, lon: 300.0, lat: 10.0, ssh: None },
                TrackSample { time: after, lon: -60.0, lat: 10.0, ssh: Some(0.2) },
                TrackSample { time: inside, lon: -10.0, lat: 10.0, ssh: Some(0.3) },
            ],
        );

        let restricted = track.restrict(&bbox, &window);
        assert_eq!(restricted.len(), 2);
        assert_eq!(restricted.measured().count(), 1);
        assert_eq!(track.len(), 4);
    }
}
