//! Per-track RMSE of two candidate fields against along-track observations.

use field_processor::FieldSampler;
use ocean_common::{CellValue, GriddedField, PipelineError, PipelineResult, TrackObservation};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The two fields compared against every track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Candidate {
    /// Pipeline output.
    Model,
    /// Unassimilated merged reference product.
    Reference,
}

impl Candidate {
    pub const ALL: [Candidate; 2] = [Candidate::Model, Candidate::Reference];

    pub fn as_str(&self) -> &'static str {
        match self {
            Candidate::Model => "model",
            Candidate::Reference => "reference",
        }
    }
}

/// Error of one candidate on one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackScore {
    /// `None` when no sample of the track had a valid interpolated value.
    pub rmse: Option<f64>,
    /// Samples that entered the RMSE.
    pub samples: usize,
}

impl TrackScore {
    pub fn no_coverage(&self) -> bool {
        self.rmse.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmseRecord {
    pub track_id: String,
    pub model: TrackScore,
    pub reference: TrackScore,
}

impl RmseRecord {
    pub fn score(&self, candidate: Candidate) -> &TrackScore {
        match candidate {
            Candidate::Model => &self.model,
            Candidate::Reference => &self.reference,
        }
    }
}

/// Aggregate over all tracks for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    /// Tracks with a defined RMSE.
    pub scored: usize,
    /// Tracks without coverage.
    pub flagged: usize,
    pub sum: f64,
    pub mean: Option<f64>,
    pub total_samples: usize,
}

impl CandidateSummary {
    /// Summarise per-track scores. Independent of their order.
    pub fn from_scores<'a>(scores: impl IntoIterator<Item = &'a TrackScore>) -> Self {
        let mut values = Vec::new();
        let mut flagged = 0;
        let mut total_samples = 0;
        for score in scores {
            total_samples += score.samples;
            match score.rmse {
                Some(rmse) => values.push(rmse),
                None => flagged += 1,
            }
        }
        // Summing in sorted order keeps the float result order-independent.
        values.sort_by(f64::total_cmp);
        let sum: f64 = values.iter().sum();
        let scored = values.len();

        Self {
            scored,
            flagged,
            sum,
            mean: (scored > 0).then(|| sum / scored as f64),
            total_samples,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub model: CandidateSummary,
    pub reference: CandidateSummary,
}

impl ValidationSummary {
    pub fn from_records(records: &[RmseRecord]) -> Self {
        Self {
            model: CandidateSummary::from_scores(records.iter().map(|r| &r.model)),
            reference: CandidateSummary::from_scores(records.iter().map(|r| &r.reference)),
        }
    }

    pub fn candidate(&self, candidate: Candidate) -> &CandidateSummary {
        match candidate {
            Candidate::Model => &self.model,
            Candidate::Reference => &self.reference,
        }
    }
}

/// Observed and interpolated series along one track, for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackComparison {
    pub track_id: String,
    pub time: Vec<f64>,
    pub observed: Vec<f64>,
    pub model: Vec<Option<f64>>,
    pub reference: Vec<Option<f64>>,
}

/// Interpolates both candidate fields onto track samples.
pub struct AlongTrackValidator<'a> {
    model: FieldSampler<'a>,
    reference: FieldSampler<'a>,
}

impl<'a> AlongTrackValidator<'a> {
    /// Fails when a field lacks the named variable.
    pub fn new(
        model: &'a GriddedField,
        model_variable: &str,
        reference: &'a GriddedField,
        reference_variable: &str,
    ) -> PipelineResult<Self> {
        let model = FieldSampler::new(model, model_variable).ok_or_else(|| {
            PipelineError::Data(format!("model field has no variable {}", model_variable))
        })?;
        let reference = FieldSampler::new(reference, reference_variable).ok_or_else(|| {
            PipelineError::Data(format!("reference field has no variable {}", reference_variable))
        })?;
        Ok(Self { model, reference })
    }

    fn sampler(&self, candidate: Candidate) -> &FieldSampler<'a> {
        match candidate {
            Candidate::Model => &self.model,
            Candidate::Reference => &self.reference,
        }
    }

    /// RMSE of one candidate over the track's measured samples. Samples that
    /// fall outside the field or on masked cells are excluded.
    pub fn track_score(&self, candidate: Candidate, track: &TrackObservation) -> TrackScore {
        let sampler = self.sampler(candidate);
        let mut sum_sq = 0.0;
        let mut samples = 0usize;
        for s in track.measured() {
            let (CellValue::Valid(value), Some(observed)) = (sampler.sample(s.time, s.lat, s.lon), s.ssh) else {
                continue;
            };
            let diff = value - observed;
            sum_sq += diff * diff;
            samples += 1;
        }
        TrackScore {
            rmse: (samples > 0).then(|| (sum_sq / samples as f64).sqrt()),
            samples,
        }
    }

    pub fn score_track(&self, track: &TrackObservation) -> RmseRecord {
        RmseRecord {
            track_id: track.id.clone(),
            model: self.track_score(Candidate::Model, track),
            reference: self.track_score(Candidate::Reference, track),
        }
    }

    /// Score every track in parallel; records keep the input order.
    pub fn score_tracks(&self, tracks: &[TrackObservation]) -> Vec<RmseRecord> {
        let records: Vec<RmseRecord> = tracks.par_iter().map(|t| self.score_track(t)).collect();
        for record in records.iter() {
            for candidate in Candidate::ALL {
                let score = record.score(candidate);
                if score.no_coverage() {
                    debug!(
                        track = %record.track_id,
                        candidate = candidate.as_str(),
                        "Track has no coverage"
                    );
                }
            }
        }
        records
    }

    /// Per-sample series of one track.
    pub fn compare(&self, track: &TrackObservation) -> TrackComparison {
        let mut comparison = TrackComparison {
            track_id: track.id.clone(),
            time: Vec::new(),
            observed: Vec::new(),
            model: Vec::new(),
            reference: Vec::new(),
        };
        for s in track.measured() {
            let Some(observed) = s.ssh else { continue };
            comparison.time.push(s.time);
            comparison.observed.push(observed);
            comparison.model.push(self.model.sample(s.time, s.lat, s.lon).valid());
            comparison.reference.push(self.reference.sample(s.time, s.lat, s.lon).valid());
        }
        comparison
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, offset_field, planar_ssh, regular_axis, straight_track, synthetic_field};

    fn truth() -> GriddedField {
        synthetic_field(
            regular_axis(0.0, 86_400.0, 3),
            regular_axis(10.0, 1.0, 6),
            regular_axis(-60.0, 1.0, 6),
            "ssh",
            planar_ssh,
        )
    }

    #[test]
    fn test_rmse_zero_for_identical_field() {
        let model = truth();
        let reference = offset_field(&model, "ssh", "adt", 0.1);
        let validator = AlongTrackValidator::new(&model, "ssh", &reference, "adt").unwrap();
        let track = straight_track("pass", (1000.0, -59.5, 10.5), (90_000.0, -55.5, 14.5), 20, planar_ssh);

        let record = validator.score_track(&track);
        assert_eq!(record.model.samples, 20);
        assert_approx_eq!(record.model.rmse.unwrap(), 0.0, 1e-12);
        assert_approx_eq!(record.reference.rmse.unwrap(), 0.1, 1e-12);
    }

    #[test]
    fn test_out_of_hull_samples_are_excluded() {
        let model = truth();
        let validator = AlongTrackValidator::new(&model, "ssh", &model, "ssh").unwrap();
        // Half the pass lies east of the grid.
        let track = straight_track("pass", (1000.0, -58.0, 12.0), (2000.0, -50.0, 12.0), 9, |_, _, _| 0.0);
        let score = validator.track_score(Candidate::Model, &track);
        assert_eq!(score.samples, 4);
        assert!(score.rmse.unwrap() > 0.0);
    }

    #[test]
    fn test_track_without_coverage_is_flagged() {
        let model = truth();
        let validator = AlongTrackValidator::new(&model, "ssh", &model, "ssh").unwrap();
        let track = straight_track("far", (0.0, 10.0, -40.0), (10.0, 11.0, -39.0), 5, |_, _, _| 1.0);
        let record = validator.score_track(&track);
        assert!(record.model.no_coverage());
        assert_eq!(record.model.samples, 0);
    }

    #[test]
    fn test_summary_flags_and_means() {
        let score = |rmse: Option<f64>, samples| TrackScore { rmse, samples };
        let scores = [score(Some(1.0), 3), score(None, 0), score(Some(3.0), 5)];
        let summary = CandidateSummary::from_scores(scores.iter());
        assert_eq!(summary.scored, 2);
        assert_eq!(summary.flagged, 1);
        assert_eq!(summary.sum, 4.0);
        assert_eq!(summary.mean, Some(2.0));
        assert_eq!(summary.total_samples, 8);

        let empty = CandidateSummary::from_scores([score(None, 0)].iter());
        assert_eq!(empty.mean, None);
        assert_eq!(empty.sum, 0.0);
    }

    #[test]
    fn test_summary_is_order_independent() {
        let values = [0.1, 1e-17, 0.7, 1e9, 0.3, 2.5e-3];
        let scores: Vec<TrackScore> = values
            .iter()
            .map(|&v| TrackScore { rmse: Some(v), samples: 1 })
            .collect();
        let reversed: Vec<TrackScore> = scores.iter().rev().copied().collect();
        assert_eq!(
            CandidateSummary::from_scores(scores.iter()),
            CandidateSummary::from_scores(reversed.iter())
        );
    }

    #[test]
    fn test_parallel_scoring_keeps_order() {
        let model = truth();
        let validator = AlongTrackValidator::new(&model, "ssh", &model, "ssh").unwrap();
        let tracks: Vec<TrackObservation> = (0..50)
            .map(|k| {
                straight_track(&format!("t{:02}", k), (0.0, -59.0, 11.0), (100.0, -58.0, 12.0), 4, planar_ssh)
            })
            .collect();
        let records = validator.score_tracks(&tracks);
        let ids: Vec<&str> = records.iter().map(|r| r.track_id.as_str()).collect();
        let expected: Vec<String> = (0..50).map(|k| format!("t{:02}", k)).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_compare_series() {
        let model = truth();
        let validator = AlongTrackValidator::new(&model, "ssh", &model, "ssh").unwrap();
        let track = straight_track("pass", (1000.0, -58.0, 12.0), (2000.0, -50.0, 12.0), 9, planar_ssh);
        let cmp = validator.compare(&track);
        assert_eq!(cmp.time.len(), 9);
        assert!(cmp.model[0].is_some());
        assert!(cmp.model[8].is_none());
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let model = truth();
        assert!(AlongTrackValidator::new(&model, "adt", &model, "ssh").is_err());
    }
}
