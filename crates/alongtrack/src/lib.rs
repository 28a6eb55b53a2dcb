//! Along-track validation.
//!
//! Both the pipeline's sea-surface height maps and the merged reference
//! product are interpolated onto the exact (time, lon, lat) of independent
//! satellite samples and scored per track by RMSE. Samples outside a field or
//! on masked cells never enter a score, and a track with no usable sample is
//! flagged rather than counted as zero error.

pub mod report;
pub mod sampling;
pub mod validator;

pub use report::ValidationReport;
pub use sampling::sample_tracks;
pub use validator::{
    AlongTrackValidator, Candidate, CandidateSummary, RmseRecord, TrackComparison, TrackScore,
    ValidationSummary,
};
