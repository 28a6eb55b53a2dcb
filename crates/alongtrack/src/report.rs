//! JSON report of an along-track validation run.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use ocean_common::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

use crate::validator::{RmseRecord, ValidationSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub experiment: String,
    pub date: NaiveDate,
    pub init_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub summary: ValidationSummary,
    pub records: Vec<RmseRecord>,
}

impl ValidationReport {
    pub fn new(experiment: &str, init_date: NaiveDate, date: NaiveDate, records: Vec<RmseRecord>) -> Self {
        Self {
            experiment: experiment.to_string(),
            date,
            init_date,
            generated_at: Utc::now(),
            summary: ValidationSummary::from_records(&records),
            records,
        }
    }

    pub fn write_json(&self, path: &Path) -> PipelineResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| PipelineError::Data(format!("failed to encode report: {}", e)))
    }

    pub fn read_json(path: &Path) -> PipelineResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader)
            .map_err(|e| PipelineError::Data(format!("failed to decode report {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::TrackScore;
    use test_utils::{date, temp_test_dir};

    #[test]
    fn test_report_file_keeps_uncovered_tracks_as_null() {
        let records = vec![
            RmseRecord {
                track_id: "a".into(),
                model: TrackScore { rmse: Some(0.02), samples: 10 },
                reference: TrackScore { rmse: Some(0.05), samples: 10 },
            },
            RmseRecord {
                track_id: "b".into(),
                model: TrackScore { rmse: None, samples: 0 },
                reference: TrackScore { rmse: Some(0.01), samples: 3 },
            },
        ];
        let report = ValidationReport::new("exp", date(2024, 1, 1), date(2024, 1, 11), records);
        assert_eq!(report.summary.model.flagged, 1);

        let dir = temp_test_dir();
        let path = dir.path().join("alongtrack_rmse.json");
        report.write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"rmse\": null"));
        let back = ValidationReport::read_json(&path).unwrap();
        assert_eq!(back.records.len(), 2);
        assert_eq!(back.records[1].model.rmse, None);
        assert_eq!(back.date, report.date);
        assert_eq!(back.summary.reference.scored, 2);
    }
}
