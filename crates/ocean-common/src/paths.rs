//! On-disk directory convention keyed by experiment and date.
//!
//! ```text
//! input_<exp>/<YYYYMMDD>/<dataset-id>/*.nc
//! input_<exp>/<YYYYMMDD>/duacs_l4_filled.nc
//! output_<exp>/<YYYYMMDD>/*.nc
//! scratch/<exp>/obs*
//! scratch/<exp>/state/
//! maps_<exp>/<YYYYMMDD>/*.png
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::PipelineResult;
use crate::time::date_stamp;

pub const FILLED_BOUNDARY_FILE: &str = "duacs_l4_filled.nc";
pub const RMSE_REPORT_FILE: &str = "alongtrack_rmse.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePaths {
    root: PathBuf,
    experiment: String,
    date: NaiveDate,
}

impl StagePaths {
    pub fn new(root: impl Into<PathBuf>, experiment: &str, date: NaiveDate) -> Self {
        Self {
            root: root.into(),
            experiment: experiment.to_string(),
            date,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root
            .join(format!("input_{}", self.experiment))
            .join(date_stamp(self.date))
    }

    pub fn dataset_dir(&self, dataset_id: &str) -> PathBuf {
        self.input_dir().join(dataset_id)
    }

    pub fn filled_boundary_file(&self) -> PathBuf {
        self.input_dir().join(FILLED_BOUNDARY_FILE)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root
            .join(format!("output_{}", self.experiment))
            .join(date_stamp(self.date))
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch").join(&self.experiment)
    }

    /// Raw sub-daily assimilation output.
    pub fn state_dir(&self) -> PathBuf {
        self.scratch_dir().join("state")
    }

    pub fn maps_dir(&self) -> PathBuf {
        self.root
            .join(format!("maps_{}", self.experiment))
            .join(date_stamp(self.date))
    }

    pub fn lagrangian_dir(&self) -> PathBuf {
        self.maps_dir().join("lagrangian")
    }

    pub fn rmse_report_file(&self) -> PathBuf {
        self.maps_dir().join(RMSE_REPORT_FILE)
    }

    pub fn map_file(&self, name: &str) -> PathBuf {
        self.maps_dir().join(name)
    }
}

/// Create a directory and its parents if missing.
pub fn ensure_dir(path: &Path) -> PipelineResult<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Regular files in `dir` with the given extension, sorted by name.
/// A missing directory yields an empty list.
pub fn list_files_with_extension(dir: &Path, extension: &str) -> PipelineResult<Vec<PathBuf>> {
    list_files(dir, |path| {
        path.extension().and_then(|e| e.to_str()) == Some(extension)
    })
}

/// Regular files in `dir` whose name starts with `prefix`, sorted by name.
pub fn list_files_with_prefix(dir: &Path, prefix: &str) -> PipelineResult<Vec<PathBuf>> {
    list_files(dir, |path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix))
    })
}

fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> PipelineResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
