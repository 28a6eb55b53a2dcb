//! Common test fixtures for pipeline tests.
//!
//! This module provides the fixed domain, run dates and scratch directory
//! trees that most tests share.

use chrono::NaiveDate;
use ocean_common::time::{day_start, to_epoch_seconds};
use ocean_common::{BoundingBox, RunWindow, StagePaths};

/// Experiment name used throughout the tests.
pub const EXPERIMENT: &str = "test_exp";

/// Calendar date shorthand for tests.
///
/// # Panics
///
/// On an invalid date.
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Epoch seconds at midnight UTC of a date.
pub fn epoch(y: i32, m: u32, d: u32) -> f64 {
    to_epoch_seconds(day_start(date(y, m, d)))
}

/// Western tropical Atlantic box used by the tests.
pub fn test_bbox() -> BoundingBox {
    BoundingBox::new(-65.0, -47.0, 5.0, 22.0)
}

/// The ten-day window 2024-01-01 to 2024-01-11.
pub fn test_window() -> RunWindow {
    RunWindow::resolve(date(2024, 1, 1), date(2024, 1, 11)).expect("valid window")
}

/// A scratch directory tree with the stage layout of [`EXPERIMENT`] on the
/// final date of [`test_window`]. Removed on drop.
pub struct TestWorkspace {
    pub dir: tempfile::TempDir,
    pub paths: StagePaths,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = temp_test_dir();
        let paths = StagePaths::new(dir.path(), EXPERIMENT, test_window().final_date);
        Self { dir, paths }
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}
