//! External collaborators: the network, the assimilation engine and the
//! trajectory tool. Each sits behind a trait so stages can be exercised with
//! mocks.

pub mod assimilation;
pub mod dissemination;
pub mod download;
pub mod process;
pub mod trajectory;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use ocean_common::{BoundingBox, PipelineResult, RunWindow};
use tokio_util::sync::CancellationToken;

use crate::credentials::Login;

pub use assimilation::ExternalCommandEngine;
pub use dissemination::HttpsDisseminator;
pub use download::{with_retry, HttpDownloader, RetryPolicy};
pub use trajectory::ExternalTrajectoryTool;

/// Fetches one remote file to a local path.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns the number of bytes written. A missing remote file is
    /// `PipelineError::MissingInput`.
    async fn fetch(
        &self,
        url: &str,
        login: Option<&Login>,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> PipelineResult<u64>;
}

/// Everything the assimilation engine is told about a run.
#[derive(Debug, Clone)]
pub struct AssimilationRequest {
    pub experiment: String,
    pub window: RunWindow,
    pub boundary_file: PathBuf,
    pub input_dir: PathBuf,
    pub state_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

#[async_trait]
pub trait AssimilationEngine: Send + Sync {
    /// Runs the inversion, leaving raw state files in `request.state_dir`.
    async fn run(&self, request: &AssimilationRequest, cancel: &CancellationToken) -> PipelineResult<()>;
}

#[derive(Debug, Clone)]
pub struct TrajectoryRequest {
    pub output_dir: PathBuf,
    pub results_dir: PathBuf,
    pub bbox: BoundingBox,
    pub numdays: u32,
    pub bathy_level: f64,
    pub final_date: NaiveDate,
}

#[async_trait]
pub trait TrajectoryTool: Send + Sync {
    async fn run(&self, request: &TrajectoryRequest, cancel: &CancellationToken) -> PipelineResult<()>;
}

/// Publishes finished products.
#[async_trait]
pub trait Disseminator: Send + Sync {
    /// Uploads `files` (relative path, local path) under `prefix`. Returns
    /// the number of files published.
    async fn publish(
        &self,
        prefix: &str,
        files: &[(String, PathBuf)],
        login: &Login,
        cancel: &CancellationToken,
    ) -> PipelineResult<usize>;
}
