//! The processing stages of a daily run.
//!
//! Every stage reads what earlier stages left under the [`StagePaths`]
//! layout and writes its own products there. Numerical work runs on the
//! blocking pool so the runtime stays free to observe cancellation.

pub mod assimilation;
pub mod boundary;
pub mod dissemination;
pub mod download;
pub mod lagrangian;
pub mod observations;
pub mod postprocess;
pub mod validation;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use netcdf_io::{read_track, NetCdfBackend};
use ocean_common::paths::list_files_with_prefix;
use ocean_common::{PipelineError, PipelineResult, StagePaths, TrackObservation};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::collaborators::{AssimilationEngine, Disseminator, Downloader, TrajectoryTool};
use crate::config::{DatasetSpec, RunConfig};
use crate::credentials::Credentials;

pub use assimilation::AssimilationStage;
pub use boundary::BoundaryStage;
pub use dissemination::DisseminationStage;
pub use download::DownloadStage;
pub use lagrangian::LagrangianStage;
pub use observations::ObservationsStage;
pub use postprocess::PostProcessStage;
pub use validation::ValidationStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Download,
    BoundaryFill,
    Assimilation,
    DrawObservations,
    PostProcess,
    Validation,
    Lagrangian,
    Dissemination,
}

impl StageKind {
    /// Execution order.
    pub const ALL: [StageKind; 8] = [
        StageKind::Download,
        StageKind::BoundaryFill,
        StageKind::Assimilation,
        StageKind::DrawObservations,
        StageKind::PostProcess,
        StageKind::Validation,
        StageKind::Lagrangian,
        StageKind::Dissemination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Download => "download",
            StageKind::BoundaryFill => "boundary_fill",
            StageKind::Assimilation => "assimilation",
            StageKind::DrawObservations => "draw_observations",
            StageKind::PostProcess => "postprocess",
            StageKind::Validation => "validation",
            StageKind::Lagrangian => "lagrangian",
            StageKind::Dissemination => "dissemination",
        }
    }

    /// A required stage failing aborts the run.
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            StageKind::Download | StageKind::BoundaryFill | StageKind::Assimilation | StageKind::PostProcess
        )
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The external collaborators a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub downloader: Arc<dyn Downloader>,
    pub engine: Arc<dyn AssimilationEngine>,
    pub trajectory: Option<Arc<dyn TrajectoryTool>>,
    pub disseminator: Option<Arc<dyn Disseminator>>,
}

/// Everything a stage may use. Cheap to clone.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub config: Arc<RunConfig>,
    pub paths: StagePaths,
    pub credentials: Arc<Credentials>,
    pub backend: Arc<dyn NetCdfBackend>,
    pub collaborators: Collaborators,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        config: Arc<RunConfig>,
        credentials: Arc<Credentials>,
        backend: Arc<dyn NetCdfBackend>,
        collaborators: Collaborators,
        cancel: CancellationToken,
    ) -> Self {
        let paths = StagePaths::new(&config.work_dir, &config.experiment, config.window.final_date);
        Self {
            run_id: Uuid::new_v4(),
            config,
            paths,
            credentials,
            backend,
            collaborators,
            cancel,
        }
    }

    /// Manifest files of `spec` that exist on disk, in date order.
    pub fn present_files(&self, spec: &DatasetSpec) -> Vec<PathBuf> {
        let dir = self.paths.dataset_dir(&spec.id);
        spec.expected_files(&self.config.window)
            .into_iter()
            .map(|(_, name)| dir.join(name))
            .filter(|path| path.is_file())
            .collect()
    }

    /// Track files named by the configuration, or every file in the scratch
    /// directory carrying the track prefix.
    pub fn track_files(&self) -> PipelineResult<Vec<PathBuf>> {
        let scratch = self.paths.scratch_dir();
        let validation = &self.config.validation;
        if validation.track_files.is_empty() {
            list_files_with_prefix(&scratch, &validation.track_prefix)
        } else {
            Ok(validation.track_files.iter().map(|f| scratch.join(f)).collect())
        }
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()>;
}

/// The stage implementation for `kind`.
pub fn stage_for(kind: StageKind) -> Box<dyn Stage> {
    match kind {
        StageKind::Download => Box::new(DownloadStage),
        StageKind::BoundaryFill => Box::new(BoundaryStage),
        StageKind::Assimilation => Box::new(AssimilationStage),
        StageKind::DrawObservations => Box::new(ObservationsStage),
        StageKind::PostProcess => Box::new(PostProcessStage),
        StageKind::Validation => Box::new(ValidationStage),
        StageKind::Lagrangian => Box::new(LagrangianStage),
        StageKind::Dissemination => Box::new(DisseminationStage),
    }
}

/// Run CPU-bound work on the blocking pool.
///
/// The closure is not aborted when the awaiting stage is cancelled or times
/// out; closures that write products call [`check_cancelled`] first.
pub async fn blocking<T, F>(f: F) -> PipelineResult<T>
where
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Data(format!("worker task failed: {}", e)))?
}

/// `Cancelled` once the run's token has fired.
pub fn check_cancelled(cancel: &CancellationToken) -> PipelineResult<()> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

/// Read track files restricted to the run's domain and window. Missing or
/// unreadable files are skipped with a warning; empty tracks are dropped.
pub fn load_tracks(
    backend: &dyn NetCdfBackend,
    files: &[PathBuf],
    config: &RunConfig,
) -> Vec<TrackObservation> {
    let mut tracks = Vec::new();
    for path in files {
        if !path.is_file() {
            warn!(path = %path.display(), "Track file missing, skipping");
            continue;
        }
        match read_track(backend, path) {
            Ok(track) => {
                let restricted = track.restrict(&config.bbox, &config.window);
                if restricted.measured().next().is_some() {
                    tracks.push(restricted);
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Unreadable track file, skipping"),
        }
    }
    tracks
}
