//! Daily ocean-surface-topography pipeline.
//!
//! One invocation runs one (experiment, date): download the altimetry
//! inputs, build the boundary forcing, run the assimilation engine,
//! post-process its state into daily maps, validate them along independent
//! tracks, and optionally compute Lagrangian diagnostics and publish the
//! products.

pub mod collaborators;
pub mod config;
pub mod credentials;
pub mod metrics;
pub mod orchestrator;
pub mod stages;

use std::sync::Arc;

use ocean_common::PipelineResult;

use crate::collaborators::{
    Disseminator, ExternalCommandEngine, ExternalTrajectoryTool, HttpDownloader, HttpsDisseminator, TrajectoryTool,
};
use crate::config::RunConfig;
use crate::stages::Collaborators;

pub use config::{ConfigOverrides, RawConfig};
pub use credentials::Credentials;
pub use orchestrator::{Orchestrator, PipelineState, RunSummary, StageFailure, StagePlan};
pub use stages::{RunContext, StageKind};

/// The real network clients and external programs for `config`.
pub fn production_collaborators(config: &RunConfig) -> PipelineResult<Collaborators> {
    let downloader = HttpDownloader::new(config.retry, config.request_timeout)?;
    let engine = ExternalCommandEngine::new(config.assimilation.clone());
    let trajectory = config
        .lagrangian
        .as_ref()
        .map(|l| Arc::new(ExternalTrajectoryTool::new(l.command.clone())) as Arc<dyn TrajectoryTool>);
    let disseminator = match &config.dissemination_url {
        Some(url) => Some(
            Arc::new(HttpsDisseminator::new(url.clone(), config.retry, config.request_timeout)?) as Arc<dyn Disseminator>,
        ),
        None => None,
    };
    Ok(Collaborators {
        downloader: Arc::new(downloader),
        engine: Arc::new(engine),
        trajectory,
        disseminator,
    })
}
