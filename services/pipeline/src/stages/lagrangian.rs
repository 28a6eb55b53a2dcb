//! Lagrangian diagnostics through the external trajectory tool.

use async_trait::async_trait;
use ocean_common::paths::ensure_dir;
use ocean_common::{PipelineError, PipelineResult};
use tracing::info;

use super::{RunContext, Stage, StageKind};
use crate::collaborators::TrajectoryRequest;

pub struct LagrangianStage;

#[async_trait]
impl Stage for LagrangianStage {
    fn kind(&self) -> StageKind {
        StageKind::Lagrangian
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let settings = ctx
            .config
            .lagrangian
            .as_ref()
            .ok_or_else(|| PipelineError::Config("lagrangian diagnostics are not configured".into()))?;
        let tool = ctx
            .collaborators
            .trajectory
            .as_ref()
            .ok_or_else(|| PipelineError::Config("no trajectory tool available".into()))?;

        let output_dir = ctx.paths.output_dir();
        if !output_dir.is_dir() {
            return Err(PipelineError::missing_input(output_dir, "no post-processed maps to advect"));
        }
        let results_dir = ctx.paths.lagrangian_dir();
        ensure_dir(&results_dir)?;

        let request = TrajectoryRequest {
            output_dir,
            results_dir,
            bbox: ctx.config.bbox,
            numdays: settings.numdays,
            bathy_level: settings.bathy_level,
            final_date: ctx.config.window.final_date,
        };
        tool.run(&request, &ctx.cancel).await?;
        info!(results_dir = %request.results_dir.display(), numdays = settings.numdays, "Lagrangian diagnostics written");
        Ok(())
    }
}
