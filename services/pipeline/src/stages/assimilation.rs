//! Hand the prepared inputs to the assimilation engine.

use async_trait::async_trait;
use ocean_common::paths::{ensure_dir, list_files_with_extension};
use ocean_common::{PipelineError, PipelineResult};
use tracing::{debug, info};

use super::{RunContext, Stage, StageKind};
use crate::collaborators::AssimilationRequest;

pub struct AssimilationStage;

impl AssimilationStage {
    pub fn request(ctx: &RunContext) -> AssimilationRequest {
        AssimilationRequest {
            experiment: ctx.config.experiment.clone(),
            window: ctx.config.window,
            boundary_file: ctx.paths.filled_boundary_file(),
            input_dir: ctx.paths.input_dir(),
            state_dir: ctx.paths.state_dir(),
            scratch_dir: ctx.paths.scratch_dir(),
        }
    }
}

#[async_trait]
impl Stage for AssimilationStage {
    fn kind(&self) -> StageKind {
        StageKind::Assimilation
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let request = Self::request(ctx);
        if !request.boundary_file.is_file() {
            return Err(PipelineError::missing_input(
                &request.boundary_file,
                "boundary forcing has not been built",
            ));
        }

        // State from an earlier run must not leak into this one.
        ensure_dir(&request.state_dir)?;
        for stale in list_files_with_extension(&request.state_dir, "nc")? {
            debug!(path = %stale.display(), "Removing stale state file");
            std::fs::remove_file(&stale)?;
        }

        ctx.collaborators.engine.run(&request, &ctx.cancel).await?;
        info!(state_dir = %request.state_dir.display(), "Assimilation finished");
        Ok(())
    }
}
