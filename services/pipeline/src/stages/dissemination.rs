//! Publish the day's maps and figures to the configured destination.

use async_trait::async_trait;
use ocean_common::{PipelineError, PipelineResult};
use tracing::info;

use super::{RunContext, Stage, StageKind};
use crate::collaborators::dissemination::collect_products;

pub struct DisseminationStage;

#[async_trait]
impl Stage for DisseminationStage {
    fn kind(&self) -> StageKind {
        StageKind::Dissemination
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let destination = ctx.config.stages.destination;
        let Some(login) = ctx.credentials.for_destination(destination)? else {
            info!("No dissemination destination configured");
            return Ok(());
        };
        let disseminator = ctx
            .collaborators
            .disseminator
            .as_ref()
            .ok_or_else(|| PipelineError::Config(format!("no uploader for destination {}", destination.as_str())))?;

        let output_dir = ctx.paths.output_dir();
        let maps_dir = ctx.paths.maps_dir();
        let files = collect_products(&[&output_dir, &maps_dir])?;
        if files.is_empty() {
            return Err(PipelineError::missing_input(output_dir, "nothing to publish"));
        }

        let prefix = format!("{}/{}", ctx.config.experiment, ctx.config.window.date_stamp());
        let published = disseminator.publish(&prefix, &files, login, &ctx.cancel).await?;
        info!(files = published, destination = destination.as_str(), prefix = %prefix, "Products disseminated");
        Ok(())
    }
}
