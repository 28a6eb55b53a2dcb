//! The external data-assimilation engine.

use async_trait::async_trait;
use ocean_common::paths::list_files_with_extension;
use ocean_common::time::date_stamp;
use ocean_common::{PipelineError, PipelineResult};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::process::run_command;
use super::{AssimilationEngine, AssimilationRequest};
use crate::config::ExternalCommand;

/// Runs the configured engine command. The run is described to it through
/// `OCEAN_*` environment variables.
pub struct ExternalCommandEngine {
    command: ExternalCommand,
}

impl ExternalCommandEngine {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }

    pub fn environment(request: &AssimilationRequest) -> Vec<(String, String)> {
        vec![
            ("OCEAN_EXPERIMENT".into(), request.experiment.clone()),
            ("OCEAN_INIT_DATE".into(), date_stamp(request.window.init_date)),
            ("OCEAN_FINAL_DATE".into(), date_stamp(request.window.final_date)),
            ("OCEAN_BOUNDARY_FILE".into(), request.boundary_file.display().to_string()),
            ("OCEAN_INPUT_DIR".into(), request.input_dir.display().to_string()),
            ("OCEAN_STATE_DIR".into(), request.state_dir.display().to_string()),
            ("OCEAN_SCRATCH_DIR".into(), request.scratch_dir.display().to_string()),
        ]
    }
}

#[async_trait]
impl AssimilationEngine for ExternalCommandEngine {
    async fn run(&self, request: &AssimilationRequest, cancel: &CancellationToken) -> PipelineResult<()> {
        let envs = Self::environment(request);
        run_command("assimilation", &self.command.argv, &envs, self.command.timeout, cancel).await?;

        let produced = list_files_with_extension(&request.state_dir, "nc")?;
        if produced.is_empty() {
            return Err(PipelineError::missing_input(
                &request.state_dir,
                "assimilation finished without writing any state file",
            ));
        }
        info!(files = produced.len(), state_dir = %request.state_dir.display(), "Assimilation produced state files");
        Ok(())
    }
}
