//! The external Lagrangian trajectory tool.

use async_trait::async_trait;
use ocean_common::time::date_stamp;
use ocean_common::PipelineResult;
use tokio_util::sync::CancellationToken;

use super::process::run_command;
use super::{TrajectoryRequest, TrajectoryTool};
use crate::config::ExternalCommand;

pub struct ExternalTrajectoryTool {
    command: ExternalCommand,
}

impl ExternalTrajectoryTool {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }

    pub fn environment(request: &TrajectoryRequest) -> Vec<(String, String)> {
        vec![
            ("OCEAN_OUTPUT_DIR".into(), request.output_dir.display().to_string()),
            ("OCEAN_RESULTS_DIR".into(), request.results_dir.display().to_string()),
            ("OCEAN_BBOX".into(), request.bbox.to_arg_string()),
            ("OCEAN_NUMDAYS".into(), request.numdays.to_string()),
            ("OCEAN_BATHY_LEVEL".into(), request.bathy_level.to_string()),
            ("OCEAN_FINAL_DATE".into(), date_stamp(request.final_date)),
        ]
    }
}

#[async_trait]
impl TrajectoryTool for ExternalTrajectoryTool {
    async fn run(&self, request: &TrajectoryRequest, cancel: &CancellationToken) -> PipelineResult<()> {
        let envs = Self::environment(request);
        run_command("lagrangian", &self.command.argv, &envs, self.command.timeout, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{date, test_bbox};

    #[test]
    fn test_environment() {
        let request = TrajectoryRequest {
            output_dir: "/work/output_exp/20240111".into(),
            results_dir: "/work/maps_exp/20240111/lagrangian".into(),
            bbox: test_bbox(),
            numdays: 30,
            bathy_level: -1000.0,
            final_date: date(2024, 1, 11),
        };
        let envs = ExternalTrajectoryTool::environment(&request);
        let get = |k: &str| envs.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
        assert_eq!(get("OCEAN_NUMDAYS").as_deref(), Some("30"));
        assert_eq!(get("OCEAN_BATHY_LEVEL").as_deref(), Some("-1000"));
        assert_eq!(get("OCEAN_BBOX"), Some(test_bbox().to_arg_string()));
        assert_eq!(get("OCEAN_FINAL_DATE").as_deref(), Some("20240111"));
    }
}
