//! Daily (or sub-daily) averages of the raw state with derived currents.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Duration;
use field_processor::{average_by_interval, derive_geostrophy, subset_time};
use netcdf_io::{read_gridded_field, write_gridded_field};
use ocean_common::paths::{ensure_dir, list_files_with_extension};
use ocean_common::time::{day_start, from_epoch_seconds, to_epoch_seconds};
use ocean_common::{GriddedField, PipelineError, PipelineResult};
use tracing::info;

use super::{blocking, check_cancelled, RunContext, Stage, StageKind};

/// Surface height variable of the engine's state files.
pub const STATE_VARIABLE: &str = "ssh";

pub struct PostProcessStage;

/// `<exp>_<YYYYMMDD>T<HH>.nc` for a bin starting at `start` (epoch seconds).
pub fn product_file_name(experiment: &str, start: f64) -> PipelineResult<String> {
    let t = from_epoch_seconds(start)
        .ok_or_else(|| PipelineError::Data(format!("bin start {} is not a valid time", start)))?;
    Ok(format!("{}_{}.nc", experiment, t.format("%Y%m%dT%H")))
}

#[async_trait]
impl Stage for PostProcessStage {
    fn kind(&self) -> StageKind {
        StageKind::PostProcess
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let state_dir = ctx.paths.state_dir();
        let files = list_files_with_extension(&state_dir, "nc")?;
        if files.is_empty() {
            return Err(PipelineError::missing_input(&state_dir, "no raw state file to post-process"));
        }

        let backend = ctx.backend.clone();
        let config = ctx.config.clone();
        let output_dir = ctx.paths.output_dir();
        let cancel = ctx.cancel.clone();

        let written: Vec<PathBuf> = blocking(move || {
            let fields = files
                .iter()
                .map(|path| read_gridded_field(backend.as_ref(), path, &[STATE_VARIABLE]).map_err(PipelineError::from))
                .collect::<PipelineResult<Vec<GriddedField>>>()?;
            let state = GriddedField::concat_time(fields)?;

            let end_day = config.window.final_date + Duration::days(1);
            let start_day = end_day - Duration::days(i64::from(config.postprocess_days));
            let recent = subset_time(
                &state,
                to_epoch_seconds(day_start(start_day)),
                to_epoch_seconds(day_start(end_day)),
            )?;
            if recent.time.is_empty() {
                return Err(PipelineError::missing_input(
                    &state_dir,
                    format!("no state between {} and {}", start_day, config.window.final_date),
                ));
            }

            let averaged = average_by_interval(&recent, config.averaging_interval_hours)?;
            let derived = derive_geostrophy(&averaged, STATE_VARIABLE)?.attach_to(&averaged)?;

            ensure_dir(&output_dir)?;
            let width = f64::from(config.averaging_interval_hours) * 3600.0;
            let mut written = Vec::with_capacity(derived.time.len());
            for &start in derived.time.values() {
                check_cancelled(&cancel)?;
                let bin = subset_time(&derived, start, start + width)?;
                let path = output_dir.join(product_file_name(&config.experiment, start)?);
                write_gridded_field(backend.as_ref(), &path, &bin)?;
                written.push(path);
            }
            Ok(written)
        })
        .await?;

        info!(
            files = written.len(),
            output_dir = %ctx.paths.output_dir().display(),
            "Post-processed maps written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::epoch;

    #[test]
    fn test_product_file_name() {
        let start = epoch(2024, 1, 11) + 6.0 * 3600.0;
        assert_eq!(product_file_name("eurec4a", start).unwrap(), "eurec4a_20240111T06.nc");
        assert!(product_file_name("eurec4a", f64::NAN).is_err());
    }
}
