//! Along-track validation of the post-processed maps against the merged
//! reference product.

use std::path::{Path, PathBuf};

use alongtrack::{sample_tracks, AlongTrackValidator, Candidate, ValidationReport};
use async_trait::async_trait;
use netcdf_io::{read_gridded_field, NetCdfBackend};
use ocean_common::paths::{ensure_dir, list_files_with_prefix};
use ocean_common::{GriddedField, PipelineError, PipelineResult};
use qa_renderer::{render_rmse_chart, render_track_panels, TrackPanel};
use tracing::{info, warn};

use super::postprocess::STATE_VARIABLE;
use super::{blocking, check_cancelled, load_tracks, RunContext, Stage, StageKind};
use crate::metrics;

pub const RMSE_CHART_FILE: &str = "alongtrack_rmse.png";
pub const RANDOM_TRACKS_FILE: &str = "random_tracks.png";
const PANEL_COLUMNS: usize = 5;

pub struct ValidationStage;

/// Read and join candidate files; no file is a `ValidationInput` error for `dir`.
fn load_candidate(
    backend: &dyn NetCdfBackend,
    dir: &Path,
    files: &[PathBuf],
    variable: &str,
) -> PipelineResult<GriddedField> {
    if files.is_empty() {
        return Err(PipelineError::validation_input(dir, "no candidate field for the window"));
    }
    let fields = files
        .iter()
        .map(|path| {
            read_gridded_field(backend, path, &[variable])
                .map_err(|e| PipelineError::validation_input(path, e.to_string()))
        })
        .collect::<PipelineResult<Vec<GriddedField>>>()?;
    GriddedField::concat_time(fields)
}

#[async_trait]
impl Stage for ValidationStage {
    fn kind(&self) -> StageKind {
        StageKind::Validation
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let output_dir = ctx.paths.output_dir();
        let model_files: Vec<PathBuf> = list_files_with_prefix(&output_dir, &format!("{}_", ctx.config.experiment))?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "nc"))
            .collect();
        let (reference_dir, reference_files) = match ctx.config.reference_dataset() {
            Some(spec) => (ctx.paths.dataset_dir(&spec.id), ctx.present_files(spec)),
            None => (ctx.paths.input_dir(), Vec::new()),
        };
        let track_files = ctx.track_files()?;

        let backend = ctx.backend.clone();
        let config = ctx.config.clone();
        let scratch = ctx.paths.scratch_dir();
        let maps_dir = ctx.paths.maps_dir();
        let report_path = ctx.paths.rmse_report_file();
        let chart_path = ctx.paths.map_file(RMSE_CHART_FILE);
        let panels_path = ctx.paths.map_file(RANDOM_TRACKS_FILE);
        let cancel = ctx.cancel.clone();

        let report = blocking(move || {
            let backend = backend.as_ref();
            let model = load_candidate(backend, &output_dir, &model_files, STATE_VARIABLE)?;
            let reference = load_candidate(backend, &reference_dir, &reference_files, &config.boundary.variable)?;

            let tracks = load_tracks(backend, &track_files, &config);
            if tracks.is_empty() {
                return Err(PipelineError::validation_input(
                    scratch,
                    "no readable track inside the domain and window",
                ));
            }

            let validator = AlongTrackValidator::new(&model, STATE_VARIABLE, &reference, &config.boundary.variable)?;
            let records = validator.score_tracks(&tracks);
            let report = ValidationReport::new(
                &config.experiment,
                config.window.init_date,
                config.window.final_date,
                records,
            );

            check_cancelled(&cancel)?;
            ensure_dir(&maps_dir)?;
            report.write_json(&report_path)?;

            let series = |c: Candidate| report.records.iter().map(|r| r.score(c).rmse).collect::<Vec<_>>();
            match render_rmse_chart(&series(Candidate::Model), &series(Candidate::Reference)) {
                Ok(png) => std::fs::write(&chart_path, png)?,
                Err(e) => warn!(error = %e, "RMSE chart not drawn"),
            }

            let panels: Vec<TrackPanel> = sample_tracks(&tracks, config.validation.qa_sample_size, config.validation.seed)
                .into_iter()
                .map(|track| {
                    let c = validator.compare(track);
                    TrackPanel {
                        time: c.time,
                        observed: c.observed,
                        model: c.model,
                        reference: c.reference,
                    }
                })
                .collect();
            match render_track_panels(&panels, PANEL_COLUMNS) {
                Ok(png) => std::fs::write(&panels_path, png)?,
                Err(e) => warn!(error = %e, "Random track panels not drawn"),
            }
            Ok(report)
        })
        .await?;

        metrics::record_tracks_scored(report.records.len());
        let model = report.summary.candidate(Candidate::Model);
        let reference = report.summary.candidate(Candidate::Reference);
        info!(
            tracks = report.records.len(),
            model_scored = model.scored,
            model_flagged = model.flagged,
            model_mean_rmse = ?model.mean,
            reference_scored = reference.scored,
            reference_mean_rmse = ?reference.mean,
            path = %ctx.paths.rmse_report_file().display(),
            "Along-track validation finished"
        );
        Ok(())
    }
}
