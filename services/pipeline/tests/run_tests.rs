//! End-to-end runs of the orchestrator against an in-memory NetCDF backend
//! with mocked network and assimilation collaborators.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use netcdf_io::{write_gridded_field, write_track, MemoryBackend, NetCdfBackend};
use ocean_common::catalog::REFERENCE_L4_DATASET;
use ocean_common::paths::ensure_dir;
use ocean_common::time::{day_start, to_epoch_seconds};
use ocean_common::{PipelineError, PipelineResult};
use ocean_pipeline::collaborators::{AssimilationEngine, AssimilationRequest, Downloader};
use ocean_pipeline::credentials::Login;
use ocean_pipeline::orchestrator::StageOutcome;
use ocean_pipeline::stages::observations::DOMAIN_LOCATOR_FILE;
use ocean_pipeline::stages::validation::RMSE_CHART_FILE;
use ocean_pipeline::stages::{Collaborators, PostProcessStage, Stage, ValidationStage};
use ocean_pipeline::{
    ConfigOverrides, Credentials, Orchestrator, PipelineState, RawConfig, RunContext, StageKind,
};
use test_utils::{epoch, planar_ssh, regular_axis, straight_track, synthetic_field, temp_test_dir};
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
experiment:
  name: test_exp
  init_date: 2024-01-01
  final_date: 2024-01-11
domain:
  lon_min: -65.0
  lon_max: -47.0
  lat_min: 5.0
  lat_max: 22.0
stages:
  draw_l3: true
  make_alongtrack_rmse: true
validation:
  qa_sample_size: 2
  seed: 7
assimilation:
  command: ["unused"]
"#;

/// Same run, with validation reading an explicit track list whose first
/// file is never written.
const LISTED_TRACKS_CONFIG: &str = r#"
experiment:
  name: test_exp
  init_date: 2024-01-01
  final_date: 2024-01-11
domain:
  lon_min: -65.0
  lon_max: -47.0
  lat_min: 5.0
  lat_max: 22.0
stages:
  draw_l3: true
  make_alongtrack_rmse: true
validation:
  qa_sample_size: 2
  seed: 7
  track_files: [obs_missing.nc, obs_0.nc, obs_1.nc, obs_2.nc]
assimilation:
  command: ["unused"]
"#;

/// Serves the merged L4 product as synthetic fields and every along-track
/// product as a placeholder file.
struct MockDownloader {
    backend: Arc<MemoryBackend>,
    missing_reference: bool,
    calls: AtomicU32,
}

fn file_date(dest: &Path) -> Option<NaiveDate> {
    let stem = dest.file_stem()?.to_str()?;
    let stamp = stem.get(stem.len().checked_sub(8)?..)?;
    NaiveDate::parse_from_str(stamp, "%Y%m%d").ok()
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn fetch(
        &self,
        url: &str,
        _login: Option<&Login>,
        dest: &Path,
        _cancel: &CancellationToken,
    ) -> PipelineResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains(REFERENCE_L4_DATASET) {
            if self.missing_reference {
                return Err(PipelineError::missing_input(dest, "HTTP 404"));
            }
            let day = file_date(dest).ok_or_else(|| PipelineError::Data(format!("no date in {}", url)))?;
            let t = to_epoch_seconds(day_start(day));
            let field = synthetic_field(
                vec![t],
                regular_axis(2.0, 1.0, 23),
                regular_axis(-68.0, 1.0, 24),
                "adt",
                planar_ssh,
            );
            write_gridded_field(self.backend.as_ref(), dest, &field)?;
        } else {
            std::fs::write(dest, b"track")?;
        }
        Ok(1)
    }
}

/// Writes six-hourly `ssh` state for every window day and a few observation
/// tracks into scratch.
struct MockEngine {
    backend: Arc<MemoryBackend>,
    write_tracks: bool,
}

#[async_trait]
impl AssimilationEngine for MockEngine {
    async fn run(&self, request: &AssimilationRequest, _cancel: &CancellationToken) -> PipelineResult<()> {
        assert!(request.boundary_file.is_file());
        ensure_dir(&request.state_dir)?;
        ensure_dir(&request.scratch_dir)?;

        for day in request.window.days() {
            let t0 = to_epoch_seconds(day_start(day));
            let field = synthetic_field(
                regular_axis(t0, 6.0 * 3600.0, 4),
                regular_axis(4.0, 0.5, 39),
                regular_axis(-66.0, 0.5, 41),
                "ssh",
                |t, lat, lon| planar_ssh(t, lat, lon) + 0.01,
            );
            let path = request.state_dir.join(format!("state_{}.nc", day.format("%Y%m%d")));
            write_gridded_field(self.backend.as_ref(), &path, &field)?;
        }

        if self.write_tracks {
            for (k, lat0) in [8.0, 11.0, 14.0].into_iter().enumerate() {
                let track = straight_track(
                    &format!("obs_{}", k),
                    (epoch(2024, 1, 3), -60.0, lat0),
                    (epoch(2024, 1, 3) + 600.0, -52.0, lat0 + 5.0),
                    40,
                    planar_ssh,
                );
                let path = request.scratch_dir.join(format!("obs_{}.nc", k));
                write_track(self.backend.as_ref(), &path, &track)?;
            }
        }
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    backend: Arc<MemoryBackend>,
    downloader: Arc<MockDownloader>,
    ctx: RunContext,
    orchestrator: Orchestrator,
}

fn harness(missing_reference: bool, write_tracks: bool, cancel: CancellationToken) -> Harness {
    harness_with(CONFIG, missing_reference, write_tracks, cancel)
}

fn harness_with(yaml: &str, missing_reference: bool, write_tracks: bool, cancel: CancellationToken) -> Harness {
    let dir = temp_test_dir();
    let overrides = ConfigOverrides {
        work_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let config = RawConfig::from_yaml(yaml).unwrap().validate(&overrides, today).unwrap();

    let backend = Arc::new(MemoryBackend::new());
    let downloader = Arc::new(MockDownloader {
        backend: backend.clone(),
        missing_reference,
        calls: AtomicU32::new(0),
    });
    let collaborators = Collaborators {
        downloader: downloader.clone(),
        engine: Arc::new(MockEngine {
            backend: backend.clone(),
            write_tracks,
        }),
        trajectory: None,
        disseminator: None,
    };
    let ctx = RunContext::new(
        Arc::new(config),
        Arc::new(Credentials::new(None, None, None)),
        backend.clone() as Arc<dyn NetCdfBackend>,
        collaborators,
        cancel,
    );
    Harness {
        _dir: dir,
        backend,
        downloader,
        ctx: ctx.clone(),
        orchestrator: Orchestrator::new(ctx),
    }
}

/// Validation that first deletes the downloaded reference maps.
struct ReferenceLostValidation;

#[async_trait]
impl Stage for ReferenceLostValidation {
    fn kind(&self) -> StageKind {
        StageKind::Validation
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let reference = ctx.config.reference_dataset().expect("reference dataset configured");
        for path in ctx.present_files(reference) {
            std::fs::remove_file(path)?;
        }
        ValidationStage.run(ctx).await
    }
}

#[tokio::test]
async fn test_full_run_produces_maps_and_report() {
    let h = harness(false, true, CancellationToken::new());
    let summary = h.orchestrator.execute().await;

    assert_eq!(summary.exit_code(), 0, "{:?}", summary.outcomes);
    assert_eq!(summary.final_state(), PipelineState::Done);
    for kind in [
        StageKind::Download,
        StageKind::BoundaryFill,
        StageKind::Assimilation,
        StageKind::DrawObservations,
        StageKind::PostProcess,
        StageKind::Validation,
    ] {
        assert_eq!(summary.outcome(kind), Some(&StageOutcome::Completed), "{}", kind);
    }
    assert_eq!(summary.outcome(StageKind::Lagrangian), Some(&StageOutcome::Skipped));
    assert_eq!(summary.outcome(StageKind::Dissemination), Some(&StageOutcome::Skipped));

    let paths = h.orchestrator.paths();
    assert!(h.backend.contains(&paths.filled_boundary_file()));

    // One daily map per window day.
    let products: Vec<_> = h
        .backend
        .paths()
        .into_iter()
        .filter(|p| p.starts_with(paths.output_dir()))
        .collect();
    assert_eq!(products.len(), 11);
    assert!(paths.output_dir().join("test_exp_20240101T00.nc").is_file());
    assert!(paths.output_dir().join("test_exp_20240111T00.nc").is_file());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(paths.rmse_report_file()).unwrap()).unwrap();
    assert_eq!(report["records"].as_array().unwrap().len(), 3);
    assert!(paths.map_file(RMSE_CHART_FILE).is_file());
    assert!(paths.map_file(DOMAIN_LOCATOR_FILE).is_file());
}

#[tokio::test]
async fn test_rerun_skips_present_downloads() {
    let h = harness(false, true, CancellationToken::new());
    assert_eq!(h.orchestrator.execute().await.exit_code(), 0);
    let first = h.downloader.calls.load(Ordering::SeqCst);
    assert!(first > 0);

    assert_eq!(h.orchestrator.execute().await.exit_code(), 0);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), first);
}

#[tokio::test]
async fn test_missing_reference_stops_run() {
    let h = harness(true, true, CancellationToken::new());
    let summary = h.orchestrator.execute().await;

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.final_state(), PipelineState::Failed(StageKind::Download));
    assert_eq!(summary.outcome(StageKind::BoundaryFill), Some(&StageOutcome::Skipped));
    assert_eq!(summary.outcome(StageKind::Assimilation), Some(&StageOutcome::Skipped));

    let failure = summary.into_result().unwrap_err();
    assert_eq!(failure.stage, StageKind::Download);
    assert_eq!(failure.experiment, "test_exp");
    assert!(failure
        .resource_path()
        .is_some_and(|p| p.ends_with(REFERENCE_L4_DATASET)));
    assert!(failure.to_string().starts_with("stage download failed for experiment test_exp on 2024-01-11"));
}

#[tokio::test]
async fn test_validation_failure_is_not_fatal() {
    let h = harness(false, false, CancellationToken::new());
    let summary = h.orchestrator.execute().await;

    assert_eq!(summary.exit_code(), 2);
    assert_eq!(summary.final_state(), PipelineState::Done);
    assert_eq!(summary.outcome(StageKind::PostProcess), Some(&StageOutcome::Completed));
    assert!(matches!(summary.outcome(StageKind::Validation), Some(StageOutcome::Failed(_))));
    assert!(matches!(summary.outcome(StageKind::DrawObservations), Some(StageOutcome::Failed(_))));
    assert_eq!(
        summary.optional_failures(),
        vec![StageKind::DrawObservations, StageKind::Validation]
    );
}

#[tokio::test]
async fn test_cancelled_run_stops_at_first_stage() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let h = harness(false, true, cancel);
    let summary = h.orchestrator.execute().await;

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.final_state(), PipelineState::Failed(StageKind::Download));
    assert!(matches!(
        summary.failure.as_ref().map(|f| &f.source),
        Some(PipelineError::Cancelled)
    ));
}

#[tokio::test]
async fn test_missing_reference_candidate_fails_validation_only() {
    let h = harness(false, true, CancellationToken::new());
    let orchestrator = h.orchestrator.with_stage(Box::new(ReferenceLostValidation));
    let summary = orchestrator.execute().await;

    assert_eq!(summary.exit_code(), 2);
    assert_eq!(summary.final_state(), PipelineState::Done);
    assert_eq!(summary.outcome(StageKind::PostProcess), Some(&StageOutcome::Completed));
    match summary.outcome(StageKind::Validation) {
        Some(StageOutcome::Failed(msg)) => {
            assert!(msg.starts_with("Missing validation input"), "{}", msg);
            assert!(msg.contains(REFERENCE_L4_DATASET), "{}", msg);
        }
        other => panic!("validation outcome {:?}", other),
    }
    assert_eq!(summary.optional_failures(), vec![StageKind::Validation]);
    assert!(!orchestrator.paths().rmse_report_file().exists());
}

#[tokio::test]
async fn test_absent_track_file_is_skipped() {
    let h = harness_with(LISTED_TRACKS_CONFIG, false, true, CancellationToken::new());
    let summary = h.orchestrator.execute().await;

    assert_eq!(summary.exit_code(), 0, "{:?}", summary.outcomes);
    assert_eq!(summary.outcome(StageKind::Validation), Some(&StageOutcome::Completed));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(h.orchestrator.paths().rmse_report_file()).unwrap()).unwrap();
    let ids: Vec<&str> = report["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["track_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["obs_0", "obs_1", "obs_2"]);
}

#[tokio::test]
async fn test_cancelled_postprocess_writes_no_product() {
    let h = harness(false, true, CancellationToken::new());
    assert_eq!(h.orchestrator.execute().await.exit_code(), 0);

    let output_dir = h.ctx.paths.output_dir();
    std::fs::remove_dir_all(&output_dir).unwrap();

    let mut ctx = h.ctx.clone();
    ctx.cancel = CancellationToken::new();
    ctx.cancel.cancel();
    let result = PostProcessStage.run(&ctx).await;

    assert!(matches!(result, Err(PipelineError::Cancelled)), "{:?}", result);
    let written = std::fs::read_dir(&output_dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0);
    assert_eq!(written, 0);
}
