//! Overview maps of the run: where the domain sits, and the along-track
//! observations used inside it.

use async_trait::async_trait;
use ocean_common::paths::ensure_dir;
use ocean_common::{PipelineError, PipelineResult};
use qa_renderer::{render_domain_locator, render_observation_map, ObservationPoint};
use tracing::info;

use super::{blocking, check_cancelled, load_tracks, RunContext, Stage, StageKind};

pub const OBSERVATION_MAP_FILE: &str = "L3_data_map.png";
pub const DOMAIN_LOCATOR_FILE: &str = "domain_location.png";
/// Degrees of surroundings shown around the domain on the locator.
const LOCATOR_PAD_DEG: f64 = 20.0;

pub struct ObservationsStage;

#[async_trait]
impl Stage for ObservationsStage {
    fn kind(&self) -> StageKind {
        StageKind::DrawObservations
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let files = ctx.track_files()?;
        let backend = ctx.backend.clone();
        let config = ctx.config.clone();
        let scratch = ctx.paths.scratch_dir();
        let target = ctx.paths.map_file(OBSERVATION_MAP_FILE);
        let locator = ctx.paths.map_file(DOMAIN_LOCATOR_FILE);
        let maps_dir = ctx.paths.maps_dir();
        let cancel = ctx.cancel.clone();

        let points = blocking(move || {
            // Drawn first so it exists even when no track is usable.
            let png = render_domain_locator(&config.bbox, LOCATOR_PAD_DEG)
                .map_err(|e| PipelineError::Data(format!("domain locator: {}", e)))?;
            check_cancelled(&cancel)?;
            ensure_dir(&maps_dir)?;
            std::fs::write(&locator, png)?;

            let tracks = load_tracks(backend.as_ref(), &files, &config);
            if tracks.is_empty() {
                return Err(PipelineError::missing_input(scratch, "no readable track inside the domain and window"));
            }
            let points: Vec<ObservationPoint> = tracks
                .iter()
                .flat_map(|t| t.measured())
                .filter_map(|s| s.ssh.map(|ssh| ObservationPoint { lon: s.lon, lat: s.lat, ssh }))
                .collect();
            let png = render_observation_map(&points, &config.bbox)
                .map_err(|e| PipelineError::Data(format!("observation map: {}", e)))?;
            check_cancelled(&cancel)?;
            std::fs::write(&target, png)?;
            Ok(points.len())
        })
        .await?;

        info!(points, path = %ctx.paths.map_file(OBSERVATION_MAP_FILE).display(), "Observation map written");
        Ok(())
    }
}
