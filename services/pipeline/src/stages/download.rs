//! Fetch every manifest file for the window into the dated input directory.

use async_trait::async_trait;
use ocean_common::paths::ensure_dir;
use ocean_common::{DatasetKind, PipelineError, PipelineResult};
use tracing::{debug, info, warn};

use super::{RunContext, Stage, StageKind};
use crate::config::DatasetSpec;
use crate::metrics;

pub struct DownloadStage;

/// Files of one dataset after the stage ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DatasetTally {
    present: usize,
    downloaded: usize,
    failed: usize,
}

impl DownloadStage {
    async fn fetch_dataset(&self, ctx: &RunContext, spec: &DatasetSpec) -> PipelineResult<DatasetTally> {
        let dir = ctx.paths.dataset_dir(&spec.id);
        ensure_dir(&dir)?;

        let login = ctx.credentials.for_provider(spec.provider);
        if login.is_none() {
            warn!(dataset = %spec.id, provider = spec.provider.as_str(), "No credentials for provider, downloading anonymously");
        }
        let base = ctx.config.source_url(spec.provider).trim_end_matches('/');

        let mut tally = DatasetTally::default();
        for (day, name) in spec.expected_files(&ctx.config.window) {
            let dest = dir.join(&name);
            if dest.is_file() {
                debug!(path = %dest.display(), "Already present, skipping");
                tally.present += 1;
                continue;
            }
            let url = format!("{}/{}/{}", base, spec.id, name);
            match ctx.collaborators.downloader.fetch(&url, login, &dest, &ctx.cancel).await {
                Ok(bytes) => {
                    debug!(dataset = %spec.id, day = %day, bytes = bytes, "Fetched");
                    metrics::record_download(&spec.id);
                    tally.present += 1;
                    tally.downloaded += 1;
                }
                Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    warn!(dataset = %spec.id, day = %day, error = %e, "Download failed");
                    tally.failed += 1;
                }
            }
        }
        Ok(tally)
    }
}

#[async_trait]
impl Stage for DownloadStage {
    fn kind(&self) -> StageKind {
        StageKind::Download
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let mut along_track_present = 0;
        let mut along_track_datasets = 0;

        for spec in &ctx.config.datasets {
            let tally = self.fetch_dataset(ctx, spec).await?;
            info!(
                dataset = %spec.id,
                present = tally.present,
                downloaded = tally.downloaded,
                failed = tally.failed,
                "Dataset ready"
            );

            if spec.required && tally.present < spec.min_files {
                return Err(PipelineError::missing_input(
                    ctx.paths.dataset_dir(&spec.id),
                    format!(
                        "{} has {} file(s) for the window, at least {} required",
                        spec.id, tally.present, spec.min_files
                    ),
                ));
            }
            if spec.kind != DatasetKind::MergedL4 {
                along_track_datasets += 1;
                along_track_present += tally.present;
            }
        }

        if along_track_datasets > 0 && along_track_present == 0 {
            return Err(PipelineError::missing_input(
                ctx.paths.input_dir(),
                "no along-track observation file for the window",
            ));
        }
        Ok(())
    }
}
