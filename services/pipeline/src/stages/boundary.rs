//! Build the filled boundary forcing from the merged L4 product.

use async_trait::async_trait;
use field_processor::{fill_field, subset_bbox};
use netcdf_io::{read_gridded_field, write_gridded_field};
use ocean_common::paths::ensure_dir;
use ocean_common::{GriddedField, PipelineError, PipelineResult};
use tracing::info;

use super::{blocking, check_cancelled, RunContext, Stage, StageKind};

pub struct BoundaryStage;

#[async_trait]
impl Stage for BoundaryStage {
    fn kind(&self) -> StageKind {
        StageKind::BoundaryFill
    }

    async fn run(&self, ctx: &RunContext) -> PipelineResult<()> {
        let spec = ctx.config.reference_dataset().ok_or_else(|| {
            PipelineError::Config(format!("reference dataset {} is not in the manifest", ctx.config.reference_l4))
        })?;
        let files = ctx.present_files(spec);
        if files.is_empty() {
            return Err(PipelineError::missing_input(
                ctx.paths.dataset_dir(&spec.id),
                "no merged L4 file matches the run window",
            ));
        }

        let backend = ctx.backend.clone();
        let config = ctx.config.clone();
        let output = ctx.paths.filled_boundary_file();
        let target = output.clone();
        let file_count = files.len();
        let cancel = ctx.cancel.clone();

        let shape = blocking(move || {
            let variable = config.boundary.variable.as_str();
            let fields = files
                .iter()
                .map(|path| read_gridded_field(backend.as_ref(), path, &[variable]).map_err(PipelineError::from))
                .collect::<PipelineResult<Vec<GriddedField>>>()?;
            let joined = GriddedField::concat_time(fields)?;
            if joined.variable(variable).is_none() {
                return Err(PipelineError::Data(format!("merged L4 files carry no variable {}", variable)));
            }

            let domain = config.bbox.expand(config.boundary.margin_deg);
            let subset = subset_bbox(&joined, &domain)?;
            let filled = fill_field(&subset, variable, config.boundary.extrapolation_radius)?;

            check_cancelled(&cancel)?;
            if let Some(dir) = target.parent() {
                ensure_dir(dir)?;
            }
            write_gridded_field(backend.as_ref(), &target, &filled)?;
            Ok(filled.shape())
        })
        .await?;

        info!(
            files = file_count,
            shape = ?shape,
            path = %output.display(),
            "Boundary forcing written"
        );
        Ok(())
    }
}
