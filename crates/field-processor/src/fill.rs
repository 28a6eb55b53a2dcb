//! Coastal gap filling of the merged reference product.
//!
//! Masked cells next to valid ones are filled by iterative 4-neighbour mean
//! dilation: on every pass, each masked cell with at least one valid
//! 4-neighbour (as of the previous pass) takes the mean of those neighbours.
//! After `radius` passes, cells that are still masked stay masked.

use ocean_common::{GriddedField, PipelineError, PipelineResult};
use rayon::prelude::*;
use tracing::debug;

/// Fill one (ny * nx) slice, row-major with longitude fastest.
pub fn fill_slice(data: &[Option<f64>], ny: usize, nx: usize, radius: usize) -> Vec<Option<f64>> {
    let mut current: Vec<Option<f64>> = data
        .iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();

    for _ in 0..radius {
        let mut next = current.clone();
        let mut changed = false;

        for j in 0..ny {
            for i in 0..nx {
                let idx = j * nx + i;
                if current[idx].is_some() {
                    continue;
                }
                let mut sum = 0.0;
                let mut count = 0usize;
                let neighbours = [
                    (j > 0).then(|| idx - nx),
                    (j + 1 < ny).then(|| idx + nx),
                    (i > 0).then(|| idx - 1),
                    (i + 1 < nx).then(|| idx + 1),
                ];
                for n in neighbours.into_iter().flatten() {
                    if let Some(v) = current[n] {
                        sum += v;
                        count += 1;
                    }
                }
                if count > 0 {
                    next[idx] = Some(sum / count as f64);
                    changed = true;
                }
            }
        }

        current = next;
        if !changed {
            break;
        }
    }
    current
}

/// Fill every time slice of `variable` in parallel.
pub fn fill_field(field: &GriddedField, variable: &str, radius: usize) -> PipelineResult<GriddedField> {
    let data = field
        .variable(variable)
        .ok_or_else(|| PipelineError::Data(format!("field has no variable {}", variable)))?;
    let (_, ny, nx) = field.shape();
    let plane = ny * nx;

    let filled: Vec<Option<f64>> = if plane == 0 {
        Vec::new()
    } else {
        data.par_chunks(plane)
            .map(|slice| fill_slice(slice, ny, nx, radius))
            .collect::<Vec<_>>()
            .concat()
    };

    let before = data.iter().filter(|v| v.is_none()).count();
    let after = filled.iter().filter(|v| v.is_none()).count();
    debug!(variable, radius, masked_before = before, masked_after = after, "Filled coastal gaps");

    let mut out = field.clone();
    out.insert_variable(variable, filled)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{mask_cells, synthetic_field};

    #[test]
    fn test_single_hole_takes_neighbour_mean() {
        #[rustfmt::skip]
        let data = vec![
            Some(1.0), Some(2.0), Some(3.0),
            Some(4.0), None,      Some(6.0),
            Some(7.0), Some(8.0), Some(9.0),
        ];
        let filled = fill_slice(&data, 3, 3, 1);
        assert_eq!(filled[4], Some((2.0 + 4.0 + 6.0 + 8.0) / 4.0));
        assert_eq!(&filled[..4], &data[..4]);
    }

    #[test]
    fn test_cells_beyond_radius_stay_masked() {
        let data = vec![Some(1.0), None, None, None, None];
        let filled = fill_slice(&data, 1, 5, 2);
        assert_eq!(filled, vec![Some(1.0), Some(1.0), Some(1.0), None, None]);
    }

    #[test]
    fn test_no_valid_cells_stays_masked() {
        let data = vec![None; 9];
        assert_eq!(fill_slice(&data, 3, 3, 10), data);
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let data = vec![Some(0.0), None, Some(2.0)];
        assert_eq!(fill_slice(&data, 1, 3, 0), data);
    }

    #[test]
    fn test_zero_is_a_valid_value() {
        let data = vec![Some(0.0), None, Some(0.0)];
        assert_eq!(fill_slice(&data, 1, 3, 1), vec![Some(0.0); 3]);
    }

    #[test]
    fn test_fill_field_per_time_slice() {
        let mut field = synthetic_field(
            vec![0.0, 1.0],
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0, 2.0],
            "adt",
            |t, _, _| t + 1.0,
        );
        mask_cells(&mut field, "adt", &[(0, 1, 1), (1, 1, 1)]);
        let filled = fill_field(&field, "adt", 3).unwrap();
        assert_eq!(filled.cell("adt", 0, 1, 1).valid(), Some(1.0));
        assert_eq!(filled.cell("adt", 1, 1, 1).valid(), Some(2.0));
        assert!(fill_field(&field, "ssh", 3).is_err());
    }
}
