//! Averaging of sub-daily state fields into fixed-length bins.

use ocean_common::{Axis, GriddedField, PipelineError, PipelineResult};
use tracing::debug;

/// Average every variable of `field` into bins of `interval_hours`.
///
/// Bins are aligned on 00:00 UTC and labelled by their start time. Masked
/// samples are ignored; a cell masked in every sample of its bin stays
/// masked. The interval must divide 24 hours.
pub fn average_by_interval(field: &GriddedField, interval_hours: u32) -> PipelineResult<GriddedField> {
    if interval_hours == 0 || 24 % interval_hours != 0 {
        return Err(PipelineError::Data(format!(
            "averaging interval of {} h does not divide a day",
            interval_hours
        )));
    }
    let width = f64::from(interval_hours) * 3600.0;

    // Time axis is non-decreasing, so equal bins are contiguous.
    let mut bins: Vec<(f64, Vec<usize>)> = Vec::new();
    for (k, &t) in field.time.values().iter().enumerate() {
        let start = (t / width).floor() * width;
        match bins.last_mut() {
            Some((label, members)) if *label == start => members.push(k),
            _ => bins.push((start, vec![k])),
        }
    }

    let time = Axis::non_decreasing(bins.iter().map(|(label, _)| *label).collect())?;
    let (_, ny, nx) = field.shape();
    let plane = ny * nx;

    let mut averaged = GriddedField::new(time, field.lat.clone(), field.lon.clone());
    for (name, data) in field.variables() {
        let mut out = Vec::with_capacity(bins.len() * plane);
        for (_, members) in &bins {
            for cell in 0..plane {
                let mut sum = 0.0;
                let mut count = 0usize;
                for &k in members {
                    if let Some(v) = data[k * plane + cell].filter(|v| v.is_finite()) {
                        sum += v;
                        count += 1;
                    }
                }
                out.push((count > 0).then(|| sum / count as f64));
            }
        }
        averaged.insert_variable(name, out)?;
    }

    debug!(
        interval_hours,
        input_steps = field.time.len(),
        bins = bins.len(),
        "Averaged state fields"
    );
    Ok(averaged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, epoch, mask_cells, regular_axis, synthetic_field};

    #[test]
    fn test_daily_bins_aligned_on_midnight() {
        // Hourly steps from 2024-01-01T06:00 for 48 hours.
        let start = epoch(2024, 1, 1) + 6.0 * 3600.0;
        let field = synthetic_field(
            regular_axis(start, 3600.0, 48),
            vec![0.0],
            vec![0.0],
            "ssh",
            |t, _, _| t,
        );
        let avg = average_by_interval(&field, 24).unwrap();

        assert_eq!(
            avg.time.values(),
            &[epoch(2024, 1, 1), epoch(2024, 1, 2), epoch(2024, 1, 3)]
        );
        // First bin holds 06:00..23:00 of day one.
        let first = avg.cell("ssh", 0, 0, 0).valid().unwrap();
        assert_approx_eq!(first, start + 17.0 * 3600.0 / 2.0, 1e-6);
    }

    #[test]
    fn test_six_hour_bins() {
        let field = synthetic_field(
            regular_axis(epoch(2024, 1, 1), 3600.0, 24),
            vec![0.0],
            vec![0.0],
            "ssh",
            |_, _, _| 1.0,
        );
        let avg = average_by_interval(&field, 6).unwrap();
        assert_eq!(avg.time.len(), 4);
        assert_eq!(avg.time.values()[1], epoch(2024, 1, 1) + 6.0 * 3600.0);
    }

    #[test]
    fn test_masked_samples_are_ignored() {
        let mut field = synthetic_field(
            regular_axis(0.0, 3600.0, 3),
            vec![0.0],
            vec![0.0, 1.0],
            "ssh",
            |t, _, _| t / 3600.0,
        );
        mask_cells(&mut field, "ssh", &[(0, 0, 0), (0, 0, 1), (1, 0, 1), (2, 0, 1)]);
        let avg = average_by_interval(&field, 24).unwrap();
        assert_eq!(avg.cell("ssh", 0, 0, 0).valid(), Some(1.5));
        assert!(!avg.cell("ssh", 0, 0, 1).is_valid());
    }

    #[test]
    fn test_rejects_interval_not_dividing_a_day() {
        let field = synthetic_field(vec![0.0], vec![0.0], vec![0.0], "ssh", |_, _, _| 0.0);
        assert!(average_by_interval(&field, 0).is_err());
        assert!(average_by_interval(&field, 7).is_err());
    }
}
