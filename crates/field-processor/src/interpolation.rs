//! Trilinear interpolation of a gridded field at scattered (time, lat, lon) points.

use ocean_common::{wrap_longitude, AxisPosition, CellValue, GriddedField};

/// Samples one variable of a field.
///
/// Queries outside the closed hull of any axis are `OutOfDomain`. A query
/// whose non-zero-weight corners include a masked cell is `Masked`; corners
/// with zero weight never affect the result. Longitudes are wrapped into the
/// field's own convention before lookup.
#[derive(Debug, Clone, Copy)]
pub struct FieldSampler<'a> {
    field: &'a GriddedField,
    data: &'a [Option<f64>],
}

impl<'a> FieldSampler<'a> {
    /// `None` when the field has no such variable.
    pub fn new(field: &'a GriddedField, variable: &str) -> Option<Self> {
        let data = field.variable(variable)?;
        Some(Self { field, data })
    }

    pub fn field(&self) -> &GriddedField {
        self.field
    }

    pub fn sample(&self, time: f64, lat: f64, lon: f64) -> CellValue {
        let lon = match self.field.lon.min() {
            Some(lon_min) if lon.is_finite() => wrap_longitude(lon, lon_min),
            _ => lon,
        };

        let (Some(pt), Some(py), Some(px)) = (
            self.field.time.locate(time),
            self.field.lat.locate(lat),
            self.field.lon.locate(lon),
        ) else {
            return CellValue::OutOfDomain;
        };

        let mut total = 0.0;
        for (t, wt) in corners(pt) {
            for (j, wy) in corners(py) {
                for (i, wx) in corners(px) {
                    let w = wt * wy * wx;
                    if w == 0.0 {
                        continue;
                    }
                    match self.data[self.field.index(t, j, i)] {
                        Some(v) if v.is_finite() => total += w * v,
                        _ => return CellValue::Masked,
                    }
                }
            }
        }
        CellValue::Valid(total)
    }
}

/// The two bracketing nodes with their weights. A degenerate position
/// (lower == upper) yields the node once with full weight.
fn corners(pos: AxisPosition) -> impl Iterator<Item = (usize, f64)> {
    let upper = (pos.upper != pos.lower).then_some((pos.upper, pos.weight));
    std::iter::once((pos.lower, 1.0 - pos.weight)).chain(upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, mask_cells, planar_ssh, regular_axis, synthetic_field};

    fn planar_field() -> GriddedField {
        synthetic_field(
            regular_axis(0.0, 3600.0, 4),
            regular_axis(10.0, 0.5, 5),
            regular_axis(-60.0, 0.5, 6),
            "ssh",
            planar_ssh,
        )
    }

    #[test]
    fn test_linear_field_is_reproduced_exactly() {
        let field = planar_field();
        let sampler = FieldSampler::new(&field, "ssh").unwrap();
        for &(t, lat, lon) in &[(1800.0, 10.2, -59.3), (10_000.0, 11.9, -57.6), (0.0, 10.0, -60.0)] {
            let value = sampler.sample(t, lat, lon).valid().unwrap();
            assert_approx_eq!(value, planar_ssh(t, lat, lon), 1e-12);
        }
    }

    #[test]
    fn test_nodes_and_hull_edges() {
        let field = planar_field();
        let sampler = FieldSampler::new(&field, "ssh").unwrap();

        // Last node on every axis is inside the closed hull.
        let v = sampler.sample(10_800.0, 12.0, -57.5).valid().unwrap();
        assert_approx_eq!(v, planar_ssh(10_800.0, 12.0, -57.5), 1e-12);

        assert_eq!(sampler.sample(10_800.1, 11.0, -59.0), CellValue::OutOfDomain);
        assert_eq!(sampler.sample(100.0, 9.99, -59.0), CellValue::OutOfDomain);
        assert_eq!(sampler.sample(100.0, 11.0, -57.49), CellValue::OutOfDomain);
        assert_eq!(sampler.sample(f64::NAN, 11.0, -59.0), CellValue::OutOfDomain);
    }

    #[test]
    fn test_converges_to_node_value() {
        let field = planar_field();
        let sampler = FieldSampler::new(&field, "ssh").unwrap();
        let node = planar_ssh(3600.0, 11.0, -59.0);
        for eps in [1e-2, 1e-4, 1e-6, 1e-8] {
            let below = sampler.sample(3600.0 - eps, 11.0 - eps, -59.0 - eps).valid().unwrap();
            let above = sampler.sample(3600.0 + eps, 11.0 + eps, -59.0 + eps).valid().unwrap();
            assert!((below - node).abs() <= 0.05 * eps + 1e-12);
            assert!((above - node).abs() <= 0.05 * eps + 1e-12);
        }
    }

    #[test]
    fn test_masked_corner_masks_sample() {
        let mut field = planar_field();
        mask_cells(&mut field, "ssh", &[(1, 2, 2)]);
        let sampler = FieldSampler::new(&field, "ssh").unwrap();

        // Cell (t=1, lat=11.0, lon=-59.0) is a corner of this query.
        assert_eq!(sampler.sample(4000.0, 11.2, -58.8), CellValue::Masked);
        // Exactly on the node after it: the masked node has zero weight.
        let v = sampler.sample(3600.0, 11.0, -58.5);
        assert!(v.is_valid());
        // Exactly on the masked node itself.
        assert_eq!(sampler.sample(3600.0, 11.0, -59.0), CellValue::Masked);
    }

    #[test]
    fn test_longitude_wrapping() {
        let field = synthetic_field(
            vec![0.0],
            vec![0.0, 1.0],
            regular_axis(290.0, 1.0, 20),
            "ssh",
            |_, _, lon| lon,
        );
        let sampler = FieldSampler::new(&field, "ssh").unwrap();
        // -60 E is 300 E
        assert_approx_eq!(sampler.sample(0.0, 0.5, -60.0).valid().unwrap(), 300.0, 1e-9);
    }

    #[test]
    fn test_single_time_slice_requires_exact_time() {
        let field = synthetic_field(vec![100.0], vec![0.0, 1.0], vec![0.0, 1.0], "ssh", |_, _, _| 1.0);
        let sampler = FieldSampler::new(&field, "ssh").unwrap();
        assert_eq!(sampler.sample(100.0, 0.5, 0.5), CellValue::Valid(1.0));
        assert_eq!(sampler.sample(100.5, 0.5, 0.5), CellValue::OutOfDomain);
    }

    #[test]
    fn test_missing_variable() {
        let field = planar_field();
        assert!(FieldSampler::new(&field, "adt").is_none());
    }
}
