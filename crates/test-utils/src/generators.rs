//! Test data generators for synthetic ocean fields and satellite tracks.
//!
//! These generators create predictable, verifiable data so interpolation and
//! error metrics can be checked against closed-form answers.

use ocean_common::{Axis, GriddedField, TrackObservation, TrackSample};

/// Evenly spaced coordinates: `start, start + step, ...` (`n` values).
///
/// # Example
///
/// ```
/// use test_utils::regular_axis;
///
/// assert_eq!(regular_axis(10.0, 0.5, 3), vec![10.0, 10.5, 11.0]);
/// ```
pub fn regular_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|k| start + step * k as f64).collect()
}

/// Sea-surface height that is linear in time, latitude and longitude.
///
/// Trilinear interpolation reproduces linear functions exactly, which makes
/// this the reference truth for validator tests.
pub fn planar_ssh(time: f64, lat: f64, lon: f64) -> f64 {
    0.25 + 1e-6 * time + 0.02 * lat - 0.01 * lon
}

/// Builds a single-variable field by evaluating `f(time, lat, lon)` on every node.
///
/// # Arguments
///
/// * `time`, `lat`, `lon` - Axis coordinates (time in epoch seconds)
/// * `variable` - Name of the variable to create
/// * `f` - Value at a node
///
/// # Panics
///
/// If an axis is not monotonic; this is a test helper.
pub fn synthetic_field(
    time: Vec<f64>,
    lat: Vec<f64>,
    lon: Vec<f64>,
    variable: &str,
    f: impl Fn(f64, f64, f64) -> f64,
) -> GriddedField {
    let mut data = Vec::with_capacity(time.len() * lat.len() * lon.len());
    for &t in &time {
        for &y in &lat {
            for &x in &lon {
                data.push(Some(f(t, y, x)));
            }
        }
    }
    GriddedField::new(
        Axis::non_decreasing(time).expect("time axis"),
        Axis::strict(lat).expect("lat axis"),
        Axis::strict(lon).expect("lon axis"),
    )
    .with_variable(variable, data)
    .expect("variable shape")
}

/// Copy of `field` with `delta` added to every valid cell of `variable`,
/// stored under `rename`.
pub fn offset_field(field: &GriddedField, variable: &str, rename: &str, delta: f64) -> GriddedField {
    let data = field
        .variable(variable)
        .expect("variable present")
        .iter()
        .map(|v| v.map(|x| x + delta))
        .collect();
    GriddedField::new(field.time.clone(), field.lat.clone(), field.lon.clone())
        .with_variable(rename, data)
        .expect("variable shape")
}

/// Masks the cells at the given `(t, j, i)` indices.
pub fn mask_cells(field: &mut GriddedField, variable: &str, cells: &[(usize, usize, usize)]) {
    let mut data = field.variable(variable).expect("variable present").to_vec();
    for &(t, j, i) in cells {
        let idx = field.index(t, j, i);
        data[idx] = None;
    }
    field.insert_variable(variable, data).expect("variable shape");
}

/// A straight satellite pass from `start` to `end`, each `(time, lon, lat)`,
/// with `n` samples whose height is `f(time, lat, lon)`.
pub fn straight_track(
    id: &str,
    start: (f64, f64, f64),
    end: (f64, f64, f64),
    n: usize,
    f: impl Fn(f64, f64, f64) -> f64,
) -> TrackObservation {
    let samples = (0..n)
        .map(|k| {
            let s = if n > 1 { k as f64 / (n - 1) as f64 } else { 0.0 };
            let time = start.0 + s * (end.0 - start.0);
            let lon = start.1 + s * (end.1 - start.1);
            let lat = start.2 + s * (end.2 - start.2);
            TrackSample {
                time,
                lon,
                lat,
                ssh: Some(f(time, lat, lon)),
            }
        })
        .collect();
    TrackObservation::new(id, samples)
}
