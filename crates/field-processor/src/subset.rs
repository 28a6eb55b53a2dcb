//! Spatial and temporal subsetting.

use ocean_common::{wrap_longitude, Axis, BoundingBox, GriddedField, PipelineError, PipelineResult};

/// Restrict a field to the closed bounding box.
///
/// Longitudes are re-expressed in the box's convention, so a 0..360 grid can
/// be cut with a -180..180 box, including across the seam. The resulting
/// longitude axis is increasing; latitude keeps its original direction.
pub fn subset_bbox(field: &GriddedField, bbox: &BoundingBox) -> PipelineResult<GriddedField> {
    let lat_range = field.lat.index_range(bbox.lat_min, bbox.lat_max);

    let mut lon_picks: Vec<(f64, usize)> = field
        .lon
        .values()
        .iter()
        .enumerate()
        .map(|(i, lon)| (wrap_longitude(*lon, bbox.lon_min), i))
        .filter(|(lon, _)| *lon <= bbox.lon_max)
        .collect();
    lon_picks.sort_by(|a, b| a.0.total_cmp(&b.0));

    if lat_range.is_empty() || lon_picks.is_empty() {
        return Err(PipelineError::Data(format!(
            "bounding box {} does not intersect the field",
            bbox.to_arg_string()
        )));
    }

    let lat = field.lat.slice(lat_range.clone());
    let lon = Axis::strict(lon_picks.iter().map(|(lon, _)| *lon).collect())?;
    let (nt, _, _) = field.shape();

    let mut subset = GriddedField::new(field.time.clone(), lat, lon);
    for (name, data) in field.variables() {
        let mut out = Vec::with_capacity(nt * lat_range.len() * lon_picks.len());
        for t in 0..nt {
            for j in lat_range.clone() {
                for (_, i) in &lon_picks {
                    out.push(data[field.index(t, j, *i)]);
                }
            }
        }
        subset.insert_variable(name, out)?;
    }
    Ok(subset)
}

/// Keep time steps in `[start, end)` (epoch seconds).
pub fn subset_time(field: &GriddedField, start: f64, end: f64) -> PipelineResult<GriddedField> {
    let keep: Vec<usize> = field
        .time
        .values()
        .iter()
        .enumerate()
        .filter(|(_, t)| **t >= start && **t < end)
        .map(|(k, _)| k)
        .collect();

    let time = Axis::non_decreasing(keep.iter().map(|&k| field.time.values()[k]).collect())?;
    let (_, ny, nx) = field.shape();
    let plane = ny * nx;

    let mut subset = GriddedField::new(time, field.lat.clone(), field.lon.clone());
    for (name, data) in field.variables() {
        let out = keep
            .iter()
            .flat_map(|&k| data[k * plane..(k + 1) * plane].iter().copied())
            .collect();
        subset.insert_variable(name, out)?;
    }
    Ok(subset)
}
