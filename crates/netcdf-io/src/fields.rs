//! Conversions between NetCDF datasets and the pipeline's field and track types.

use std::path::Path;

use ocean_common::{Axis, GriddedField, TrackObservation, TrackSample};
use tracing::debug;

use crate::cf_time::{CfTimeUnits, EPOCH_SECONDS_UNITS};
use crate::dataset::{AttrValue, NcDataset, NcVariable};
use crate::error::{NetCdfError, NetCdfResult};
use crate::NetCdfBackend;

pub const TIME_NAMES: [&str; 1] = ["time"];
pub const LAT_NAMES: [&str; 2] = ["lat", "latitude"];
pub const LON_NAMES: [&str; 2] = ["lon", "longitude"];

/// Variables of an along-track file.
pub const TRACK_TIME: &str = "time";
pub const TRACK_LON: &str = "longitude";
pub const TRACK_LAT: &str = "latitude";
pub const TRACK_SSH: &str = "SSH";

/// Read a gridded field with every variable of `candidates` present in the file.
///
/// Coordinates may be named `lat`/`latitude` and `lon`/`longitude`; data
/// variables must be laid out as (time, lat, lon).
pub fn read_gridded_field(
    backend: &dyn NetCdfBackend,
    path: &Path,
    candidates: &[&str],
) -> NetCdfResult<GriddedField> {
    let mut wanted: Vec<&str> = TIME_NAMES.to_vec();
    wanted.extend(LAT_NAMES);
    wanted.extend(LON_NAMES);
    wanted.extend(candidates.iter().copied());
    let ds = backend.read(path, &wanted)?;

    let (time_name, time_var) = ds
        .first_variable(&TIME_NAMES)
        .ok_or_else(|| NetCdfError::MissingData(format!("time coordinate in {}", path.display())))?;
    let (lat_name, lat_var) = ds
        .first_variable(&LAT_NAMES)
        .ok_or_else(|| NetCdfError::MissingData(format!("latitude coordinate in {}", path.display())))?;
    let (lon_name, lon_var) = ds
        .first_variable(&LON_NAMES)
        .ok_or_else(|| NetCdfError::MissingData(format!("longitude coordinate in {}", path.display())))?;

    let time = Axis::non_decreasing(time_values(time_var, time_name)?)
        .map_err(|e| NetCdfError::InvalidFormat(format!("{}: {}", path.display(), e)))?;
    let lat = Axis::strict(coordinate_values(lat_var, lat_name)?)
        .map_err(|e| NetCdfError::InvalidFormat(format!("{}: {}", path.display(), e)))?;
    let lon = Axis::strict(coordinate_values(lon_var, lon_name)?)
        .map_err(|e| NetCdfError::InvalidFormat(format!("{}: {}", path.display(), e)))?;

    let expected_dims = [
        coordinate_dim(time_var, time_name),
        coordinate_dim(lat_var, lat_name),
        coordinate_dim(lon_var, lon_name),
    ];

    let mut field = GriddedField::new(time, lat, lon);
    for name in candidates {
        let Some(var) = ds.variable(name) else {
            continue;
        };
        if var.dims.len() != 3 || var.dims.iter().zip(&expected_dims).any(|(a, b)| a != b) {
            return Err(NetCdfError::InvalidFormat(format!(
                "{} in {} has dimensions ({}), expected ({})",
                name,
                path.display(),
                var.dims.join(", "),
                expected_dims.join(", ")
            )));
        }
        field
            .insert_variable(name, var.values.clone())
            .map_err(|e| NetCdfError::InvalidFormat(e.to_string()))?;
    }

    if field.variable_names().next().is_none() {
        return Err(NetCdfError::MissingData(format!(
            "none of [{}] in {}",
            candidates.join(", "),
            path.display()
        )));
    }

    debug!(
        path = %path.display(),
        shape = ?field.shape(),
        "Read gridded field"
    );
    Ok(field)
}

/// Read an along-track file. The track id is the file stem.
pub fn read_track(backend: &dyn NetCdfBackend, path: &Path) -> NetCdfResult<TrackObservation> {
    let ds = backend.read(path, &[TRACK_TIME, TRACK_LON, TRACK_LAT, TRACK_SSH])?;

    let var = |name: &str| {
        ds.variable(name)
            .ok_or_else(|| NetCdfError::MissingData(format!("{} in {}", name, path.display())))
    };
    let time_var = var(TRACK_TIME)?;
    let times = time_var
        .attribute("units")
        .and_then(AttrValue::as_text)
        .map(CfTimeUnits::parse)
        .transpose()?;
    let lon = &var(TRACK_LON)?.values;
    let lat = &var(TRACK_LAT)?.values;
    let ssh = &var(TRACK_SSH)?.values;

    let n = time_var.values.len();
    if lon.len() != n || lat.len() != n || ssh.len() != n {
        return Err(NetCdfError::InvalidFormat(format!(
            "track variables in {} have different lengths",
            path.display()
        )));
    }

    // Samples without a position or time cannot be placed and are dropped.
    let samples = (0..n)
        .filter_map(|k| {
            let t = time_var.values[k]?;
            Some(TrackSample {
                time: times.map_or(t, |u| u.to_epoch(t)),
                lon: lon[k]?,
                lat: lat[k]?,
                ssh: ssh[k],
            })
        })
        .collect();

    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("track")
        .to_string();
    Ok(TrackObservation::new(id, samples))
}

/// Write a gridded field with CF coordinates and every variable laid out as (time, lat, lon).
pub fn write_gridded_field(
    backend: &dyn NetCdfBackend,
    path: &Path,
    field: &GriddedField,
) -> NetCdfResult<()> {
    let (nt, ny, nx) = field.shape();
    let mut ds = NcDataset::new();
    ds.add_dimension("time", nt, true);
    ds.add_dimension("lat", ny, false);
    ds.add_dimension("lon", nx, false);

    ds.add_variable(
        "time",
        NcVariable::new(&["time"], some(field.time.values()))
            .with_attribute("units", EPOCH_SECONDS_UNITS)
            .with_attribute("standard_name", "time")
            .with_attribute("calendar", "standard"),
    );
    ds.add_variable(
        "lat",
        NcVariable::new(&["lat"], some(field.lat.values()))
            .with_attribute("units", "degrees_north")
            .with_attribute("standard_name", "latitude"),
    );
    ds.add_variable(
        "lon",
        NcVariable::new(&["lon"], some(field.lon.values()))
            .with_attribute("units", "degrees_east")
            .with_attribute("standard_name", "longitude"),
    );
    for (name, data) in field.variables() {
        ds.add_variable(name, NcVariable::new(&["time", "lat", "lon"], data.to_vec()));
    }
    ds.attributes
        .insert("Conventions".to_string(), AttrValue::from("CF-1.8"));

    backend.write(path, &ds)
}

/// Write an along-track file in the layout `read_track` expects.
pub fn write_track(
    backend: &dyn NetCdfBackend,
    path: &Path,
    track: &TrackObservation,
) -> NetCdfResult<()> {
    let n = track.samples.len();
    let column = |f: fn(&TrackSample) -> Option<f64>| -> Vec<Option<f64>> {
        track.samples.iter().map(f).collect()
    };

    let mut ds = NcDataset::new();
    ds.add_dimension("time", n, true);
    ds.add_variable(
        TRACK_TIME,
        NcVariable::new(&["time"], column(|s| Some(s.time)))
            .with_attribute("units", EPOCH_SECONDS_UNITS),
    );
    ds.add_variable(
        TRACK_LON,
        NcVariable::new(&["time"], column(|s| Some(s.lon))).with_attribute("units", "degrees_east"),
    );
    ds.add_variable(
        TRACK_LAT,
        NcVariable::new(&["time"], column(|s| Some(s.lat))).with_attribute("units", "degrees_north"),
    );
    ds.add_variable(
        TRACK_SSH,
        NcVariable::new(&["time"], column(|s| s.ssh)).with_attribute("units", "m"),
    );
    backend.write(path, &ds)
}

fn some(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

fn coordinate_values(var: &NcVariable, name: &str) -> NetCdfResult<Vec<f64>> {
    var.values
        .iter()
        .map(|v| v.ok_or_else(|| NetCdfError::InvalidFormat(format!("{} has fill values", name))))
        .collect()
}

fn time_values(var: &NcVariable, name: &str) -> NetCdfResult<Vec<f64>> {
    let raw = coordinate_values(var, name)?;
    let units = var
        .attribute("units")
        .and_then(AttrValue::as_text)
        .ok_or_else(|| NetCdfError::MissingData(format!("units of {}", name)))?;
    let units = CfTimeUnits::parse(units)?;
    Ok(raw.into_iter().map(|v| units.to_epoch(v)).collect())
}

/// Dimension a coordinate variable runs along; its own name when it is a scalar.
fn coordinate_dim(var: &NcVariable, name: &str) -> String {
    var.dims.first().cloned().unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn grid_dataset(lat_name: &str, lon_name: &str, dims: [&str; 3]) -> NcDataset {
        let mut ds = NcDataset::new();
        ds.add_dimension("time", 2, true);
        ds.add_dimension(lat_name, 2, false);
        ds.add_dimension(lon_name, 3, false);
        ds.add_variable(
            "time",
            NcVariable::new(&["time"], vec![Some(27000.0), Some(27001.0)])
                .with_attribute("units", "days since 1950-01-01"),
        );
        ds.add_variable(lat_name, NcVariable::new(&[lat_name], vec![Some(10.0), Some(11.0)]));
        ds.add_variable(
            lon_name,
            NcVariable::new(&[lon_name], vec![Some(-60.0), Some(-59.0), Some(-58.0)]),
        );
        let values: Vec<Option<f64>> = (0..12)
            .map(|k| if k == 4 { Some(-2147483647.0) } else { Some(k as f64 * 10.0) })
            .collect();
        ds.add_variable(
            "adt",
            NcVariable::new(&dims, values)
                .with_attribute("_FillValue", -2147483647.0)
                .with_attribute("scale_factor", 0.01),
        );
        ds
    }

    #[test]
    fn test_read_gridded_field_with_long_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l4.nc");
        let backend = MemoryBackend::new();
        backend
            .write(&path, &grid_dataset("latitude", "longitude", ["time", "latitude", "longitude"]))
            .unwrap();

        let field = read_gridded_field(&backend, &path, &["ssh", "adt"]).unwrap();
        assert_eq!(field.shape(), (2, 2, 3));
        // 27000 days after 1950-01-01
        assert_eq!(field.time.values()[0], (27000.0 - 7305.0) * 86_400.0);
        let adt = field.variable("adt").unwrap();
        assert_eq!(adt[4], None);
        assert!((adt[5].unwrap() - 0.5).abs() < 1e-12);
        assert!(field.variable("ssh").is_none());
    }

    #[test]
    fn test_read_gridded_field_rejects_wrong_dim_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l4.nc");
        let backend = MemoryBackend::new();
        let mut ds = grid_dataset("lat", "lon", ["time", "lat", "lon"]);
        ds.variables.get_mut("adt").unwrap().dims = vec!["time".into(), "lon".into(), "lat".into()];
        backend.write(&path, &ds).unwrap();

        assert!(matches!(
            read_gridded_field(&backend, &path, &["adt"]),
            Err(NetCdfError::InvalidFormat(_))
        ));
        assert!(matches!(
            read_gridded_field(&backend, &path, &["ssh"]),
            Err(NetCdfError::MissingData(_))
        ));
    }

    #[test]
    fn test_field_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.nc");
        let backend = MemoryBackend::new();

        let field = GriddedField::new(
            Axis::non_decreasing(vec![0.0, 3600.0]).unwrap(),
            Axis::strict(vec![10.0]).unwrap(),
            Axis::strict(vec![1.0, 2.0]).unwrap(),
        )
        .with_variable("ssh", vec![Some(0.1), None, Some(0.3), Some(0.4)])
        .unwrap();

        write_gridded_field(&backend, &path, &field).unwrap();
        let back = read_gridded_field(&backend, &path, &["ssh"]).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn test_track_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs_al_1.nc");
        let backend = MemoryBackend::new();

        let track = TrackObservation::new(
            "obs_al_1",
            vec![
                TrackSample { time: 100.0, lon: -60.0, lat: 10.0, ssh: Some(0.2) },
                TrackSample { time: 101.0, lon: -60.1, lat: 10.1, ssh: None },
            ],
        );
        write_track(&backend, &path, &track).unwrap();
        assert_eq!(read_track(&backend, &path).unwrap(), track);
    }

    #[test]
    fn test_track_missing_variable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.nc");
        let backend = MemoryBackend::new();
        let mut ds = NcDataset::new();
        ds.add_dimension("time", 1, true);
        ds.add_variable("time", NcVariable::new(&["time"], vec![Some(1.0)]));
        backend.write(&path, &ds).unwrap();

        assert!(matches!(
            read_track(&backend, &path),
            Err(NetCdfError::MissingData(_))
        ));
    }
}
