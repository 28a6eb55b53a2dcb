//! Backend linking libnetcdf through the `netcdf` crate.
//!
//! Enabled by the default `native` feature. Requires libhdf5-dev and libnetcdf-dev
//! at build time.

use std::path::Path;
use std::sync::Once;

use tracing::debug;

use crate::dataset::{AttrValue, NcDataset, NcVariable, FILL_VALUE};
use crate::error::{NetCdfError, NetCdfResult};
use crate::NetCdfBackend;

/// Silence HDF5's automatic error printing to stderr.
///
/// HDF5 prints diagnostics for lookups the Rust side handles gracefully,
/// such as probing optional attributes. Safe to call more than once.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

#[derive(Debug, Clone, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        silence_hdf5_errors();
        Self
    }
}

fn nc_err(context: &str, e: netcdf::Error) -> NetCdfError {
    NetCdfError::InvalidFormat(format!("{}: {}", context, e))
}

fn convert_attribute(value: netcdf::AttributeValue) -> Option<AttrValue> {
    if let Ok(text) = String::try_from(value.clone()) {
        return Some(AttrValue::Text(text));
    }
    f64::try_from(value).ok().map(AttrValue::Number)
}

fn read_attributes<'a>(
    attributes: impl Iterator<Item = netcdf::Attribute<'a>>,
) -> std::collections::BTreeMap<String, AttrValue> {
    attributes
        .filter_map(|attr| {
            let name = attr.name().to_string();
            let value = attr.value().ok().and_then(convert_attribute)?;
            Some((name, value))
        })
        .collect()
}

impl NetCdfBackend for NativeBackend {
    fn read(&self, path: &Path, variables: &[&str]) -> NetCdfResult<NcDataset> {
        if !path.is_file() {
            return Err(NetCdfError::NotFound(path.to_path_buf()));
        }
        let file = netcdf::open(path).map_err(|e| nc_err("Failed to open NetCDF", e))?;

        let mut dataset = NcDataset::new();
        for dim in file.dimensions() {
            dataset.add_dimension(&dim.name(), dim.len(), dim.is_unlimited());
        }
        dataset.attributes = read_attributes(file.attributes());

        for name in variables {
            let Some(var) = file.variable(name) else {
                continue;
            };
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            let attributes = read_attributes(var.attributes());

            let raw: Vec<f64> = var
                .get_values(..)
                .map_err(|e| nc_err(&format!("Failed to read {}", name), e))?;
            let has_fill = attributes.contains_key("_FillValue");
            let values = raw
                .into_iter()
                .map(|v| {
                    // Without an explicit fill, unset cells hold the library default.
                    if !has_fill && v.abs() >= 9.9e36 {
                        None
                    } else {
                        Some(v)
                    }
                })
                .collect();

            let mut variable = NcVariable {
                dims,
                values,
                attributes,
            };
            variable.unpack();
            dataset.add_variable(name, variable);
        }

        debug!(path = %path.display(), variables = dataset.variables.len(), "Read NetCDF natively");
        Ok(dataset)
    }

    fn write(&self, path: &Path, dataset: &NcDataset) -> NetCdfResult<()> {
        dataset.check_shapes().map_err(NetCdfError::InvalidFormat)?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let tmp = tempfile::Builder::new()
            .prefix(".native_")
            .suffix(".nc")
            .tempfile_in(dir)?;

        {
            let mut file =
                netcdf::create(tmp.path()).map_err(|e| nc_err("Failed to create NetCDF", e))?;

            // Fixed-size dimensions keep whole-variable writes simple.
            for dim in &dataset.dimensions {
                file.add_dimension(&dim.name, dim.len)
                    .map_err(|e| nc_err(&format!("dimension {}", dim.name), e))?;
            }
            for (name, value) in &dataset.attributes {
                match value {
                    AttrValue::Text(s) => file.add_attribute(name, s.as_str()),
                    AttrValue::Number(v) => file.add_attribute(name, *v),
                    AttrValue::Numbers(vs) => file.add_attribute(name, vs.clone()),
                }
                .map_err(|e| nc_err(&format!("attribute {}", name), e))?;
            }

            for (name, var) in &dataset.variables {
                let dims: Vec<&str> = var.dims.iter().map(String::as_str).collect();
                let mut nc_var = file
                    .add_variable::<f64>(name, &dims)
                    .map_err(|e| nc_err(&format!("variable {}", name), e))?;
                nc_var
                    .put_attribute("_FillValue", FILL_VALUE)
                    .map_err(|e| nc_err(&format!("{}:_FillValue", name), e))?;
                for (attr, value) in &var.attributes {
                    if attr == "_FillValue" {
                        continue;
                    }
                    match value {
                        AttrValue::Text(s) => nc_var.put_attribute(attr, s.as_str()),
                        AttrValue::Number(v) => nc_var.put_attribute(attr, *v),
                        AttrValue::Numbers(vs) => nc_var.put_attribute(attr, vs.clone()),
                    }
                    .map_err(|e| nc_err(&format!("{}:{}", name, attr), e))?;
                }

                if !var.values.is_empty() {
                    let values: Vec<f64> = var
                        .values
                        .iter()
                        .map(|v| v.filter(|x| x.is_finite()).unwrap_or(FILL_VALUE))
                        .collect();
                    nc_var
                        .put_values(&values, ..)
                        .map_err(|e| nc_err(&format!("writing {}", name), e))?;
                }
            }
        }

        tmp.persist(path).map_err(|e| NetCdfError::IoError(e.error))?;
        debug!(path = %path.display(), "Wrote NetCDF natively");
        Ok(())
    }
}
