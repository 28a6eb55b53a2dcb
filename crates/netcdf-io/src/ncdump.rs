//! Backend driving the `ncdump` and `ncgen` command-line tools.
//!
//! Slower than linking libnetcdf, but needs nothing at build time. Reads
//! dump the header first (`ncdump -h`), then only the requested variables
//! at full precision (`ncdump -p 9,17 -v a,b`). Writes render CDL to a
//! temporary file and compile it with `ncgen`, renaming the result into
//! place so readers never observe a partial file.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::cdl::{parse_cdl, render_cdl};
use crate::dataset::NcDataset;
use crate::error::{NetCdfError, NetCdfResult};
use crate::NetCdfBackend;

#[derive(Debug, Clone)]
pub struct NcdumpBackend {
    ncdump: PathBuf,
    ncgen: PathBuf,
}

impl Default for NcdumpBackend {
    fn default() -> Self {
        Self {
            ncdump: PathBuf::from("ncdump"),
            ncgen: PathBuf::from("ncgen"),
        }
    }
}

impl NcdumpBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit tool locations instead of looking them up on `PATH`.
    pub fn with_programs(ncdump: impl Into<PathBuf>, ncgen: impl Into<PathBuf>) -> Self {
        Self {
            ncdump: ncdump.into(),
            ncgen: ncgen.into(),
        }
    }

    fn dump(&self, args: &[&str], path: &Path) -> NetCdfResult<String> {
        let output = Command::new(&self.ncdump)
            .args(args)
            .arg(path)
            .output()
            .map_err(|e| NetCdfError::CommandError(format!("Failed to run ncdump: {}", e)))?;

        if !output.status.success() {
            return Err(NetCdfError::CommandError(format!(
                "ncdump failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl NetCdfBackend for NcdumpBackend {
    fn read(&self, path: &Path, variables: &[&str]) -> NetCdfResult<NcDataset> {
        if !path.is_file() {
            return Err(NetCdfError::NotFound(path.to_path_buf()));
        }

        let header = parse_cdl(&self.dump(&["-h"], path)?)?;
        let present: Vec<&str> = variables
            .iter()
            .copied()
            .filter(|name| header.variables.contains_key(*name))
            .collect();
        debug!(
            path = %path.display(),
            requested = variables.len(),
            present = present.len(),
            "Reading NetCDF variables with ncdump"
        );
        if present.is_empty() {
            return Ok(header.select(&[]));
        }

        let list = present.join(",");
        let mut dataset = parse_cdl(&self.dump(&["-p", "9,17", "-v", &list], path)?)?;
        dataset = dataset.select(&present);
        for var in dataset.variables.values_mut() {
            var.unpack();
        }
        Ok(dataset)
    }

    fn write(&self, path: &Path, dataset: &NcDataset) -> NetCdfResult<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(sanitize_name)
            .unwrap_or_else(|| "dataset".to_string());
        let cdl = render_cdl(&name, dataset)?;

        let cdl_file = tempfile::Builder::new()
            .prefix(".ncgen_")
            .suffix(".cdl")
            .tempfile_in(dir)?;
        std::fs::write(cdl_file.path(), cdl)?;

        let out_file = tempfile::Builder::new()
            .prefix(".ncgen_")
            .suffix(".nc")
            .tempfile_in(dir)?;

        let output = Command::new(&self.ncgen)
            .arg("-o")
            .arg(out_file.path())
            .arg(cdl_file.path())
            .output()
            .map_err(|e| NetCdfError::CommandError(format!("Failed to run ncgen: {}", e)))?;
        if !output.status.success() {
            return Err(NetCdfError::CommandError(format!(
                "ncgen failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        out_file
            .persist(path)
            .map_err(|e| NetCdfError::IoError(e.error))?;
        debug!(path = %path.display(), "Wrote NetCDF file with ncgen");
        Ok(())
    }
}

/// CDL dataset names must be identifiers.
fn sanitize_name(stem: &str) -> String {
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        name.insert(0, 'd');
    }
    name
}
