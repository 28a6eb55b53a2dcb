//! In-process backend used by tests and dry runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::dataset::NcDataset;
use crate::error::{NetCdfError, NetCdfResult};
use crate::NetCdfBackend;

/// Keeps datasets in a map keyed by path.
///
/// Writes also create an empty placeholder file at the path, so code that
/// discovers inputs by listing directories sees the same files it would with
/// a real backend. Reads of the placeholder are served from the map and
/// values are unpacked like the other backends do.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: Mutex<HashMap<PathBuf, NcDataset>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, NcDataset>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Paths written so far, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    /// Full dataset stored at `path`, without going through variable selection.
    pub fn get(&self, path: &Path) -> Option<NcDataset> {
        self.files().get(path).cloned()
    }
}

impl NetCdfBackend for MemoryBackend {
    fn read(&self, path: &Path, variables: &[&str]) -> NetCdfResult<NcDataset> {
        let files = self.files();
        let Some(dataset) = files.get(path) else {
            if path.exists() {
                return Err(NetCdfError::InvalidFormat(format!(
                    "{} is not held by the in-memory backend",
                    path.display()
                )));
            }
            return Err(NetCdfError::NotFound(path.to_path_buf()));
        };

        let mut selected = dataset.select(variables);
        for var in selected.variables.values_mut() {
            var.unpack();
        }
        Ok(selected)
    }

    fn write(&self, path: &Path, dataset: &NcDataset) -> NetCdfResult<()> {
        dataset.check_shapes().map_err(NetCdfError::InvalidFormat)?;
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, b"")?;
        self.files().insert(path.to_path_buf(), dataset.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::NcVariable;

    #[test]
    fn test_write_creates_placeholder_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("a.nc");

        let mut ds = NcDataset::new();
        ds.add_dimension("x", 2, false);
        ds.add_variable(
            "a",
            NcVariable::new(&["x"], vec![Some(1.0), Some(-999.0)]).with_attribute("_FillValue", -999.0),
        );
        ds.add_variable("b", NcVariable::new(&["x"], vec![Some(3.0), Some(4.0)]));

        let backend = MemoryBackend::new();
        backend.write(&path, &ds).unwrap();
        assert!(path.is_file());
        assert!(backend.contains(&path));

        let read = backend.read(&path, &["a", "missing"]).unwrap();
        assert_eq!(read.variables.len(), 1);
        assert_eq!(read.variable("a").unwrap().values, vec![Some(1.0), None]);
    }

    #[test]
    fn test_unknown_paths() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.read(&dir.path().join("none.nc"), &[]),
            Err(NetCdfError::NotFound(_))
        ));

        let foreign = dir.path().join("foreign.nc");
        std::fs::write(&foreign, b"CDF").unwrap();
        assert!(matches!(
            backend.read(&foreign, &[]),
            Err(NetCdfError::InvalidFormat(_))
        ));
    }
}
