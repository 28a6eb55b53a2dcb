//! NetCDF boundary of the mapping pipeline.
//!
//! Files are read into a small format-independent model ([`NcDataset`]) and
//! converted to [`ocean_common::GriddedField`] or
//! [`ocean_common::TrackObservation`]. Fill values become `None` and packing
//! attributes are applied on read, so nothing past this crate sees raw
//! sentinels.
//!
//! # Backends
//!
//! - `NativeBackend` (default `native` feature) links libnetcdf.
//! - [`NcdumpBackend`] shells out to `ncdump` / `ncgen`; used when the crate
//!   is built without the `native` feature.
//! - [`MemoryBackend`] keeps datasets in process for tests and dry runs.

use std::path::Path;
use std::sync::Arc;

pub mod cdl;
pub mod cf_time;
pub mod dataset;
pub mod error;
pub mod fields;
pub mod memory;
pub mod ncdump;

#[cfg(feature = "native")]
pub mod native;

pub use cf_time::CfTimeUnits;
pub use dataset::{AttrValue, NcDataset, NcDimension, NcVariable, FILL_VALUE};
pub use error::{NetCdfError, NetCdfResult};
pub use fields::{read_gridded_field, read_track, write_gridded_field, write_track};
pub use memory::MemoryBackend;
pub use ncdump::NcdumpBackend;

#[cfg(feature = "native")]
pub use native::NativeBackend;

/// Reads and writes NetCDF files.
///
/// Implementations are blocking; async callers should run them on a
/// blocking thread.
pub trait NetCdfBackend: Send + Sync {
    /// Read dimensions, global attributes and the listed variables.
    /// Listed variables absent from the file are skipped, not an error.
    fn read(&self, path: &Path, variables: &[&str]) -> NetCdfResult<NcDataset>;

    /// Write `dataset` to `path`, replacing any existing file.
    fn write(&self, path: &Path, dataset: &NcDataset) -> NetCdfResult<()>;
}

/// The backend selected at build time.
pub fn default_backend() -> Arc<dyn NetCdfBackend> {
    #[cfg(feature = "native")]
    {
        Arc::new(NativeBackend::new())
    }
    #[cfg(not(feature = "native"))]
    {
        Arc::new(NcdumpBackend::new())
    }
}
