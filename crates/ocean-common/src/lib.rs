//! Common types shared across the ocean topography mapping pipeline.
//!
//! Everything in here is plain data plus small pure helpers: the geographic
//! domain, the dataset catalog, the run window, gridded fields and along-track
//! observations, the on-disk directory convention and the error taxonomy.

pub mod bbox;
pub mod catalog;
pub mod error;
pub mod grid;
pub mod paths;
pub mod time;
pub mod track;

pub use bbox::{wrap_longitude, BboxParseError, BoundingBox};
pub use catalog::{CatalogEntry, DatasetKind, Provider};
pub use error::{PipelineError, PipelineResult};
pub use grid::{Axis, AxisPosition, CellValue, GriddedField};
pub use paths::StagePaths;
pub use time::{RunWindow, TimeParseError};
pub use track::{TrackObservation, TrackSample};
