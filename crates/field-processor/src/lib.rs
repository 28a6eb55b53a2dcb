//! Numerical processing of gridded sea-surface fields.
//!
//! All operations are pure functions over [`ocean_common::GriddedField`]:
//! masked cells travel as `None` and are never replaced by zero.

pub mod averaging;
pub mod fill;
pub mod geostrophy;
pub mod interpolation;
pub mod subset;

pub use averaging::average_by_interval;
pub use fill::{fill_field, fill_slice};
pub use geostrophy::{coriolis, derive_geostrophy, Geostrophy};
pub use interpolation::FieldSampler;
pub use subset::{subset_bbox, subset_time};
