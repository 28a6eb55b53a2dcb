//! QA figure rendering for the daily validation.
//!
//! Figures are drawn with `tiny-skia` and written as PNG:
//! - RMSE per track for the pipeline output and the reference product
//! - A grid of randomly chosen track panels
//! - An overview scatter of the along-track observations
//! - A locator map placing the domain in its wider region

pub mod canvas;
pub mod color;
pub mod error;
pub mod figures;
pub mod png;

pub use color::{Color, DivergingScale};
pub use error::{RenderError, RenderResult};
pub use figures::{
    render_domain_locator, render_observation_map, render_rmse_chart, render_track_panels, ObservationPoint, TrackPanel,
};
