//! The QA figures written next to the daily maps.

use ocean_common::BoundingBox;
use tracing::debug;

use crate::canvas::{finite_range, Canvas, DataFrame, PlotArea};
use crate::color::{Color, DivergingScale};
use crate::error::{RenderError, RenderResult};

const MARGIN: f32 = 24.0;
const PANEL_WIDTH: usize = 320;
const PANEL_HEIGHT: usize = 200;
const GRATICULE_DEG: f64 = 10.0;

/// Series of one track panel, all indexed by sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackPanel {
    pub time: Vec<f64>,
    pub observed: Vec<f64>,
    pub model: Vec<Option<f64>>,
    pub reference: Vec<Option<f64>>,
}

/// One observation for the overview scatter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationPoint {
    pub lon: f64,
    pub lat: f64,
    pub ssh: f64,
}

/// RMSE per track for both candidates, one x position per track. Tracks
/// without coverage leave a gap.
pub fn render_rmse_chart(model: &[Option<f64>], reference: &[Option<f64>]) -> RenderResult<Vec<u8>> {
    let n = model.len().max(reference.len());
    let values: Vec<f64> = model.iter().chain(reference).flatten().copied().collect();
    let (_, hi) = finite_range(&values).ok_or_else(|| RenderError::Empty("no track has an RMSE".into()))?;

    let (width, height) = (960, 400);
    let mut canvas = Canvas::new(width, height, Color::WHITE)?;
    let area = PlotArea {
        x: 0.0,
        y: 0.0,
        width: width as f32,
        height: height as f32,
    }
    .inset(MARGIN);
    let frame = DataFrame::new(area, (0.0, n.saturating_sub(1) as f64), (0.0, hi * 1.05));

    draw_grid(&mut canvas, &frame, 4);
    let xs: Vec<f64> = (0..n).map(|k| k as f64).collect();
    canvas.series(&frame, &xs[..reference.len()], reference, Color::REFERENCE, 2.0);
    canvas.series(&frame, &xs[..model.len()], model, Color::MODEL, 2.0);
    canvas.stroke_rect(area, Color::BLACK, 1.0);

    debug!(tracks = n, "Rendered RMSE chart");
    canvas.encode()
}

/// Grid of track panels, `columns` per row, each showing the observed,
/// model and reference heights against time.
pub fn render_track_panels(panels: &[TrackPanel], columns: usize) -> RenderResult<Vec<u8>> {
    if panels.is_empty() {
        return Err(RenderError::Empty("no track panels".into()));
    }
    let columns = columns.clamp(1, panels.len());
    let rows = panels.len().div_ceil(columns);
    let mut canvas = Canvas::new(columns * PANEL_WIDTH, rows * PANEL_HEIGHT, Color::WHITE)?;

    for (k, panel) in panels.iter().enumerate() {
        let cell = PlotArea {
            x: ((k % columns) * PANEL_WIDTH) as f32,
            y: ((k / columns) * PANEL_HEIGHT) as f32,
            width: PANEL_WIDTH as f32,
            height: PANEL_HEIGHT as f32,
        }
        .inset(MARGIN / 2.0);

        let heights = panel
            .observed
            .iter()
            .chain(panel.model.iter().flatten())
            .chain(panel.reference.iter().flatten());
        let (Some(x_range), Some(y_range)) = (finite_range(&panel.time), finite_range(heights)) else {
            canvas.stroke_rect(cell, Color::GRID, 1.0);
            continue;
        };
        let frame = DataFrame::new(cell, x_range, y_range);

        draw_grid(&mut canvas, &frame, 3);
        let observed: Vec<Option<f64>> = panel.observed.iter().map(|v| Some(*v)).collect();
        canvas.series(&frame, &panel.time, &observed, Color::OBSERVED, 1.0);
        canvas.series(&frame, &panel.time, &panel.reference, Color::REFERENCE, 1.5);
        canvas.series(&frame, &panel.time, &panel.model, Color::MODEL, 1.5);
        canvas.stroke_rect(cell, Color::BLACK, 1.0);
    }

    debug!(panels = panels.len(), columns, rows, "Rendered track panels");
    canvas.encode()
}

/// Scatter of observations inside `bbox`, colored on a blue-white-red scale
/// symmetric around zero.
pub fn render_observation_map(points: &[ObservationPoint], bbox: &BoundingBox) -> RenderResult<Vec<u8>> {
    let inside: Vec<&ObservationPoint> = points
        .iter()
        .filter(|p| p.ssh.is_finite() && bbox.contains_point(p.lon, p.lat))
        .collect();
    if inside.is_empty() {
        return Err(RenderError::Empty("no observation inside the domain".into()));
    }
    let scale = DivergingScale::fitted(inside.iter().map(|p| &p.ssh));

    // Keep the domain's aspect ratio at the center latitude.
    let aspect = bbox.width() * ((bbox.lat_min + bbox.lat_max) / 2.0).to_radians().cos() / bbox.height();
    let height = 720usize;
    let width = ((height as f64) * aspect).clamp(240.0, 2400.0) as usize;

    let mut canvas = Canvas::new(width, height, Color::WHITE)?;
    let area = PlotArea {
        x: 0.0,
        y: 0.0,
        width: width as f32,
        height: height as f32,
    }
    .inset(MARGIN);
    let frame = DataFrame::new(area, (bbox.lon_min, bbox.lon_max), (bbox.lat_min, bbox.lat_max));

    draw_grid(&mut canvas, &frame, 5);
    for p in &inside {
        let lon = ocean_common::wrap_longitude(p.lon, bbox.lon_min);
        let (x, y) = frame.to_pixel(lon, p.lat);
        canvas.dot(x, y, 1.5, scale.color(p.ssh));
    }
    canvas.stroke_rect(area, Color::BLACK, 1.0);

    debug!(points = inside.len(), limit = scale.limit(), "Rendered observation map");
    canvas.encode()
}

/// Where the domain sits: the bounding box drawn over a wider lon/lat extent
/// padded by `pad_deg` on every side, with a 10 degree graticule.
pub fn render_domain_locator(bbox: &BoundingBox, pad_deg: f64) -> RenderResult<Vec<u8>> {
    if !(pad_deg.is_finite() && pad_deg >= 0.0) {
        return Err(RenderError::InvalidPadding(pad_deg));
    }
    let lon_range = (bbox.lon_min - pad_deg, bbox.lon_max + pad_deg);
    let lat_range = ((bbox.lat_min - pad_deg).max(-90.0), (bbox.lat_max + pad_deg).min(90.0));

    let (width, height) = (720usize, 540usize);
    let mut canvas = Canvas::new(width, height, Color::WHITE)?;
    let area = PlotArea {
        x: 0.0,
        y: 0.0,
        width: width as f32,
        height: height as f32,
    }
    .inset(MARGIN);
    let frame = DataFrame::new(area, lon_range, lat_range);
    canvas.fill_rect(area, Color::OCEAN);

    let mut lon = (lon_range.0 / GRATICULE_DEG).ceil() * GRATICULE_DEG;
    while lon <= lon_range.1 {
        let (x, _) = frame.to_pixel(lon, lat_range.0);
        canvas.polyline(&[(x, area.y), (x, area.y + area.height)], Color::GRID, 1.0);
        lon += GRATICULE_DEG;
    }
    let mut lat = (lat_range.0 / GRATICULE_DEG).ceil() * GRATICULE_DEG;
    while lat <= lat_range.1 {
        let (_, y) = frame.to_pixel(lon_range.0, lat);
        canvas.polyline(&[(area.x, y), (area.x + area.width, y)], Color::GRID, 1.0);
        lat += GRATICULE_DEG;
    }

    // Pixel y grows downward, so the top-left corner is (lon_min, lat_max).
    let (x0, y0) = frame.to_pixel(bbox.lon_min, bbox.lat_max);
    let (x1, y1) = frame.to_pixel(bbox.lon_max, bbox.lat_min);
    let domain = PlotArea {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    };
    canvas.fill_rect(domain, Color::DOMAIN);
    canvas.stroke_rect(domain, Color::DOMAIN_EDGE, 2.0);
    canvas.stroke_rect(area, Color::BLACK, 1.0);

    debug!(pad_deg, "Rendered domain locator");
    canvas.encode()
}

/// Evenly spaced light grid lines inside the frame.
fn draw_grid(canvas: &mut Canvas, frame: &DataFrame, divisions: usize) {
    let a = frame.area;
    for k in 1..divisions {
        let f = k as f32 / divisions as f32;
        let x = a.x + f * a.width;
        let y = a.y + f * a.height;
        canvas.polyline(&[(x, a.y), (x, a.y + a.height)], Color::GRID, 1.0);
        canvas.polyline(&[(a.x, y), (a.x + a.width, y)], Color::GRID, 1.0);
    }
}
