//! Drawing surface for the QA figures.

use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::png::encode_png_auto;

/// Pixel rectangle of one plot panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PlotArea {
    /// Shrink by `margin` pixels on every side.
    pub fn inset(&self, margin: f32) -> PlotArea {
        PlotArea {
            x: self.x + margin,
            y: self.y + margin,
            width: (self.width - 2.0 * margin).max(1.0),
            height: (self.height - 2.0 * margin).max(1.0),
        }
    }
}

/// Maps data coordinates onto a plot area, y growing upwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataFrame {
    pub area: PlotArea,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

impl DataFrame {
    pub fn new(area: PlotArea, x_range: (f64, f64), y_range: (f64, f64)) -> Self {
        Self {
            area,
            x_range: widen(x_range),
            y_range: widen(y_range),
        }
    }

    pub fn to_pixel(&self, x: f64, y: f64) -> (f32, f32) {
        let fx = (x - self.x_range.0) / (self.x_range.1 - self.x_range.0);
        let fy = (y - self.y_range.0) / (self.y_range.1 - self.y_range.0);
        (
            self.area.x + (fx as f32) * self.area.width,
            self.area.y + (1.0 - fy as f32) * self.area.height,
        )
    }
}

/// A zero-width range is widened so it can be drawn.
fn widen((lo, hi): (f64, f64)) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        let pad = if lo.abs() > 0.0 { lo.abs() * 0.05 } else { 1.0 };
        (lo - pad, hi + pad)
    }
}

/// Min and max over the finite values, if any.
pub fn finite_range<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Opaque canvas filled with `background`.
    pub fn new(width: usize, height: usize, background: Color) -> RenderResult<Self> {
        let mut pixmap = Pixmap::new(width as u32, height as u32)
            .ok_or(RenderError::InvalidDimensions { width, height })?;
        pixmap.fill(tiny_skia::Color::from_rgba8(
            background.r,
            background.g,
            background.b,
            background.a,
        ));
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> usize {
        self.pixmap.width() as usize
    }

    pub fn height(&self) -> usize {
        self.pixmap.height() as usize
    }

    fn paint(color: Color) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        paint
    }

    pub fn fill_rect(&mut self, area: PlotArea, color: Color) {
        if let Some(rect) = Rect::from_xywh(area.x, area.y, area.width, area.height) {
            self.pixmap
                .fill_rect(rect, &Self::paint(color), Transform::identity(), None);
        }
    }

    pub fn stroke_rect(&mut self, area: PlotArea, color: Color, width: f32) {
        let corners = [
            (area.x, area.y),
            (area.x + area.width, area.y),
            (area.x + area.width, area.y + area.height),
            (area.x, area.y + area.height),
            (area.x, area.y),
        ];
        self.polyline(&corners, color, width);
    }

    /// Connected line through `points`.
    pub fn polyline(&mut self, points: &[(f32, f32)], color: Color, width: f32) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        if rest.is_empty() {
            return;
        }
        let mut pb = PathBuilder::new();
        pb.move_to(first.0, first.1);
        for p in rest {
            pb.line_to(p.0, p.1);
        }
        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        if let Some(path) = pb.finish() {
            self.pixmap
                .stroke_path(&path, &Self::paint(color), &stroke, Transform::identity(), None);
        }
    }

    /// Line through a data series, broken wherever a value is missing.
    pub fn series(&mut self, frame: &DataFrame, xs: &[f64], ys: &[Option<f64>], color: Color, width: f32) {
        let mut run: Vec<(f32, f32)> = Vec::new();
        for (x, y) in xs.iter().zip(ys) {
            match y.filter(|v| v.is_finite()) {
                Some(y) => run.push(frame.to_pixel(*x, y)),
                None => {
                    self.segment_or_dot(&run, color, width);
                    run.clear();
                }
            }
        }
        self.segment_or_dot(&run, color, width);
    }

    fn segment_or_dot(&mut self, run: &[(f32, f32)], color: Color, width: f32) {
        match run {
            [] => {}
            [(x, y)] => self.dot(*x, *y, width, color),
            _ => self.polyline(run, color, width),
        }
    }

    pub fn dot(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        if let Some(path) = PathBuilder::from_circle(x, y, radius.max(0.5)) {
            self.pixmap.fill_path(
                &path,
                &Self::paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    /// Color at a pixel, for tests and sanity checks.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        let p = self.pixmap.pixel(x as u32, y as u32)?.demultiply();
        Some(Color {
            r: p.red(),
            g: p.green(),
            b: p.blue(),
            a: p.alpha(),
        })
    }

    /// Encode as PNG. The canvas is opaque, so premultiplied and straight
    /// alpha agree.
    pub fn encode(&self) -> RenderResult<Vec<u8>> {
        encode_png_auto(self.pixmap.data(), self.width(), self.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_maps_corners() {
        let area = PlotArea {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
        };
        let frame = DataFrame::new(area, (0.0, 1.0), (-1.0, 1.0));
        assert_eq!(frame.to_pixel(0.0, -1.0), (10.0, 70.0));
        assert_eq!(frame.to_pixel(1.0, 1.0), (110.0, 20.0));
    }

    #[test]
    fn test_flat_range_is_widened() {
        let frame = DataFrame::new(PlotArea { x: 0.0, y: 0.0, width: 10.0, height: 10.0 }, (0.0, 0.0), (2.0, 2.0));
        assert!(frame.x_range.1 > frame.x_range.0);
        assert!(frame.y_range.1 > frame.y_range.0);
    }

    #[test]
    fn test_finite_range_skips_nan() {
        assert_eq!(finite_range(&[f64::NAN, 2.0, -1.0]), Some((-1.0, 2.0)));
        assert_eq!(finite_range(&[f64::NAN]), None);
    }

    #[test]
    fn test_drawing_changes_pixels() {
        let mut canvas = Canvas::new(20, 20, Color::WHITE).unwrap();
        assert_eq!(canvas.pixel(10, 10), Some(Color::WHITE));
        canvas.fill_rect(PlotArea { x: 5.0, y: 5.0, width: 10.0, height: 10.0 }, Color::BLACK);
        assert_eq!(canvas.pixel(10, 10), Some(Color::BLACK));
        assert_eq!(canvas.pixel(1, 1), Some(Color::WHITE));
        assert!(canvas.encode().unwrap().starts_with(&[137, 80, 78, 71]));
    }

    #[test]
    fn test_zero_size_canvas_is_rejected() {
        assert!(Canvas::new(0, 10, Color::WHITE).is_err());
    }
}
