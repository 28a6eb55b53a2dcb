//! Colors and the diverging sea-level scale.

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GRID: Color = Color::rgb(210, 210, 210);
    /// Observed series.
    pub const OBSERVED: Color = Color::rgb(20, 20, 20);
    /// Pipeline output.
    pub const MODEL: Color = Color::rgb(31, 119, 180);
    /// Merged reference product.
    pub const REFERENCE: Color = Color::rgb(255, 127, 14);
    pub const OCEAN: Color = Color::rgb(198, 224, 245);
    /// Domain box on the locator map.
    pub const DOMAIN: Color = Color { r: 220, g: 30, b: 30, a: 178 };
    pub const DOMAIN_EDGE: Color = Color::rgb(180, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Linear color interpolation
fn interpolate_color(from: Color, to: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (f64::from(a) * (1.0 - t) + f64::from(b) * t).round() as u8;
    Color {
        r: mix(from.r, to.r),
        g: mix(from.g, to.g),
        b: mix(from.b, to.b),
        a: mix(from.a, to.a),
    }
}

/// Blue-white-red scale symmetric around zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergingScale {
    limit: f64,
}

impl DivergingScale {
    const NEGATIVE: Color = Color::rgb(5, 48, 97);
    const POSITIVE: Color = Color::rgb(103, 0, 31);

    /// Values at or beyond `±limit` saturate.
    pub fn new(limit: f64) -> Self {
        let limit = if limit.is_finite() && limit > 0.0 { limit } else { 1.0 };
        Self { limit }
    }

    /// Scale whose limit is the largest finite magnitude in `values`.
    pub fn fitted<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        let limit = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, |m, v| m.max(v.abs()));
        Self::new(limit)
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    pub fn color(&self, value: f64) -> Color {
        let s = (value / self.limit).clamp(-1.0, 1.0);
        if s < 0.0 {
            interpolate_color(Color::WHITE, Self::NEGATIVE, -s)
        } else {
            interpolate_color(Color::WHITE, Self::POSITIVE, s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_white_and_ends_saturate() {
        let scale = DivergingScale::new(0.5);
        assert_eq!(scale.color(0.0), Color::WHITE);
        assert_eq!(scale.color(-0.5), DivergingScale::NEGATIVE);
        assert_eq!(scale.color(3.0), DivergingScale::POSITIVE);
    }

    #[test]
    fn test_scale_is_symmetric() {
        let scale = DivergingScale::fitted(&[-0.2, 0.1, f64::NAN]);
        assert_eq!(scale.limit(), 0.2);
        let lo = scale.color(-0.1);
        let hi = scale.color(0.1);
        assert!(lo.b > lo.r);
        assert!(hi.r > hi.b);
    }

    #[test]
    fn test_degenerate_limit() {
        assert_eq!(DivergingScale::fitted(&[]).limit(), 1.0);
    }
}
