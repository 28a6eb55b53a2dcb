//! Surface geostrophic velocity and normalized relative vorticity.
//!
//! Derivatives use metric spacing on a spherical Earth, centred differences
//! inside the grid and one-sided differences on its edges.

use ocean_common::{GriddedField, PipelineError, PipelineResult};

pub const GRAVITY: f64 = 9.81;
pub const EARTH_ROTATION_RATE: f64 = 7.2921e-5;
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Below this the Coriolis parameter is treated as zero.
const MIN_CORIOLIS: f64 = 1e-10;

/// Coriolis parameter `2 Ω sin(lat)` for a latitude in degrees.
pub fn coriolis(lat: f64) -> f64 {
    2.0 * EARTH_ROTATION_RATE * lat.to_radians().sin()
}

/// Derived variables on the grid of the source field, `(t, lat, lon)` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Geostrophy {
    pub u: Vec<Option<f64>>,
    pub v: Vec<Option<f64>>,
    pub xi_norm: Vec<Option<f64>>,
}

impl Geostrophy {
    /// Copy of `field` with `u`, `v` and `xi_norm` added.
    pub fn attach_to(self, field: &GriddedField) -> PipelineResult<GriddedField> {
        field
            .clone()
            .with_variable("u", self.u)?
            .with_variable("v", self.v)?
            .with_variable("xi_norm", self.xi_norm)
    }
}

/// Derive geostrophic currents and `xi_norm = (dv/dx - du/dy) / f` from the
/// surface height `variable`.
pub fn derive_geostrophy(field: &GriddedField, variable: &str) -> PipelineResult<Geostrophy> {
    let eta = field
        .variable(variable)
        .ok_or_else(|| PipelineError::Data(format!("field has no variable {}", variable)))?;
    let (nt, ny, nx) = field.shape();
    let plane = ny * nx;
    let grid = Metric::new(field);

    let mut u = Vec::with_capacity(eta.len());
    let mut v = Vec::with_capacity(eta.len());
    for t in 0..nt {
        let slice = &eta[t * plane..(t + 1) * plane];
        for j in 0..ny {
            for i in 0..nx {
                let g_over_f = match grid.g_over_f(j) {
                    Some(g) if slice[j * nx + i].is_some() => g,
                    _ => {
                        u.push(None);
                        v.push(None);
                        continue;
                    }
                };
                u.push(grid.d_dy(slice, j, i).map(|d| -g_over_f * d));
                v.push(grid.d_dx(slice, j, i).map(|d| g_over_f * d));
            }
        }
    }

    let mut xi_norm = Vec::with_capacity(eta.len());
    for t in 0..nt {
        let us = &u[t * plane..(t + 1) * plane];
        let vs = &v[t * plane..(t + 1) * plane];
        for j in 0..ny {
            for i in 0..nx {
                let f = coriolis(grid.lat[j]);
                let value = match (grid.d_dx(vs, j, i), grid.d_dy(us, j, i)) {
                    (Some(dvdx), Some(dudy)) if f.abs() >= MIN_CORIOLIS && us[j * nx + i].is_some() => {
                        Some((dvdx - dudy) / f)
                    }
                    _ => None,
                };
                xi_norm.push(value);
            }
        }
    }

    Ok(Geostrophy { u, v, xi_norm })
}

struct Metric<'a> {
    lat: &'a [f64],
    lon: &'a [f64],
    nx: usize,
}

impl<'a> Metric<'a> {
    fn new(field: &'a GriddedField) -> Self {
        Self {
            lat: field.lat.values(),
            lon: field.lon.values(),
            nx: field.lon.len(),
        }
    }

    fn g_over_f(&self, j: usize) -> Option<f64> {
        let f = coriolis(self.lat[j]);
        (f.abs() >= MIN_CORIOLIS).then(|| GRAVITY / f)
    }

    /// Northward derivative in units per metre.
    fn d_dy(&self, slice: &[Option<f64>], j: usize, i: usize) -> Option<f64> {
        let (a, b) = stencil(j, self.lat.len())?;
        let dy = EARTH_RADIUS_M * (self.lat[b] - self.lat[a]).to_radians();
        Some((slice[b * self.nx + i]? - slice[a * self.nx + i]?) / dy)
    }

    /// Eastward derivative in units per metre.
    fn d_dx(&self, slice: &[Option<f64>], j: usize, i: usize) -> Option<f64> {
        let (a, b) = stencil(i, self.nx)?;
        let cos_lat = self.lat[j].to_radians().cos();
        if cos_lat.abs() < MIN_CORIOLIS {
            return None;
        }
        let dx = EARTH_RADIUS_M * cos_lat * (self.lon[b] - self.lon[a]).to_radians();
        let row = j * self.nx;
        Some((slice[row + b]? - slice[row + a]?) / dx)
    }
}

/// Indices of the difference stencil at position `k` of `n`.
fn stencil(k: usize, n: usize) -> Option<(usize, usize)> {
    match n {
        0 | 1 => None,
        _ if k == 0 => Some((0, 1)),
        _ if k == n - 1 => Some((n - 2, n - 1)),
        _ => Some((k - 1, k + 1)),
    }
}
