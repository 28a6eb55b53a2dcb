//! Gridded fields on (time, latitude, longitude) axes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Value of a field at a point: a number, a masked cell, or outside the grid.
///
/// Missing data is never represented by zero or NaN once a value has left
/// the NetCDF boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Valid(f64),
    Masked,
    OutOfDomain,
}

impl CellValue {
    pub fn valid(self) -> Option<f64> {
        match self {
            CellValue::Valid(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CellValue::Valid(_))
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => CellValue::Valid(v),
            _ => CellValue::Masked,
        }
    }
}

/// Position of a coordinate along an axis: the bracketing nodes and the
/// linear weight of `upper`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisPosition {
    pub lower: usize,
    pub upper: usize,
    pub weight: f64,
}

/// A monotonic coordinate axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    values: Vec<f64>,
    descending: bool,
}

impl Axis {
    /// Strictly monotonic axis, increasing or decreasing.
    pub fn strict(values: Vec<f64>) -> PipelineResult<Self> {
        check_finite(&values)?;
        let descending = values.len() > 1 && values[1] < values[0];
        let ordered = values.windows(2).all(|w| {
            if descending {
                w[1] < w[0]
            } else {
                w[1] > w[0]
            }
        });
        if !ordered {
            return Err(PipelineError::Data(
                "spatial axis is not strictly monotonic".to_string(),
            ));
        }
        Ok(Self { values, descending })
    }

    /// Non-decreasing axis; repeated values are allowed (time axes).
    pub fn non_decreasing(values: Vec<f64>) -> PipelineResult<Self> {
        check_finite(&values)?;
        if values.windows(2).any(|w| w[1] < w[0]) {
            return Err(PipelineError::Data(
                "time axis is not non-decreasing".to_string(),
            ));
        }
        Ok(Self {
            values,
            descending: false,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    pub fn min(&self) -> Option<f64> {
        if self.descending {
            self.values.last().copied()
        } else {
            self.values.first().copied()
        }
    }

    pub fn max(&self) -> Option<f64> {
        if self.descending {
            self.values.first().copied()
        } else {
            self.values.last().copied()
        }
    }

    /// Closed hull test.
    pub fn contains(&self, q: f64) -> bool {
        match (self.min(), self.max()) {
            (Some(lo), Some(hi)) => q >= lo && q <= hi,
            _ => false,
        }
    }

    /// Locate `q` between two nodes.
    ///
    /// A coordinate on an interior node maps to the interval starting at that
    /// node with weight 0. Among repeated values the last one is the lower
    /// node. The final node maps to itself with weight 0. Returns `None`
    /// outside the closed hull.
    pub fn locate(&self, q: f64) -> Option<AxisPosition> {
        if !q.is_finite() || !self.contains(q) {
            return None;
        }
        let n = self.values.len();
        if n == 1 {
            return Some(AxisPosition {
                lower: 0,
                upper: 0,
                weight: 0.0,
            });
        }

        let sign = if self.descending { -1.0 } else { 1.0 };
        let key = sign * q;
        // Number of nodes not past q in axis direction; at least 1 inside the hull.
        let count = self.values.partition_point(|v| sign * v <= key);
        let lower = count - 1;
        if lower == n - 1 {
            return Some(AxisPosition {
                lower,
                upper: lower,
                weight: 0.0,
            });
        }

        let upper = lower + 1;
        let width = sign * (self.values[upper] - self.values[lower]);
        let weight = (key - sign * self.values[lower]) / width;
        Some(AxisPosition {
            lower,
            upper,
            weight,
        })
    }

    /// Indices of the nodes inside `[lo, hi]`, as a contiguous range.
    pub fn index_range(&self, lo: f64, hi: f64) -> std::ops::Range<usize> {
        let inside: Vec<usize> = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v >= lo && **v <= hi)
            .map(|(i, _)| i)
            .collect();
        match (inside.first(), inside.last()) {
            (Some(first), Some(last)) => *first..*last + 1,
            _ => 0..0,
        }
    }

    /// Sub-axis covering `range`.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Self {
        Self {
            values: self.values[range].to_vec(),
            descending: self.descending,
        }
    }
}

fn check_finite(values: &[f64]) -> PipelineResult<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Data(
            "axis contains non-finite coordinates".to_string(),
        ));
    }
    Ok(())
}

/// One or more variables sharing (time, lat, lon) axes.
///
/// Variables are stored row-major with longitude varying fastest:
/// `index = t * ny * nx + j * nx + i`. Masked cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedField {
    pub time: Axis,
    pub lat: Axis,
    pub lon: Axis,
    variables: BTreeMap<String, Vec<Option<f64>>>,
}

impl GriddedField {
    pub fn new(time: Axis, lat: Axis, lon: Axis) -> Self {
        Self {
            time,
            lat,
            lon,
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, name: &str, data: Vec<Option<f64>>) -> PipelineResult<Self> {
        self.insert_variable(name, data)?;
        Ok(self)
    }

    pub fn insert_variable(&mut self, name: &str, data: Vec<Option<f64>>) -> PipelineResult<()> {
        let expected = self.cell_count();
        if data.len() != expected {
            return Err(PipelineError::Data(format!(
                "variable {} has {} values, grid has {} cells",
                name,
                data.len(),
                expected
            )));
        }
        self.variables.insert(name.to_string(), data);
        Ok(())
    }

    /// (nt, ny, nx)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.time.len(), self.lat.len(), self.lon.len())
    }

    pub fn cell_count(&self) -> usize {
        let (nt, ny, nx) = self.shape();
        nt * ny * nx
    }

    pub fn variable(&self, name: &str) -> Option<&[Option<f64>]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.variables
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
    }

    pub fn index(&self, t: usize, j: usize, i: usize) -> usize {
        let (_, ny, nx) = self.shape();
        t * ny * nx + j * nx + i
    }

    pub fn cell(&self, name: &str, t: usize, j: usize, i: usize) -> CellValue {
        let (nt, ny, nx) = self.shape();
        if t >= nt || j >= ny || i >= nx {
            return CellValue::OutOfDomain;
        }
        match self.variable(name) {
            Some(data) => CellValue::from(data[self.index(t, j, i)]),
            None => CellValue::OutOfDomain,
        }
    }

    /// The (ny * nx) slice of a variable at time index `t`.
    pub fn time_slice(&self, name: &str, t: usize) -> Option<&[Option<f64>]> {
        let (nt, ny, nx) = self.shape();
        if t >= nt {
            return None;
        }
        let plane = ny * nx;
        self.variable(name).map(|data| &data[t * plane..(t + 1) * plane])
    }

    /// Join fields with identical spatial axes along time.
    ///
    /// Fields are ordered by their first time value; only variables present
    /// in every field are kept.
    pub fn concat_time(mut fields: Vec<GriddedField>) -> PipelineResult<GriddedField> {
        if fields.is_empty() {
            return Err(PipelineError::Data("no fields to concatenate".to_string()));
        }
        fields.sort_by(|a, b| {
            let ta = a.time.values().first().copied().unwrap_or(f64::INFINITY);
            let tb = b.time.values().first().copied().unwrap_or(f64::INFINITY);
            ta.total_cmp(&tb)
        });

        let first = &fields[0];
        for other in &fields[1..] {
            if other.lat != first.lat || other.lon != first.lon {
                return Err(PipelineError::Data(
                    "cannot concatenate fields with different spatial axes".to_string(),
                ));
            }
        }

        let names: Vec<String> = first
            .variables
            .keys()
            .filter(|name| fields.iter().all(|f| f.variables.contains_key(*name)))
            .cloned()
            .collect();

        let times: Vec<f64> = fields
            .iter()
            .flat_map(|f| f.time.values().iter().copied())
            .collect();
        let time = Axis::non_decreasing(times)?;

        let mut joined = GriddedField::new(time, first.lat.clone(), first.lon.clone());
        for name in names {
            let data: Vec<Option<f64>> = fields
                .iter()
                .flat_map(|f| f.variables[&name].iter().copied())
                .collect();
            joined.insert_variable(&name, data)?;
        }
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_interior_and_nodes() {
        let axis = Axis::strict(vec![0.0, 1.0, 2.0, 4.0]).unwrap();
        let pos = axis.locate(3.0).unwrap();
        assert_eq!((pos.lower, pos.upper), (2, 3));
        assert!((pos.weight - 0.5).abs() < 1e-12);

        // Interior node: interval starting at the node, zero weight.
        let pos = axis.locate(1.0).unwrap();
        assert_eq!((pos.lower, pos.upper, pos.weight), (1, 2, 0.0));

        // Closed hull at both ends.
        assert_eq!(axis.locate(0.0).unwrap().lower, 0);
        let last = axis.locate(4.0).unwrap();
        assert_eq!((last.lower, last.upper, last.weight), (3, 3, 0.0));

        assert!(axis.locate(-0.001).is_none());
        assert!(axis.locate(4.001).is_none());
        assert!(axis.locate(f64::NAN).is_none());
    }

    #[test]
    fn test_locate_descending() {
        let axis = Axis::strict(vec![30.0, 20.0, 10.0]).unwrap();
        assert!(axis.is_descending());
        let pos = axis.locate(15.0).unwrap();
        assert_eq!((pos.lower, pos.upper), (1, 2));
        assert!((pos.weight - 0.5).abs() < 1e-12);
        assert_eq!(axis.min(), Some(10.0));
        assert!(axis.locate(31.0).is_none());
    }

    #[test]
    fn test_locate_single_point() {
        let axis = Axis::strict(vec![5.0]).unwrap();
        assert!(axis.locate(5.0).is_some());
        assert!(axis.locate(5.0001).is_none());
    }

    #[test]
    fn test_locate_duplicate_times() {
        let axis = Axis::non_decreasing(vec![0.0, 1.0, 1.0, 2.0]).unwrap();
        let pos = axis.locate(1.0).unwrap();
        assert_eq!((pos.lower, pos.upper, pos.weight), (2, 3, 0.0));
        let pos = axis.locate(1.5).unwrap();
        assert_eq!((pos.lower, pos.upper), (2, 3));
    }

    #[test]
    fn test_axis_rejects_unordered() {
        assert!(Axis::strict(vec![0.0, 2.0, 1.0]).is_err());
        assert!(Axis::strict(vec![0.0, 0.0]).is_err());
        assert!(Axis::non_decreasing(vec![1.0, 0.0]).is_err());
        assert!(Axis::strict(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_cell_access() {
        let time = Axis::non_decreasing(vec![0.0]).unwrap();
        let lat = Axis::strict(vec![10.0, 11.0]).unwrap();
        let lon = Axis::strict(vec![0.0, 1.0, 2.0]).unwrap();
        let field = GriddedField::new(time, lat, lon)
            .with_variable("ssh", vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0), Some(6.0)])
            .unwrap();

        assert_eq!(field.shape(), (1, 2, 3));
        assert_eq!(field.cell("ssh", 0, 1, 2), CellValue::Valid(6.0));
        assert_eq!(field.cell("ssh", 0, 0, 1), CellValue::Masked);
        assert_eq!(field.cell("ssh", 0, 2, 0), CellValue::OutOfDomain);
        assert_eq!(field.cell("adt", 0, 0, 0), CellValue::OutOfDomain);
        assert_eq!(field.time_slice("ssh", 0).unwrap().len(), 6);
    }

    #[test]
    fn test_insert_rejects_wrong_length() {
        let time = Axis::non_decreasing(vec![0.0]).unwrap();
        let lat = Axis::strict(vec![10.0]).unwrap();
        let lon = Axis::strict(vec![0.0, 1.0]).unwrap();
        assert!(GriddedField::new(time, lat, lon)
            .with_variable("ssh", vec![Some(1.0)])
            .is_err());
    }

    #[test]
    fn test_concat_time_sorts_by_first_time() {
        let lat = Axis::strict(vec![0.0]).unwrap();
        let lon = Axis::strict(vec![0.0]).unwrap();
        let make = |t: f64, v: f64| {
            GriddedField::new(Axis::non_decreasing(vec![t]).unwrap(), lat.clone(), lon.clone())
                .with_variable("adt", vec![Some(v)])
                .unwrap()
        };

        let joined = GriddedField::concat_time(vec![make(2.0, 20.0), make(1.0, 10.0)]).unwrap();
        assert_eq!(joined.time.values(), &[1.0, 2.0]);
        assert_eq!(joined.variable("adt").unwrap(), &[Some(10.0), Some(20.0)]);
    }

    #[test]
    fn test_concat_time_rejects_mismatched_grids() {
        let time = Axis::non_decreasing(vec![0.0]).unwrap();
        let a = GriddedField::new(
            time.clone(),
            Axis::strict(vec![0.0]).unwrap(),
            Axis::strict(vec![0.0]).unwrap(),
        );
        let b = GriddedField::new(
            time,
            Axis::strict(vec![1.0]).unwrap(),
            Axis::strict(vec![0.0]).unwrap(),
        );
        assert!(GriddedField::concat_time(vec![a, b]).is_err());
    }
}
