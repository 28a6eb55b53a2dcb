//! Format-independent model of a NetCDF dataset.
//!
//! Every backend converts to and from this model. Values are carried as
//! `f64`; fill values become `None` and packing attributes are applied by
//! [`NcVariable::unpack`] so callers only ever see physical values.

use std::collections::BTreeMap;

/// Fill value written for masked cells (the NetCDF default for doubles).
pub const FILL_VALUE: f64 = 9.969209968386869e36;

/// Attributes whose effect is folded into the values on read.
const PACKING_ATTRIBUTES: [&str; 4] = ["_FillValue", "missing_value", "scale_factor", "add_offset"];

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// First numeric value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Numbers(vs) => vs.first().copied(),
            AttrValue::Text(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NcDimension {
    pub name: String,
    pub len: usize,
    pub unlimited: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NcVariable {
    pub dims: Vec<String>,
    pub values: Vec<Option<f64>>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl NcVariable {
    pub fn new(dims: &[&str], values: Vec<Option<f64>>) -> Self {
        Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            values,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Replace fill values by `None`, apply `scale_factor`/`add_offset` and
    /// drop the packing attributes.
    pub fn unpack(&mut self) {
        let fills: Vec<f64> = ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|name| self.attributes.get(*name))
            .flat_map(|attr| match attr {
                AttrValue::Number(v) => vec![*v],
                AttrValue::Numbers(vs) => vs.clone(),
                AttrValue::Text(_) => Vec::new(),
            })
            .collect();
        let scale = self
            .attribute("scale_factor")
            .and_then(AttrValue::as_number)
            .unwrap_or(1.0);
        let offset = self
            .attribute("add_offset")
            .and_then(AttrValue::as_number)
            .unwrap_or(0.0);

        for value in self.values.iter_mut() {
            *value = match *value {
                Some(raw) if raw.is_finite() && !fills.iter().any(|f| is_fill(raw, *f)) => {
                    Some(raw * scale + offset)
                }
                _ => None,
            };
        }

        for name in PACKING_ATTRIBUTES {
            self.attributes.remove(name);
        }
    }
}

fn is_fill(value: f64, fill: f64) -> bool {
    if value == fill {
        return true;
    }
    // Float fill values round-trip through text with single precision.
    (value - fill).abs() <= 1e-6 * fill.abs()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NcDataset {
    pub dimensions: Vec<NcDimension>,
    pub variables: BTreeMap<String, NcVariable>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl NcDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dimension(&mut self, name: &str, len: usize, unlimited: bool) {
        self.dimensions.retain(|d| d.name != name);
        self.dimensions.push(NcDimension {
            name: name.to_string(),
            len,
            unlimited,
        });
    }

    pub fn add_variable(&mut self, name: &str, variable: NcVariable) {
        self.variables.insert(name.to_string(), variable);
    }

    pub fn dimension(&self, name: &str) -> Option<&NcDimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&NcVariable> {
        self.variables.get(name)
    }

    /// The first of `names` present in the dataset, with its name.
    pub fn first_variable<'a>(&'a self, names: &[&'a str]) -> Option<(&'a str, &'a NcVariable)> {
        names
            .iter()
            .find_map(|name| self.variables.get(*name).map(|v| (*name, v)))
    }

    /// Copy keeping only the named variables.
    pub fn select(&self, names: &[&str]) -> NcDataset {
        NcDataset {
            dimensions: self.dimensions.clone(),
            variables: self
                .variables
                .iter()
                .filter(|(name, _)| names.contains(&name.as_str()))
                .map(|(name, var)| (name.clone(), var.clone()))
                .collect(),
            attributes: self.attributes.clone(),
        }
    }

    /// Check every variable's value count against its dimensions.
    pub fn check_shapes(&self) -> Result<(), String> {
        for (name, var) in &self.variables {
            let mut expected = 1usize;
            for dim in &var.dims {
                let len = self
                    .dimension(dim)
                    .map(|d| d.len)
                    .ok_or_else(|| format!("variable {} uses undeclared dimension {}", name, dim))?;
                expected *= len;
            }
            if var.values.len() != expected {
                return Err(format!(
                    "variable {} has {} values, dimensions imply {}",
                    name,
                    var.values.len(),
                    expected
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_applies_fill_and_scale() {
        let mut var = NcVariable::new(&["x"], vec![Some(100.0), Some(-2147483647.0), None, Some(f64::NAN)])
            .with_attribute("_FillValue", -2147483647.0)
            .with_attribute("scale_factor", 0.0001)
            .with_attribute("add_offset", 1.0)
            .with_attribute("units", "m");
        var.unpack();

        assert!((var.values[0].unwrap() - 1.01).abs() < 1e-12);
        assert_eq!(&var.values[1..], &[None, None, None]);
        assert!(var.attribute("scale_factor").is_none());
        assert_eq!(var.attribute("units").and_then(AttrValue::as_text), Some("m"));
    }

    #[test]
    fn test_check_shapes() {
        let mut ds = NcDataset::new();
        ds.add_dimension("x", 2, false);
        ds.add_variable("a", NcVariable::new(&["x"], vec![Some(1.0), Some(2.0)]));
        assert!(ds.check_shapes().is_ok());

        ds.add_variable("b", NcVariable::new(&["x"], vec![Some(1.0)]));
        assert!(ds.check_shapes().is_err());
    }

    #[test]
    fn test_first_variable() {
        let mut ds = NcDataset::new();
        ds.add_variable("latitude", NcVariable::default());
        assert_eq!(ds.first_variable(&["lat", "latitude"]).map(|(n, _)| n), Some("latitude"));
        assert!(ds.first_variable(&["lon"]).is_none());
    }
}
