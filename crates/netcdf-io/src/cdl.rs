//! CDL text: parsing `ncdump` output and rendering input for `ncgen`.

use std::fmt::Write as _;

use crate::dataset::{AttrValue, NcDataset, NcVariable, FILL_VALUE};
use crate::error::{NetCdfError, NetCdfResult};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Dimensions,
    Variables,
    Data,
}

/// Parse the CDL printed by `ncdump` (header, and data for dumped variables).
///
/// Values are returned raw; call [`NcVariable::unpack`] to apply fill and
/// packing attributes. Character and string variables are declared but carry
/// no values. Nested groups are not supported.
pub fn parse_cdl(text: &str) -> NetCdfResult<NcDataset> {
    let mut dataset = NcDataset::new();
    let mut section = Section::Preamble;
    let mut text_vars: Vec<String> = Vec::new();
    let mut statement = String::new();
    let mut in_quotes = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if statement.trim().is_empty() && !in_quotes {
            match trimmed {
                "dimensions:" => {
                    section = Section::Dimensions;
                    continue;
                }
                "variables:" => {
                    section = Section::Variables;
                    continue;
                }
                "data:" => {
                    section = Section::Data;
                    continue;
                }
                "}" | "" => continue,
                _ if trimmed.starts_with("netcdf ") && trimmed.ends_with('{') => continue,
                _ if trimmed.starts_with("group:") => {
                    return Err(NetCdfError::InvalidFormat(
                        "nested groups are not supported".to_string(),
                    ))
                }
                _ => {}
            }
        }

        let mut chars = line.chars().peekable();
        let mut escaped = false;
        while let Some(c) = chars.next() {
            if in_quotes {
                statement.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_quotes = false;
                }
                continue;
            }
            match c {
                '"' => {
                    in_quotes = true;
                    statement.push(c);
                }
                '/' if chars.peek() == Some(&'/') => break,
                ';' => {
                    let stmt = std::mem::take(&mut statement);
                    apply_statement(&mut dataset, section, stmt.trim(), &mut text_vars)?;
                }
                _ => statement.push(c),
            }
        }
        if !statement.is_empty() {
            statement.push(' ');
        }
    }

    Ok(dataset)
}

fn apply_statement(
    dataset: &mut NcDataset,
    section: Section,
    stmt: &str,
    text_vars: &mut Vec<String>,
) -> NetCdfResult<()> {
    if stmt.is_empty() {
        return Ok(());
    }
    match section {
        Section::Preamble => Err(NetCdfError::InvalidFormat(format!(
            "statement outside any section: '{}'",
            stmt
        ))),
        Section::Dimensions => {
            let (name, value) = split_assignment(stmt)?;
            let value = value.trim();
            if value == "UNLIMITED" {
                // The current length is learned from the data or stays 0 for header-only dumps.
                dataset.add_dimension(name, 0, true);
            } else {
                let len = value.parse().map_err(|_| {
                    NetCdfError::InvalidFormat(format!("bad dimension length in '{}'", stmt))
                })?;
                dataset.add_dimension(name, len, false);
            }
            Ok(())
        }
        Section::Variables => {
            if find_top_level(stmt, '=').is_some() {
                let (target, value) = split_assignment(stmt)?;
                let (var, attr) = target.split_once(':').ok_or_else(|| {
                    NetCdfError::InvalidFormat(format!("bad attribute statement '{}'", stmt))
                })?;
                let value = parse_attribute_value(value)?;
                let var = var.trim();
                if var.is_empty() {
                    dataset.attributes.insert(attr.trim().to_string(), value);
                } else if let Some(variable) = dataset.variables.get_mut(var) {
                    variable.attributes.insert(attr.trim().to_string(), value);
                } else {
                    return Err(NetCdfError::InvalidFormat(format!(
                        "attribute for undeclared variable '{}'",
                        var
                    )));
                }
                Ok(())
            } else {
                declare_variable(dataset, stmt, text_vars)
            }
        }
        Section::Data => {
            let (name, value) = split_assignment(stmt)?;
            let name = name.trim();
            if text_vars.iter().any(|v| v == name) {
                return Ok(());
            }
            let values = parse_data_values(value)?;
            let variable = dataset.variables.get_mut(name).ok_or_else(|| {
                NetCdfError::InvalidFormat(format!("data for undeclared variable '{}'", name))
            })?;
            variable.values = values;
            let dims = variable.dims.clone();
            let count = variable.values.len();
            infer_unlimited_length(dataset, &dims, count);
            Ok(())
        }
    }
}

fn declare_variable(
    dataset: &mut NcDataset,
    stmt: &str,
    text_vars: &mut Vec<String>,
) -> NetCdfResult<()> {
    let (type_name, rest) = stmt
        .split_once(char::is_whitespace)
        .ok_or_else(|| NetCdfError::InvalidFormat(format!("bad variable declaration '{}'", stmt)))?;
    let rest = rest.trim();
    let (name, dims) = match rest.split_once('(') {
        Some((name, dims)) => {
            let dims = dims.trim_end().trim_end_matches(')');
            let dims: Vec<String> = dims
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
            (name.trim(), dims)
        }
        None => (rest, Vec::new()),
    };

    match type_name {
        "char" | "string" => text_vars.push(name.to_string()),
        "byte" | "ubyte" | "short" | "ushort" | "int" | "uint" | "int64" | "uint64" | "float"
        | "double" | "real" | "long" => {}
        other => {
            return Err(NetCdfError::InvalidFormat(format!(
                "unsupported variable type '{}'",
                other
            )))
        }
    }

    dataset.add_variable(
        name,
        NcVariable {
            dims,
            ..NcVariable::default()
        },
    );
    Ok(())
}

/// Data of an unlimited dimension tells how long it currently is.
fn infer_unlimited_length(dataset: &mut NcDataset, dims: &[String], count: usize) {
    let mut fixed = 1usize;
    let mut unlimited = None;
    for dim in dims {
        match dataset.dimension(dim) {
            Some(d) if d.unlimited => unlimited = Some(dim.clone()),
            Some(d) => fixed *= d.len,
            None => return,
        }
    }
    if let Some(name) = unlimited {
        if fixed > 0 {
            if let Some(d) = dataset.dimensions.iter_mut().find(|d| d.name == name) {
                d.len = d.len.max(count / fixed);
            }
        }
    }
}

fn split_assignment(stmt: &str) -> NetCdfResult<(&str, &str)> {
    let idx = find_top_level(stmt, '=')
        .ok_or_else(|| NetCdfError::InvalidFormat(format!("expected '=' in '{}'", stmt)))?;
    Ok((stmt[..idx].trim(), stmt[idx + 1..].trim()))
}

fn find_top_level(s: &str, target: char) -> Option<usize> {
    split_top_level_indices(s, target).into_iter().next()
}

fn split_top_level_indices(s: &str, target: char) -> Vec<usize> {
    let mut found = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == target {
            found.push(i);
        }
    }
    found
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for idx in split_top_level_indices(s, ',') {
        parts.push(s[start..idx].trim());
        start = idx + 1;
    }
    parts.push(s[start..].trim());
    parts
}

fn parse_attribute_value(value: &str) -> NetCdfResult<AttrValue> {
    let parts = split_top_level(value);
    if parts.first().is_some_and(|p| p.starts_with('"')) {
        let mut text = String::new();
        for part in parts {
            text.push_str(&unquote(part)?);
        }
        return Ok(AttrValue::Text(text));
    }

    let mut numbers = Vec::with_capacity(parts.len());
    for part in parts {
        numbers.push(parse_number(part).ok_or_else(|| {
            NetCdfError::InvalidFormat(format!("bad attribute value '{}'", part))
        })?);
    }
    if numbers.len() == 1 {
        Ok(AttrValue::Number(numbers[0]))
    } else {
        Ok(AttrValue::Numbers(numbers))
    }
}

fn parse_data_values(value: &str) -> NetCdfResult<Vec<Option<f64>>> {
    let mut values = Vec::new();
    for part in split_top_level(value) {
        if part.is_empty() {
            continue;
        }
        if part == "_" {
            values.push(None);
            continue;
        }
        let v = parse_number(part)
            .ok_or_else(|| NetCdfError::InvalidFormat(format!("bad data value '{}'", part)))?;
        values.push(Some(v));
    }
    Ok(values)
}

/// Parse a CDL numeric constant, including type suffixes and NaN/Infinity.
fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim();
    let (sign, body) = match token.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, token.strip_prefix('+').unwrap_or(token)),
    };
    let lower = body.to_ascii_lowercase();
    if lower == "nan" || lower == "nanf" {
        return Some(f64::NAN);
    }
    if lower == "infinity" || lower == "infinityf" || lower == "inf" {
        return Some(sign * f64::INFINITY);
    }
    let stripped = body.trim_end_matches(['b', 'B', 's', 'S', 'l', 'L', 'u', 'U', 'f', 'F']);
    stripped.parse::<f64>().ok().map(|v| sign * v)
}

fn unquote(part: &str) -> NetCdfResult<String> {
    let inner = part
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .ok_or_else(|| NetCdfError::InvalidFormat(format!("bad string constant {}", part)))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn render_number(v: f64) -> String {
    format!("{:e}", v)
}

fn render_attribute(value: &AttrValue) -> String {
    match value {
        AttrValue::Text(s) => quote(s),
        AttrValue::Number(v) => render_number(*v),
        AttrValue::Numbers(vs) => vs
            .iter()
            .map(|v| render_number(*v))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Render a dataset as CDL for `ncgen`. Every variable is written as
/// `double` with [`FILL_VALUE`] as fill; `None` values become `_`.
pub fn render_cdl(name: &str, dataset: &NcDataset) -> NetCdfResult<String> {
    dataset
        .check_shapes()
        .map_err(NetCdfError::InvalidFormat)?;

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "netcdf {} {{", name);

    out.push_str("dimensions:\n");
    for dim in &dataset.dimensions {
        if dim.unlimited {
            let _ = writeln!(out, "\t{} = UNLIMITED ; // ({} currently)", dim.name, dim.len);
        } else {
            let _ = writeln!(out, "\t{} = {} ;", dim.name, dim.len);
        }
    }

    out.push_str("variables:\n");
    for (var_name, var) in &dataset.variables {
        if var.dims.is_empty() {
            let _ = writeln!(out, "\tdouble {} ;", var_name);
        } else {
            let _ = writeln!(out, "\tdouble {}({}) ;", var_name, var.dims.join(", "));
        }
        let _ = writeln!(out, "\t\t{}:_FillValue = {} ;", var_name, render_number(FILL_VALUE));
        for (attr, value) in &var.attributes {
            if attr == "_FillValue" {
                continue;
            }
            let _ = writeln!(out, "\t\t{}:{} = {} ;", var_name, attr, render_attribute(value));
        }
    }

    if !dataset.attributes.is_empty() {
        out.push_str("\n// global attributes:\n");
        for (attr, value) in &dataset.attributes {
            let _ = writeln!(out, "\t\t:{} = {} ;", attr, render_attribute(value));
        }
    }

    out.push_str("data:\n");
    for (var_name, var) in &dataset.variables {
        if var.values.is_empty() {
            continue;
        }
        let _ = write!(out, "\n {} =", var_name);
        for (i, value) in var.values.iter().enumerate() {
            if i % 8 == 0 {
                out.push_str("\n  ");
            } else {
                out.push(' ');
            }
            match value {
                Some(v) if v.is_finite() => out.push_str(&render_number(*v)),
                _ => out.push('_'),
            }
            if i + 1 < var.values.len() {
                out.push(',');
            }
        }
        out.push_str(" ;\n");
    }
    out.push_str("}\n");
    Ok(out)
}
