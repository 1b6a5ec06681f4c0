//! Fixed-format unit reports.
//!
//! Every unit model renders the same two-part report: a "Unit Performance"
//! table of key variables (value, fixed flag, bounds) and a "Stream Table" of
//! volumetric flow and mass concentrations per port. The output format is
//! stable and whitespace-sensitive; downstream tooling matches it verbatim,
//! so the value formatter reproduces `%#.5g` (five significant digits,
//! trailing zeros kept) and bounds print in their canonical short form
//! (`None`, `0`, `1e-08`, `1.0000001`).

use crate::core::variable::{VarId, VarPool};

const LINE_WIDTH: usize = 84;

/// One row of the performance table.
#[derive(Debug, Clone)]
pub struct PerformanceRow {
    /// Display key, e.g. `Solute Removal [bod]`.
    pub key: String,

    /// Current value.
    pub value: f64,

    /// Whether the variable is fixed.
    pub fixed: bool,

    /// Variable bounds.
    pub bounds: (Option<f64>, Option<f64>),
}

/// Key unit variables reported in the performance table.
#[derive(Debug, Clone, Default)]
pub struct PerformanceContents {
    /// Rows in arbitrary order; rendering sorts by key.
    pub rows: Vec<PerformanceRow>,
}

impl PerformanceContents {
    /// Adds a row describing one pool variable.
    pub fn push_var(&mut self, key: impl Into<String>, pool: &VarPool, id: VarId) {
        self.rows.push(PerformanceRow {
            key: key.into(),
            value: pool.get(id),
            fixed: pool.is_fixed(id),
            bounds: pool.bounds(id),
        });
    }
}

/// One row of the stream table.
#[derive(Debug, Clone)]
pub struct StreamRow {
    /// Row label, e.g. `Mass Concentration bod`.
    pub label: String,

    /// One value per stream column.
    pub values: Vec<f64>,
}

/// Per-port stream summary.
#[derive(Debug, Clone, Default)]
pub struct StreamTable {
    /// Column headers, e.g. `Inlet`, `Treated`, `Byproduct`.
    pub columns: Vec<String>,

    /// Rows in display order.
    pub rows: Vec<StreamRow>,
}

/// Formats a value like `%#.5g`: five significant digits, trailing zeros
/// kept, scientific notation outside `1e-4..1e5`.
///
/// ```
/// use aquasheet::core::report::fmt_value;
///
/// assert_eq!(fmt_value(17.80995), "17.810");
/// assert_eq!(fmt_value(0.0016900), "0.0016900");
/// assert_eq!(fmt_value(4.7337e-7), "4.7337e-07");
/// assert_eq!(fmt_value(0.0), "0.0000");
/// ```
#[must_use]
pub fn fmt_value(v: f64) -> String {
    if v == 0.0 {
        return "0.0000".to_string();
    }
    if !v.is_finite() {
        return v.to_string();
    }
    let sign = if v < 0.0 { "-" } else { "" };
    // Rounding to five significant digits, including the carry across a
    // power of ten, is delegated to the exponential formatter.
    let sci = format!("{:.4e}", v.abs());
    let (mantissa, exp) = sci
        .split_once('e')
        .expect("{:e} output always contains an exponent");
    let exp: i32 = exp.parse().expect("exponent is a valid integer");

    if !(-4..5).contains(&exp) {
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{sign}{mantissa}e{exp_sign}{:02}", exp.abs())
    } else {
        let digits = mantissa.replace('.', "");
        let mut out = String::from(sign);
        if exp < 0 {
            out.push_str("0.");
            for _ in 0..(-exp - 1) {
                out.push('0');
            }
            out.push_str(&digits);
        } else {
            let point = (exp + 1) as usize;
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        }
        out
    }
}

/// Formats one bound the way it appears in the report.
#[must_use]
pub fn fmt_bound(bound: Option<f64>) -> String {
    match bound {
        None => "None".to_string(),
        Some(v) if v == v.trunc() && v.abs() < 1e16 => format!("{}", v as i64),
        Some(v) if v.abs() < 1e-4 => {
            let sci = format!("{v:e}");
            let (mantissa, exp) = sci
                .split_once('e')
                .expect("{:e} output always contains an exponent");
            let exp: i32 = exp.parse().expect("exponent is a valid integer");
            let exp_sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{exp_sign}{:02}", exp.abs())
        }
        Some(v) => format!("{v}"),
    }
}

fn fmt_bounds(bounds: (Option<f64>, Option<f64>)) -> String {
    format!("({}, {})", fmt_bound(bounds.0), fmt_bound(bounds.1))
}

fn performance_section(out: &mut String, contents: &PerformanceContents) {
    out.push_str("    Unit Performance\n\n    Variables: \n\n");

    let mut rows = contents.rows.clone();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    let formatted: Vec<(String, String, String, String)> = rows
        .iter()
        .map(|r| {
            (
                r.key.clone(),
                fmt_value(r.value),
                if r.fixed { "True" } else { "False" }.to_string(),
                fmt_bounds(r.bounds),
            )
        })
        .collect();

    let key_width = formatted.iter().map(|r| r.0.len()).max().unwrap_or(3).max(3);
    let value_width = formatted.iter().map(|r| r.1.len()).max().unwrap_or(5).max(5);

    out.push_str(&format!(
        "    {:<key_width$} : {:<value_width$} : Fixed : Bounds\n",
        "Key", "Value"
    ));
    for (key, value, fixed, bounds) in &formatted {
        out.push_str(&format!(
            "    {key:>key_width$} : {value:>value_width$} : {fixed:>5} : {bounds}\n"
        ));
    }
}

fn stream_section(out: &mut String, table: &StreamTable) {
    out.push_str("    Stream Table\n");

    let label_width = table.rows.iter().map(|r| r.label.len()).max().unwrap_or(0);
    let formatted: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.values.iter().map(|v| fmt_value(*v)).collect())
        .collect();
    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            formatted
                .iter()
                .map(|row| row[i].len())
                .max()
                .unwrap_or(0)
                .max(header.len())
        })
        .collect();

    // Header cells are right-justified like data cells, except that the
    // first column header sits one character to the left and the second
    // absorbs the slack.
    let mut header = format!("    {:label_width$}", "");
    for (i, (name, width)) in table.columns.iter().zip(&widths).enumerate() {
        match i {
            0 => header.push_str(&format!("{name:>width$}")),
            1 => header.push_str(&format!("  {name:>width$}")),
            _ => header.push_str(&format!(" {name:>width$}")),
        }
    }
    out.push_str(&header);
    out.push('\n');

    for (row, cells) in table.rows.iter().zip(&formatted) {
        let mut line = format!("    {:<label_width$}", row.label);
        for (cell, width) in cells.iter().zip(&widths) {
            line.push_str(&format!(" {cell:>width$}"));
        }
        out.push_str(&line);
        out.push('\n');
    }
}

/// Renders the full fixed-format report for a unit.
#[must_use]
pub fn render(unit_name: &str, perf: &PerformanceContents, streams: &StreamTable) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&"=".repeat(LINE_WIDTH));
    out.push('\n');

    let left = format!("Unit : {unit_name}");
    let right = "Time: 0.0";
    let pad = LINE_WIDTH.saturating_sub(left.len() + right.len());
    out.push_str(&format!("{left}{:pad$}{right}\n", ""));

    out.push_str(&"-".repeat(LINE_WIDTH));
    out.push('\n');
    performance_section(&mut out, perf);
    out.push('\n');
    out.push_str(&"-".repeat(LINE_WIDTH));
    out.push('\n');
    stream_section(&mut out, streams);
    out.push_str(&"=".repeat(LINE_WIDTH));
    out.push('\n');
    out
}
