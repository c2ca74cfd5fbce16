use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    // Quick prefilter so we only hand date-shaped strings to chrono.
    static ref DATE_LIKE_REGEX: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}([ T].*)?$").unwrap();
}

/// Tokens treated as a missing value when a file is parsed.
const NA_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Datetime formats accepted during type inference, tried in order.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A single cell of a table.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String form used for CSV export. Missing values export as an empty
    /// field; whole numbers drop the trailing `.0`.
    pub fn to_field(&self) -> String {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Missing => String::new(),
        }
    }

    // Key used to bucket equal values when computing a mode. Floats are
    // bucketed by bit pattern.
    fn mode_key(&self) -> String {
        match self {
            Value::Number(n) => format!("n{}", n.to_bits()),
            Value::Text(s) => format!("t{}", s),
            Value::Bool(b) => format!("b{}", b),
            Value::DateTime(dt) => format!("d{}", dt),
            Value::Missing => "_".to_string(),
        }
    }
}

/// Semantic type of a column, inferred from its raw cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Numeric,
    Text,
    Boolean,
    DateTime,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::DateTime => "datetime",
        }
    }
}

/// A named column. Every stored value is either `Missing` or of the
/// column's inferred type.
#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    /// Build a column from raw string cells, inferring the type from the
    /// non-missing cells.
    pub fn from_raw(name: String, raw: Vec<String>) -> Self {
        let ty = infer_type(&raw);
        let values = raw.into_iter().map(|cell| coerce(&cell, ty)).collect();
        Column { name, ty, values }
    }

    pub fn is_numeric(&self) -> bool {
        self.ty == ColumnType::Numeric
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    /// Non-missing numeric values, in row order. Empty for non-numeric
    /// columns.
    pub fn numbers(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| v.as_number()).collect()
    }

    /// Arithmetic mean over the non-missing values. `None` when the column
    /// has no non-missing numeric value.
    pub fn mean(&self) -> Option<f64> {
        let nums = self.numbers();
        if nums.is_empty() {
            None
        } else {
            Some(nums.iter().sum::<f64>() / nums.len() as f64)
        }
    }

    /// Median over the non-missing values.
    pub fn median(&self) -> Option<f64> {
        self.quantile(0.5)
    }

    /// Quantile with linear interpolation between order statistics.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        let mut nums = self.numbers();
        if nums.is_empty() {
            return None;
        }
        nums.sort_by(|a, b| a.total_cmp(b));
        let pos = q * (nums.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        if lo == hi {
            Some(nums[lo])
        } else {
            Some(nums[lo] + (nums[hi] - nums[lo]) * (pos - lo as f64))
        }
    }

    /// Sample standard deviation (n - 1). `None` for fewer than two values.
    pub fn std(&self) -> Option<f64> {
        let nums = self.numbers();
        if nums.len() < 2 {
            return None;
        }
        let mean = nums.iter().sum::<f64>() / nums.len() as f64;
        let var = nums.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (nums.len() - 1) as f64;
        Some(var.sqrt())
    }

    pub fn min(&self) -> Option<f64> {
        self.numbers().into_iter().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.numbers().into_iter().reduce(f64::max)
    }

    /// Most frequent non-missing value. Ties are broken by first occurrence
    /// in row order. `None` when every value is missing.
    pub fn mode(&self) -> Option<Value> {
        let mut counts: HashMap<String, (usize, usize, &Value)> = HashMap::new();
        for (idx, value) in self.values.iter().enumerate() {
            if value.is_missing() {
                continue;
            }
            let entry = counts
                .entry(value.mode_key())
                .or_insert((0, idx, value));
            entry.0 += 1;
        }
        counts
            .into_values()
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, _, v)| v.clone())
    }
}

/// An in-memory table of named, typed columns with equal-length rows.
#[derive(Clone, Debug, Default)]
pub struct Table {
    pub columns: Vec<Column>,
}

impl Table {
    /// Build a table from a header row and raw row-major string records.
    /// Duplicate header names are deduplicated with `.1`, `.2`, ... suffixes.
    pub fn from_records(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = dedupe_headers(headers);
        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(c, name)| {
                let raw = rows
                    .iter()
                    .map(|row| row.get(c).cloned().unwrap_or_default())
                    .collect();
                Column::from_raw(name, raw)
            })
            .collect();
        Table { columns }
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_numeric()).collect()
    }

    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing_count()).sum()
    }

    /// A new table containing only the rows with no missing value in any
    /// column.
    pub fn drop_missing_rows(&self) -> Table {
        let keep: Vec<usize> = (0..self.height())
            .filter(|&r| self.columns.iter().all(|c| !c.values[r].is_missing()))
            .collect();
        self.take_rows(&keep)
    }

    /// A new table containing only the numeric columns, with every row that
    /// has a missing value among them removed. Used by the diagnostics
    /// models, which need a dense matrix.
    pub fn numeric_subtable(&self) -> Table {
        let numeric: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| c.is_numeric())
            .cloned()
            .collect();
        Table { columns: numeric }.drop_missing_rows()
    }

    fn take_rows(&self, keep: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                ty: c.ty,
                values: keep.iter().map(|&r| c.values[r].clone()).collect(),
            })
            .collect();
        Table { columns }
    }
}

fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|name| {
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name.clone()
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

fn is_missing_token(cell: &str) -> bool {
    NA_TOKENS.contains(&cell.trim())
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_datetime(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    if !DATE_LIKE_REGEX.is_match(cell) {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Infer a column type from raw cells: every non-missing cell must parse as
/// the candidate type. Columns with no non-missing cell fall back to text.
fn infer_type(raw: &[String]) -> ColumnType {
    let cells: Vec<&String> = raw.iter().filter(|c| !is_missing_token(c)).collect();
    if cells.is_empty() {
        return ColumnType::Text;
    }
    if cells.iter().all(|c| c.trim().parse::<f64>().is_ok()) {
        return ColumnType::Numeric;
    }
    if cells.iter().all(|c| parse_bool(c).is_some()) {
        return ColumnType::Boolean;
    }
    if cells.iter().all(|c| parse_datetime(c).is_some()) {
        return ColumnType::DateTime;
    }
    ColumnType::Text
}

fn coerce(cell: &str, ty: ColumnType) -> Value {
    if is_missing_token(cell) {
        return Value::Missing;
    }
    match ty {
        ColumnType::Numeric => cell
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or(Value::Missing),
        ColumnType::Boolean => parse_bool(cell).map(Value::Bool).unwrap_or(Value::Missing),
        ColumnType::DateTime => parse_datetime(cell)
            .map(Value::DateTime)
            .unwrap_or(Value::Missing),
        ColumnType::Text => Value::Text(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn infers_numeric_with_missing_cells() {
        let col = Column::from_raw("a".into(), raw(&["1", "", "2.5"]));
        assert_eq!(col.ty, ColumnType::Numeric);
        assert_eq!(col.values[1], Value::Missing);
        assert_eq!(col.missing_count(), 1);
    }

    #[test]
    fn infers_boolean_and_datetime() {
        let flags = Column::from_raw("f".into(), raw(&["true", "False", "TRUE"]));
        assert_eq!(flags.ty, ColumnType::Boolean);

        let dates = Column::from_raw("d".into(), raw(&["2024-01-01", "2024-06-30 12:00:00"]));
        assert_eq!(dates.ty, ColumnType::DateTime);
    }

    #[test]
    fn mixed_cells_fall_back_to_text() {
        let col = Column::from_raw("c".into(), raw(&["1", "apple", "3"]));
        assert_eq!(col.ty, ColumnType::Text);
    }

    #[test]
    fn all_missing_column_is_text() {
        let col = Column::from_raw("c".into(), raw(&["", "NA", "null"]));
        assert_eq!(col.ty, ColumnType::Text);
        assert_eq!(col.missing_count(), 3);
    }

    #[test]
    fn mean_excludes_missing_values() {
        let col = Column::from_raw("a".into(), raw(&["1", "", "5"]));
        assert_eq!(col.mean(), Some(3.0));
    }

    #[test]
    fn median_interpolates_linearly() {
        let col = Column::from_raw("a".into(), raw(&["1", "3"]));
        assert_eq!(col.median(), Some(2.0));

        let odd = Column::from_raw("a".into(), raw(&["1", "2", "9"]));
        assert_eq!(odd.median(), Some(2.0));
        assert_eq!(odd.quantile(0.25), Some(1.5));
    }

    #[test]
    fn std_is_sample_std() {
        let col = Column::from_raw("a".into(), raw(&["1", "2", "3"]));
        assert!((col.std().unwrap() - 1.0).abs() < 1e-12);

        let single = Column::from_raw("a".into(), raw(&["7"]));
        assert_eq!(single.std(), None);
    }

    #[test]
    fn mode_breaks_ties_by_first_occurrence() {
        let col = Column::from_raw("c".into(), raw(&["b", "a", "b", "a", "x"]));
        assert_eq!(col.mode(), Some(Value::Text("b".into())));

        let all_missing = Column::from_raw("c".into(), raw(&["", ""]));
        assert_eq!(all_missing.mode(), None);
    }

    #[test]
    fn duplicate_headers_are_deduplicated() {
        let table = Table::from_records(
            raw(&["a", "a", "b", "a"]),
            vec![raw(&["1", "2", "3", "4"])],
        );
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a.1", "b", "a.2"]);
    }

    #[test]
    fn drop_missing_rows_keeps_only_complete_rows() {
        let table = Table::from_records(
            raw(&["a", "b"]),
            vec![raw(&["1", ""]), raw(&["", "4"]), raw(&["5", "6"])],
        );
        let dropped = table.drop_missing_rows();
        assert_eq!(dropped.height(), 1);
        assert_eq!(dropped.columns[0].values[0], Value::Number(5.0));
        assert_eq!(dropped.columns[1].values[0], Value::Number(6.0));
    }

    #[test]
    fn numeric_subtable_excludes_text_columns() {
        let table = Table::from_records(
            raw(&["a", "label", "b"]),
            vec![raw(&["1", "x", "2"]), raw(&["3", "y", ""])],
        );
        let sub = table.numeric_subtable();
        assert_eq!(sub.width(), 2);
        assert_eq!(sub.height(), 1);
    }

    #[test]
    fn empty_table_has_zero_height() {
        let table = Table::from_records(raw(&["a", "b"]), vec![]);
        assert!(table.is_empty());
        assert_eq!(table.width(), 2);
        assert!(table.drop_missing_rows().is_empty());
    }

    #[test]
    fn whole_numbers_export_without_decimal_point() {
        assert_eq!(Value::Number(5.0).to_field(), "5");
        assert_eq!(Value::Number(2.5).to_field(), "2.5");
        assert_eq!(Value::Missing.to_field(), "");
    }
}
