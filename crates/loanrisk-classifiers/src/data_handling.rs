use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// A single cell of a table or record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) if !v.is_nan() => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Number(v) => v.is_nan(),
            Value::Text(_) => false,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Value::Missing
        } else {
            Value::Number(v)
        }
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map(Value::from).unwrap_or(Value::Missing)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Missing => write!(f, "NA"),
        }
    }
}

/// One applicant: an ordered list of named values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, keeping the position of an existing one.
    pub fn insert<V: Into<Value>>(&mut self, name: &str, value: V) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn with<V: Into<Value>>(mut self, name: &str, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_number)
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a flat JSON object (numbers, strings and nulls).
    pub fn from_json_object(map: &BTreeMap<String, serde_json::Value>) -> Result<Self> {
        let mut record = Record::new();
        for (name, value) in map {
            let value = match value {
                serde_json::Value::Null => Value::Missing,
                serde_json::Value::Number(n) => n
                    .as_f64()
                    .map(Value::Number)
                    .with_context(|| format!("Field '{}' is not representable as f64", name))?,
                serde_json::Value::String(s) => Value::Text(s.clone()),
                serde_json::Value::Bool(b) => Value::Number(if *b { 1.0 } else { 0.0 }),
                other => anyhow::bail!("Field '{}' has unsupported value {}", name, other),
            };
            record.insert(name, value);
        }
        Ok(record)
    }
}

/// A typed column. Missing cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Column::Text(_))
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Numeric(v) => v[row].map_or(true, f64::is_nan),
            Column::Text(v) => v[row].is_none(),
        }
    }

    pub fn value(&self, row: usize) -> Value {
        match self {
            Column::Numeric(v) => Value::from(v[row]),
            Column::Text(v) => v[row]
                .as_ref()
                .map(|s| Value::Text(s.clone()))
                .unwrap_or(Value::Missing),
        }
    }

    pub fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    /// Infer the column type from raw cells: numeric iff every present cell parses.
    pub fn infer(cells: Vec<Option<String>>) -> Column {
        let all_numeric = cells
            .iter()
            .flatten()
            .all(|s| s.trim().parse::<f64>().is_ok());
        if all_numeric {
            Column::Numeric(
                cells
                    .iter()
                    .map(|c| c.as_ref().and_then(|s| s.trim().parse::<f64>().ok()))
                    .collect(),
            )
        } else {
            Column::Text(cells)
        }
    }
}

/// Column-oriented in-memory table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<(String, Column)>) -> Result<Self> {
        let mut table = Table::new();
        for (name, column) in columns {
            table.push_column(&name, column)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Append a column, or replace an existing one with the same name.
    pub fn push_column(&mut self, name: &str, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.n_rows {
            anyhow::bail!(
                "Column '{}' has {} rows but the table has {}",
                name,
                column.len(),
                self.n_rows
            );
        }
        if self.columns.is_empty() {
            self.n_rows = column.len();
        }
        match self.names.iter().position(|n| n == name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let i = self.names.iter().position(|n| n == name)?;
        self.names.remove(i);
        let column = self.columns.remove(i);
        if self.columns.is_empty() {
            self.n_rows = 0;
        }
        Some(column)
    }

    /// Names from `wanted` that the table lacks.
    pub fn missing_columns<'a>(&self, wanted: &[&'a str]) -> Vec<&'a str> {
        wanted
            .iter()
            .copied()
            .filter(|w| !self.has_column(w))
            .collect()
    }

    /// Project onto `names`, in that order.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let missing = self.missing_columns(names);
        if !missing.is_empty() {
            anyhow::bail!("Missing required columns: {}", missing.join(", "));
        }
        let mut table = Table::new();
        for name in names {
            if let Some(column) = self.column(name) {
                table.push_column(name, column.clone())?;
            }
        }
        Ok(table)
    }

    /// Keep the rows at `rows`, in that order. Indices may repeat.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            n_rows: rows.len(),
        }
    }

    pub fn filter_rows<F: Fn(usize) -> bool>(&self, keep: F) -> Table {
        let rows: Vec<usize> = (0..self.n_rows).filter(|&i| keep(i)).collect();
        self.take_rows(&rows)
    }

    /// Drop every row with at least one missing cell.
    pub fn drop_missing(&self) -> Table {
        self.filter_rows(|row| self.columns.iter().all(|c| !c.is_missing(row)))
    }

    pub fn row(&self, row: usize) -> Record {
        let mut record = Record::new();
        for (name, column) in self.columns() {
            record.insert(name, column.value(row));
        }
        record
    }

    /// Build a one-row table from a record.
    pub fn from_record(record: &Record) -> Result<Table> {
        let mut table = Table::new();
        for (name, value) in record.iter() {
            let column = match value {
                Value::Number(v) => Column::Numeric(vec![Some(*v).filter(|v| !v.is_nan())]),
                Value::Text(s) => Column::Text(vec![Some(s.clone())]),
                Value::Missing => Column::Numeric(vec![None]),
            };
            table.push_column(name, column)?;
        }
        Ok(table)
    }
}

/// Stratified train/test split over row indices.
///
/// Each class is shuffled with the same seeded RNG and `test_size` of it
/// (rounded) is held out, so both partitions keep the class balance.
///
/// # Returns
/// `(train_indices, test_indices)`, each sorted ascending.
pub fn stratified_split(labels: &[i32], test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        anyhow::bail!("test_size must lie in (0, 1), got {}", test_size);
    }
    let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::with_capacity((labels.len() as f64 * test_size) as usize + by_class.len());
    for (label, mut indices) in by_class {
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64) * test_size).round() as usize;
        let n_test = n_test.min(indices.len().saturating_sub(1));
        log::trace!("class {}: {} rows, {} held out", label, indices.len(), n_test);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
