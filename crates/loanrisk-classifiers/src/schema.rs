//! Ordered feature schema learned at training time.
//!
//! The schema is the contract between a trained model and its callers: the
//! exact column names, their order, how each is encoded and which value
//! stands in for a column the caller did not supply.
use std::collections::BTreeSet;

use anyhow::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Column, Record, Table, Value};

/// Largest level count whose codes all encode exactly as `f32`.
pub const MAX_CATEGORICAL_LEVELS: usize = 1 << 24;

/// Encoding of a schema column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    /// Values are replaced by their index in `levels`; unknown levels are missing.
    Categorical { levels: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub kind: FeatureKind,
    /// Fill value for a column absent from an inference input.
    pub default: f64,
}

impl SchemaColumn {
    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical { .. })
    }

    fn encode_number(&self, value: Option<f64>) -> f32 {
        match (&self.kind, value) {
            (_, None) => f32::NAN,
            (FeatureKind::Numeric, Some(v)) => v as f32,
            (FeatureKind::Categorical { .. }, Some(v)) => self.encode_text(Some(&v.to_string())),
        }
    }

    fn encode_text(&self, value: Option<&str>) -> f32 {
        let Some(text) = value else {
            return f32::NAN;
        };
        match &self.kind {
            FeatureKind::Numeric => text.trim().parse::<f64>().map(|v| v as f32).unwrap_or(f32::NAN),
            FeatureKind::Categorical { levels } => levels
                .iter()
                .position(|l| l == text)
                .map(|i| i as f32)
                .unwrap_or(f32::NAN),
        }
    }

    /// Encode one cell. Shared by the table and record paths.
    pub fn encode(&self, value: &Value) -> f32 {
        match value {
            Value::Number(v) if !v.is_nan() => self.encode_number(Some(*v)),
            Value::Number(_) | Value::Missing => f32::NAN,
            Value::Text(s) => self.encode_text(Some(s)),
        }
    }
}

/// Ordered `(name, kind, default)` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<SchemaColumn>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    /// Learn the schema from a feature table: textual columns become
    /// categorical with their sorted distinct levels, everything else numeric.
    pub fn infer(table: &Table) -> Result<Self> {
        let columns = table
            .columns()
            .map(|(name, column)| {
                let kind = match column {
                    Column::Numeric(_) => FeatureKind::Numeric,
                    Column::Text(cells) => {
                        let levels: BTreeSet<&str> = cells.iter().flatten().map(String::as_str).collect();
                        FeatureKind::Categorical {
                            levels: levels.into_iter().map(str::to_string).collect(),
                        }
                    }
                };
                SchemaColumn {
                    name: name.to_string(),
                    kind,
                    default: 0.0,
                }
            })
            .collect();
        let schema = Self { columns };
        schema.validate()?;
        Ok(schema)
    }

    /// Reject duplicate names and categorical columns too wide to encode exactly.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                anyhow::bail!("Duplicate schema column '{}'", column.name);
            }
            if let FeatureKind::Categorical { levels } = &column.kind {
                if levels.len() > MAX_CATEGORICAL_LEVELS {
                    anyhow::bail!(
                        "Categorical column '{}' has {} levels; at most {} are supported",
                        column.name,
                        levels.len(),
                        MAX_CATEGORICAL_LEVELS
                    );
                }
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn categorical_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_categorical())
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn categorical_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_categorical())
            .map(|(i, _)| i)
            .collect()
    }

    /// Schema columns the record lacks.
    pub fn missing_from(&self, record: &Record) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| record.get(&c.name).is_none())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Reorder a record to the schema, dropping extra fields and filling
    /// absent ones with the column default.
    pub fn reindex(&self, record: &Record) -> Record {
        let missing = self.missing_from(record);
        if !missing.is_empty() {
            log::warn!("filling absent columns with defaults: {}", missing.join(", "));
        }
        let mut out = Record::new();
        for column in &self.columns {
            let value = record
                .get(&column.name)
                .cloned()
                .unwrap_or(Value::Number(column.default));
            out.insert(&column.name, value);
        }
        out
    }

    /// Encode one record into the model's feature vector.
    pub fn encode_record(&self, record: &Record) -> Vec<f32> {
        let record = self.reindex(record);
        self.columns
            .iter()
            .map(|column| column.encode(record.get(&column.name).unwrap_or(&Value::Missing)))
            .collect()
    }

    /// Encode a table into a `rows x schema` matrix, filling absent columns.
    pub fn encode_table(&self, table: &Table) -> Result<Array2<f32>> {
        let n_rows = table.n_rows();
        let n_cols = self.columns.len();
        let mut matrix = Array2::<f32>::zeros((n_rows, n_cols));
        for (j, schema_column) in self.columns.iter().enumerate() {
            match table.column(&schema_column.name) {
                Some(Column::Numeric(cells)) => {
                    for (i, cell) in cells.iter().enumerate() {
                        matrix[[i, j]] = schema_column.encode_number(cell.filter(|v| !v.is_nan()));
                    }
                }
                Some(Column::Text(cells)) => {
                    for (i, cell) in cells.iter().enumerate() {
                        matrix[[i, j]] = schema_column.encode_text(cell.as_deref());
                    }
                }
                None => {
                    log::warn!("column '{}' absent; filling with default", schema_column.name);
                    let fill = schema_column.encode(&Value::Number(schema_column.default));
                    matrix.column_mut(j).fill(fill);
                }
            }
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            SchemaColumn {
                name: "amount".into(),
                kind: FeatureKind::Numeric,
                default: 0.0,
            },
            SchemaColumn {
                name: "grade".into(),
                kind: FeatureKind::Categorical {
                    levels: vec!["A".into(), "B".into()],
                },
                default: 0.0,
            },
        ])
    }

    #[test]
    fn unknown_level_encodes_as_missing() {
        let encoded = schema().encode_record(&Record::new().with("grade", "Z").with("amount", 3.0));
        assert_eq!(encoded[0], 3.0);
        assert!(encoded[1].is_nan());
    }

    #[test]
    fn every_level_of_a_wide_column_gets_its_own_code() {
        let cells: Vec<Option<String>> = (0..70_000).map(|i| Some(format!("id{:05}", i))).collect();
        let table = Table::from_columns(vec![("id".to_string(), Column::Text(cells))]).unwrap();
        let s = FeatureSchema::infer(&table).unwrap();
        let matrix = s.encode_table(&table).unwrap();
        let codes = matrix.column(0);
        assert!(codes.iter().all(|c| !c.is_nan()));
        assert_eq!(codes[65_535], 65_535.0);
        assert_eq!(codes[69_999], 69_999.0);
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let mut columns = schema().columns().to_vec();
        columns.push(columns[0].clone());
        assert!(FeatureSchema::new(columns).validate().is_err());
    }

    #[test]
    fn table_and_record_paths_agree() {
        let s = schema();
        let record = Record::new().with("grade", "B").with("amount", 12.5);
        let table = Table::from_record(&record).unwrap();
        let matrix = s.encode_table(&table).unwrap();
        assert_eq!(matrix.row(0).to_vec(), s.encode_record(&record));
    }
}
