//! The persisted model bundle: model, feature schema and categorical list.
//!
//! The three files are written and read together; a bundle whose parts
//! disagree is rejected at load time.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array2;

use crate::data_handling::{Record, Table};
use crate::explain::{explain_row, Attribution};
use crate::models::classifier_trait::sigmoid;
use crate::models::{ClassifierModel, XGBoostClassifier};
use crate::schema::FeatureSchema;

pub const MODEL_FILE: &str = "model.json";
pub const COLUMNS_FILE: &str = "columns.json";
pub const CATEGORICAL_FILE: &str = "categorical.json";

/// Outcome of scoring one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Hard class at the default threshold.
    pub label: i32,
    /// Positive-class probability.
    pub probability: f64,
    pub margin: f64,
}

#[derive(Debug)]
pub struct ModelBundle {
    pub model: XGBoostClassifier,
    pub schema: FeatureSchema,
}

impl ModelBundle {
    pub fn new(model: XGBoostClassifier, schema: FeatureSchema) -> Result<Self> {
        schema.validate()?;
        model.check_features(schema.len()).context("Model and feature schema disagree")?;
        Ok(Self { model, schema })
    }

    pub fn paths<P: AsRef<Path>>(dir: P) -> [PathBuf; 3] {
        let dir = dir.as_ref();
        [dir.join(MODEL_FILE), dir.join(COLUMNS_FILE), dir.join(CATEGORICAL_FILE)]
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create model directory: {}", dir.display()))?;
        let [model_path, columns_path, categorical_path] = Self::paths(dir);
        fs::write(&model_path, self.model.to_json()?)
            .with_context(|| format!("Failed to write {}", model_path.display()))?;
        fs::write(&columns_path, serde_json::to_vec_pretty(&self.schema)?)
            .with_context(|| format!("Failed to write {}", columns_path.display()))?;
        fs::write(
            &categorical_path,
            serde_json::to_vec_pretty(&self.schema.categorical_names())?,
        )
        .with_context(|| format!("Failed to write {}", categorical_path.display()))?;
        log::info!("model bundle saved to {}", dir.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let [model_path, columns_path, categorical_path] = Self::paths(dir);
        let read = |path: &Path| {
            fs::read(path).with_context(|| format!("Missing or unreadable model artifact: {}", path.display()))
        };
        let model = XGBoostClassifier::from_json(&read(&model_path)?)
            .with_context(|| format!("Failed to parse {}", model_path.display()))?;
        let schema: FeatureSchema = serde_json::from_slice(&read(&columns_path)?)
            .with_context(|| format!("Failed to parse {}", columns_path.display()))?;
        let categorical: Vec<String> = serde_json::from_slice(&read(&categorical_path)?)
            .with_context(|| format!("Failed to parse {}", categorical_path.display()))?;

        if categorical != schema.categorical_names() {
            anyhow::bail!(
                "Categorical list {:?} does not match the feature schema {:?}",
                categorical,
                schema.categorical_names()
            );
        }
        Self::new(model, schema)
    }

    pub fn encode(&self, table: &Table) -> Result<Array2<f32>> {
        self.schema.encode_table(table)
    }

    /// Reindex, encode and score one already-prepared record.
    pub fn predict_record(&self, record: &Record) -> Result<Prediction> {
        let row = self.schema.encode_record(record);
        let x = Array2::from_shape_vec((1, row.len()), row)?;
        let margin = self
            .model
            .decision_function(&x)?
            .first()
            .copied()
            .context("Model returned no margin for the record")?;
        Ok(Prediction {
            label: i32::from(margin > 0.0),
            probability: sigmoid(margin),
            margin,
        })
    }

    pub fn explain_record(&self, record: &Record) -> Result<Attribution> {
        let row = self.schema.encode_record(record);
        explain_row(&self.model, &self.schema, &row)
    }
}
