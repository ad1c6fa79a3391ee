//! Trained classifiers bound to their feature layout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, TrainerError};
use crate::forest::{ForestConfig, RandomForest};
use crate::logistic::{LogisticConfig, LogisticModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    RandomForest,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "LogisticRegression",
            ModelKind::RandomForest => "RandomForest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "logisticregression" | "logistic" => Ok(ModelKind::LogisticRegression),
            "randomforest" | "forest" => Ok(ModelKind::RandomForest),
            _ => Err(TrainerError::UnknownModel(s.to_string())),
        }
    }
}

/// Hyperparameters for every model kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub logistic: LogisticConfig,
    pub forest: ForestConfig,
}

/// Row scorer shared by the model kinds
pub trait Classifier: Send + Sync {
    /// Probability that the row is fraud
    fn predict_proba_row(&self, row: &[f64]) -> f64;
}

impl Classifier for LogisticModel {
    fn predict_proba_row(&self, row: &[f64]) -> f64 {
        self.predict_proba(row)
    }
}

impl Classifier for RandomForest {
    fn predict_proba_row(&self, row: &[f64]) -> f64 {
        self.predict_proba(row)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    Logistic(LogisticModel),
    Forest(RandomForest),
}

/// An immutable fitted model and the feature columns it was fitted on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    kind: ModelKind,
    feature_names: Vec<String>,
    model: FittedModel,
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn classifier(&self) -> &dyn Classifier {
        match &self.model {
            FittedModel::Logistic(m) => m as &dyn Classifier,
            FittedModel::Forest(m) => m,
        }
    }

    /// Reject matrices whose columns differ in name or order from training
    pub fn check_columns(&self, columns: &[String]) -> Result<()> {
        if columns != self.feature_names.as_slice() {
            return Err(TrainerError::FeatureMismatch {
                expected: self.feature_names.clone(),
                actual: columns.to_vec(),
            });
        }
        Ok(())
    }

    pub fn predict_proba(&self, columns: &[String], rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.check_columns(columns)?;
        let classifier = self.classifier();
        Ok(rows.iter().map(|r| classifier.predict_proba_row(r)).collect())
    }

    /// Forest importances paired with feature names, largest first
    pub fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        let FittedModel::Forest(forest) = &self.model else {
            return None;
        };
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(forest.feature_importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Some(ranked)
    }
}

/// Fit a fresh model of `kind`
pub fn train(
    kind: ModelKind,
    params: &ModelParams,
    columns: &[String],
    rows: &[Vec<f64>],
    labels: &[u8],
) -> Result<TrainedModel> {
    if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
        return Err(TrainerError::InvalidParameter(format!(
            "row has {} values for {} feature columns",
            row.len(),
            columns.len()
        )));
    }

    let model = match kind {
        ModelKind::LogisticRegression => {
            FittedModel::Logistic(LogisticModel::fit(&params.logistic, rows, labels)?)
        }
        ModelKind::RandomForest => FittedModel::Forest(RandomForest::fit(&params.forest, rows, labels)?),
    };

    Ok(TrainedModel {
        kind,
        feature_names: columns.to_vec(),
        model,
    })
}
