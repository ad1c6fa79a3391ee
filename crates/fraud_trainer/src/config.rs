//! Pipeline configuration
//!
//! Every section has defaults, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! [paths]
//! transactions = "data/raw/Fraud_Data.csv"
//!
//! [modeling]
//! cv_folds = 3
//!
//! [modeling.forest]
//! n_trees = 50
//! ```

use fraudscope_core::ColumnConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::errors::{Result, TrainerError};
use crate::forest::ForestConfig;
use crate::imbalance::Smote;
use crate::logistic::LogisticConfig;
use crate::model::{ModelKind, ModelParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub transactions: PathBuf,
    pub ip_ranges: PathBuf,
    pub output: PathBuf,
    /// JSON run report; not written when unset
    pub report: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            transactions: PathBuf::from("data/raw/Fraud_Data.csv"),
            ip_ranges: PathBuf::from("data/raw/IpAddress_to_Country.csv"),
            output: PathBuf::from("data/processed/fraud_processed.csv"),
            report: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImbalanceConfig {
    pub enabled: bool,
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for ImbalanceConfig {
    fn default() -> Self {
        let smote = Smote::default();
        Self {
            enabled: true,
            k_neighbors: smote.k_neighbors,
            seed: smote.seed,
        }
    }
}

impl ImbalanceConfig {
    pub fn smote(&self) -> Smote {
        Smote::new(self.k_neighbors, self.seed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelingConfig {
    pub enabled: bool,
    pub test_fraction: f64,
    pub seed: u64,
    pub cv_folds: usize,
    pub threshold: f64,
    pub models: Vec<ModelKind>,
    /// Number of forest importances to log
    pub top_features: usize,
    pub logistic: LogisticConfig,
    pub forest: ForestConfig,
}

impl Default for ModelingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            test_fraction: 0.2,
            seed: 42,
            cv_folds: 5,
            threshold: 0.5,
            models: vec![ModelKind::LogisticRegression, ModelKind::RandomForest],
            top_features: 10,
            logistic: LogisticConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl ModelingConfig {
    pub fn params(&self) -> ModelParams {
        ModelParams {
            logistic: self.logistic.clone(),
            forest: self.forest.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub columns: ColumnConfig,
    pub imbalance: ImbalanceConfig,
    pub modeling: ModelingConfig,
}

impl PipelineConfig {
    /// Load and validate a TOML file
    #[instrument]
    pub fn load_from_file<P: AsRef<Path> + std::fmt::Debug>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let modeling = &self.modeling;

        if !(modeling.test_fraction > 0.0 && modeling.test_fraction < 1.0) {
            errors.push(format!("modeling.test_fraction must be in (0, 1), got {}", modeling.test_fraction));
        }
        if modeling.cv_folds < 2 {
            errors.push(format!("modeling.cv_folds must be at least 2, got {}", modeling.cv_folds));
        }
        if !(0.0..=1.0).contains(&modeling.threshold) {
            errors.push(format!("modeling.threshold must be in [0, 1], got {}", modeling.threshold));
        }
        if modeling.forest.n_trees == 0 {
            errors.push("modeling.forest.n_trees must be at least 1".to_string());
        }
        if !(modeling.logistic.c > 0.0) {
            errors.push("modeling.logistic.c must be positive".to_string());
        }
        if self.imbalance.k_neighbors == 0 {
            errors.push("imbalance.k_neighbors must be at least 1".to_string());
        }
        if self.columns.label.is_empty() {
            errors.push("columns.label must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TrainerError::InvalidParameter(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::MaxFeatures;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.modeling.forest.n_trees, 100);
        assert_eq!(config.modeling.logistic.max_iter, 1000);
        assert_eq!(config.imbalance.k_neighbors, 5);
        assert_eq!(config.paths.output, PathBuf::from("data/processed/fraud_processed.csv"));
    }

    #[test]
    fn test_partial_file_overrides() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"
[modeling]
cv_folds = 3
models = ["random_forest"]

[modeling.forest]
n_trees = 20
max_features = "log2"

[columns]
label = "is_fraud"
"#
        )?;
        file.flush()?;

        let config = PipelineConfig::load_from_file(file.path())?;
        assert_eq!(config.modeling.cv_folds, 3);
        assert_eq!(config.modeling.models, vec![ModelKind::RandomForest]);
        assert_eq!(config.modeling.forest.n_trees, 20);
        assert_eq!(config.modeling.forest.max_depth, 15);
        assert_eq!(config.modeling.forest.max_features, MaxFeatures::Log2);
        assert_eq!(config.columns.label, "is_fraud");
        assert_eq!(config.columns.user_id, "user_id");
        assert!(config.imbalance.enabled);
        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PipelineConfig::default();
        config.modeling.test_fraction = 1.5;
        config.modeling.cv_folds = 1;
        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("test_fraction"));
        assert!(message.contains("cv_folds"));
    }

    #[test]
    fn test_nan_regularization_rejected() {
        let mut config = PipelineConfig::default();
        config.modeling.logistic.c = f64::NAN;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logistic.c"));
    }

    #[test]
    fn test_malformed_file_is_config_error() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "[modeling\ncv_folds = 3")?;
        file.flush()?;
        let err = PipelineConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, TrainerError::Config(_)));
        Ok(())
    }
}
