//! Fraudscope trainer: rebalancing, models and evaluation
//!
//! Takes the engineered table from `fraudscope-core`, splits it per class,
//! oversamples the training rows, and fits a logistic baseline and a random
//! forest. Every stochastic step is seeded, so reruns with the same
//! configuration give the same models and scores.

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod forest;
pub mod imbalance;
pub mod logistic;
pub mod metrics;
pub mod model;
pub mod modeler;
pub mod pipeline;

pub use config::{ImbalanceConfig, ModelingConfig, PathsConfig, PipelineConfig};
pub use dataset::{split, stratified_folds, stratified_split_indices, Partition, TrainTestSplit};
pub use errors::{Result, TrainerError};
pub use forest::{ForestConfig, MaxFeatures, RandomForest};
pub use imbalance::Smote;
pub use logistic::{LogisticConfig, LogisticModel};
pub use model::{train, Classifier, ModelKind, ModelParams, TrainedModel};
pub use modeler::{cross_validate, evaluate, CrossValidation, EvaluationReport, Modeler, Stage};
pub use pipeline::{run, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
