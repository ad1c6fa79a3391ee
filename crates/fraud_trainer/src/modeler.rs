//! Train, evaluate and cross-validate models on a train/test split
//!
//! `Modeler` walks `Split -> Resampled -> Trained -> Evaluated`. Resampling is
//! only allowed before any model is trained, and evaluation only for models
//! that exist, so a run cannot score a model on oversampled test rows or
//! report a model it never fit.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

use crate::dataset::{stratified_folds, Partition, TrainTestSplit};
use crate::errors::{Result, TrainerError};
use crate::imbalance::Smote;
use crate::metrics::{self, ClassMetrics};
use crate::model::{self, ModelKind, ModelParams, TrainedModel};

/// Default decision threshold for thresholded metrics
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Test-set scores for one model
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub model: String,
    pub threshold: f64,
    pub pr_auc: f64,
    pub roc_auc: f64,
    pub accuracy: f64,
    pub classes: Vec<ClassMetrics>,
    pub test_rows: usize,
}

impl EvaluationReport {
    pub fn fraud(&self) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == 1)
    }
}

/// Positive-class F1 per fold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidation {
    pub model: String,
    pub scores: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation of `scores`
    pub std: f64,
}

impl CrossValidation {
    fn from_scores(kind: ModelKind, scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
        Self {
            model: kind.name().to_string(),
            scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Score `model` on a held-out partition
pub fn evaluate(
    model: &TrainedModel,
    columns: &[String],
    test: &Partition,
    threshold: f64,
) -> Result<EvaluationReport> {
    let scores = model.predict_proba(columns, &test.rows)?;
    let predictions = metrics::threshold_predictions(&scores, threshold);

    Ok(EvaluationReport {
        model: model.kind().name().to_string(),
        threshold,
        pr_auc: metrics::pr_auc(&test.labels, &scores)?,
        roc_auc: metrics::roc_auc(&test.labels, &scores)?,
        accuracy: metrics::accuracy(&test.labels, &predictions),
        classes: vec![
            metrics::class_metrics(&test.labels, &predictions, 0),
            metrics::class_metrics(&test.labels, &predictions, 1),
        ],
        test_rows: test.len(),
    })
}

/// Cross-validate over precomputed folds of `data`
///
/// Folds are evaluated in parallel. Each fold trains on the remaining rows in
/// ascending index order, so reordering `folds` permutes the scores without
/// changing any of them.
pub fn cross_validate_folds(
    kind: ModelKind,
    params: &ModelParams,
    columns: &[String],
    data: &Partition,
    folds: &[Vec<usize>],
) -> Result<CrossValidation> {
    let scores = folds
        .par_iter()
        .enumerate()
        .map(|(held_out, fold)| {
            let mut train_idx: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != held_out)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            train_idx.sort_unstable();
            let train = Partition::select(&data.rows, &data.labels, &train_idx);
            let valid = Partition::select(&data.rows, &data.labels, fold);

            let model = model::train(kind, params, columns, &train.rows, &train.labels)?;
            let scores = model.predict_proba(columns, &valid.rows)?;
            let predictions = metrics::threshold_predictions(&scores, DEFAULT_THRESHOLD);
            Ok(metrics::f1_score(&valid.labels, &predictions))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(CrossValidation::from_scores(kind, scores))
}

/// Stratified, shuffled k-fold cross-validation of positive-class F1
#[instrument(skip(params, columns, data), fields(model = %kind, rows = data.len()))]
pub fn cross_validate(
    kind: ModelKind,
    params: &ModelParams,
    columns: &[String],
    data: &Partition,
    k: usize,
    seed: u64,
) -> Result<CrossValidation> {
    let folds = stratified_folds(&data.labels, k, seed)?;
    cross_validate_folds(kind, params, columns, data, &folds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Split,
    Resampled,
    Trained,
    Evaluated,
}

/// One modeling run over a fixed split
pub struct Modeler {
    split: TrainTestSplit,
    params: ModelParams,
    threshold: f64,
    stage: Stage,
    models: BTreeMap<ModelKind, TrainedModel>,
}

impl Modeler {
    pub fn new(split: TrainTestSplit, params: ModelParams) -> Self {
        let stage = if split.is_resampled() {
            Stage::Resampled
        } else {
            Stage::Split
        };
        Self {
            split,
            params,
            threshold: DEFAULT_THRESHOLD,
            stage,
            models: BTreeMap::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn split(&self) -> &TrainTestSplit {
        &self.split
    }

    pub fn model(&self, kind: ModelKind) -> Option<&TrainedModel> {
        self.models.get(&kind)
    }

    /// Oversample the training partition; only valid straight after the split
    pub fn resample(mut self, smote: &Smote) -> Result<Self> {
        if self.stage != Stage::Split {
            return Err(TrainerError::InvalidStage(format!(
                "cannot resample at stage {:?}",
                self.stage
            )));
        }
        self.split = self.split.resample_train(smote)?;
        self.stage = Stage::Resampled;
        Ok(self)
    }

    #[instrument(skip(self), fields(model = %kind))]
    pub fn train(&mut self, kind: ModelKind) -> Result<&TrainedModel> {
        let train = &self.split.train;
        let model = model::train(kind, &self.params, &self.split.columns, &train.rows, &train.labels)?;
        info!("Trained {} on {} rows", kind, train.len());

        self.models.insert(kind, model);
        self.stage = Stage::Trained;
        Ok(&self.models[&kind])
    }

    pub fn evaluate(&mut self, kind: ModelKind) -> Result<EvaluationReport> {
        let model = self
            .models
            .get(&kind)
            .ok_or_else(|| TrainerError::UnknownModel(kind.name().to_string()))?;
        let report = evaluate(model, &self.split.columns, &self.split.test, self.threshold)?;
        self.stage = Stage::Evaluated;
        Ok(report)
    }

    /// Cross-validate on the (possibly resampled) training partition
    pub fn cross_validate(&self, kind: ModelKind, k: usize, seed: u64) -> Result<CrossValidation> {
        cross_validate(kind, &self.params, &self.split.columns, &self.split.train, k, seed)
    }
}
