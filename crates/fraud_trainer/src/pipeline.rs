//! End-to-end batch run: raw CSVs to processed table, models and report
//!
//! The processed table is encoded and scaled with statistics from every
//! engineered row. The modeling branch instead splits the engineered rows
//! first, fits the transformer on the training rows only, and applies it
//! unchanged to the test rows.

use fraudscope_core::config::as_strs;
use fraudscope_core::io::{read_csv, stage_csv};
use fraudscope_core::matrix::labels_from_table;
use fraudscope_core::prepare::{engineer, fit_transform, transform};
use fraudscope_core::{class_distribution, ClassDistribution, FeatureMatrix, IpRangeTable, Table};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

use crate::config::PipelineConfig;
use crate::dataset::{stratified_split_indices, TrainTestSplit};
use crate::errors::Result;
use crate::modeler::{CrossValidation, EvaluationReport, Modeler};

/// Train/test sizes and class counts
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: usize,
    /// (legitimate, fraud) before resampling
    pub train_classes: (usize, usize),
    /// (legitimate, fraud) as the models saw them
    pub train_classes_fitted: (usize, usize),
    pub test_classes: (usize, usize),
}

/// Everything a run produced, serialized as the JSON report
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub version: String,
    pub generated_at: String,
    pub output: PathBuf,
    /// BLAKE3 of the processed CSV bytes
    pub output_blake3: String,
    pub processed_rows: usize,
    pub processed_columns: usize,
    pub class_distribution: ClassDistribution,
    pub split: Option<SplitSummary>,
    pub evaluations: Vec<EvaluationReport>,
    pub cross_validation: Vec<CrossValidation>,
    pub feature_importances: Vec<(String, f64)>,
}

/// Results of the modeling branch
#[derive(Debug, Clone, Default)]
struct ModelingOutcome {
    split: Option<SplitSummary>,
    evaluations: Vec<EvaluationReport>,
    cross_validation: Vec<CrossValidation>,
    feature_importances: Vec<(String, f64)>,
}

/// Read both inputs and build the engineered (not yet encoded) table
#[instrument(skip(config))]
pub fn load_engineered(config: &PipelineConfig) -> Result<Table> {
    info!("Loading IP ranges from: {}", config.paths.ip_ranges.display());
    let ranges = IpRangeTable::from_table(&read_csv(&config.paths.ip_ranges)?)?;
    info!("Loaded {} IP ranges", ranges.len());

    info!("Loading transactions from: {}", config.paths.transactions.display());
    let transactions = read_csv(&config.paths.transactions)?;
    info!("Loaded {} transactions", transactions.len());

    Ok(engineer(transactions, Some(&ranges), &config.columns)?)
}

/// Split engineered rows, transform each side, and return model-ready partitions
pub fn prepare_split(engineered: &Table, config: &PipelineConfig) -> Result<TrainTestSplit> {
    let columns = &config.columns;
    let modeling = &config.modeling;

    let labels = labels_from_table(engineered, &columns.label)?;
    let (train_idx, test_idx) = stratified_split_indices(&labels, modeling.test_fraction, modeling.seed)?;

    let (train_table, mut transformer) = fit_transform(engineered.select_rows(&train_idx), columns)?;
    let test_table = transform(engineered.select_rows(&test_idx), &mut transformer, columns)?;
    if let (Some(scaler), Some(encoder)) = (transformer.scaler(), transformer.encoder()) {
        debug!(
            "Transformer fitted on training rows: {} scaled columns, {} indicator columns",
            scaler.columns.len(),
            encoder.output_columns().len()
        );
    }

    let excluded = as_strs(&columns.identifiers);
    let train = FeatureMatrix::from_table(&train_table, &columns.label, &excluded)?;
    let test = FeatureMatrix::from_table(&test_table, &columns.label, &excluded)?;

    info!(
        "Split {} rows: train={} test={} ({} features)",
        labels.len(),
        train.len(),
        test.len(),
        train.feature_count()
    );
    TrainTestSplit::from_partitions(train, test)
}

fn run_modeling(engineered: &Table, config: &PipelineConfig) -> Result<ModelingOutcome> {
    let modeling = &config.modeling;
    let split = prepare_split(engineered, config)?;
    let train_classes = split.train.class_counts();

    let mut modeler = Modeler::new(split, modeling.params()).with_threshold(modeling.threshold);
    if config.imbalance.enabled {
        modeler = modeler.resample(&config.imbalance.smote())?;
    }

    let fitted = modeler.split();
    let summary = SplitSummary {
        train_rows: fitted.train.len(),
        test_rows: fitted.test.len(),
        features: fitted.columns.len(),
        train_classes,
        train_classes_fitted: fitted.train.class_counts(),
        test_classes: fitted.test.class_counts(),
    };

    let mut outcome = ModelingOutcome {
        split: Some(summary),
        ..ModelingOutcome::default()
    };

    for &kind in &modeling.models {
        info!("═══════════════════════════════════════════");
        info!("Model: {}", kind);
        let model = modeler.train(kind)?;
        if let Some(ranked) = model.feature_importances() {
            info!("Top features:");
            for (name, importance) in ranked.iter().take(modeling.top_features) {
                info!("  {}: {:.4}", name, importance);
            }
            outcome.feature_importances = ranked;
        }

        let report = modeler.evaluate(kind)?;
        info!("  PR-AUC: {:.4}", report.pr_auc);
        info!("  ROC-AUC: {:.4}", report.roc_auc);
        info!("  Accuracy: {:.4}", report.accuracy);
        for class in &report.classes {
            info!(
                "  class {}: precision={:.4} recall={:.4} f1={:.4} support={}",
                class.label, class.precision, class.recall, class.f1, class.support
            );
        }
        outcome.evaluations.push(report);

        let cv = modeler.cross_validate(kind, modeling.cv_folds, modeling.seed)?;
        info!(
            "  CV F1 ({} folds): {:.4} ± {:.4}",
            cv.scores.len(),
            cv.mean,
            cv.std
        );
        outcome.cross_validation.push(cv);
    }

    Ok(outcome)
}

/// Run the whole pipeline and write the processed table (and report, if configured)
///
/// Output files are written only once every stage has succeeded; a failed run
/// leaves any earlier output untouched.
#[instrument(skip(config))]
pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    config.validate()?;

    let engineered = load_engineered(config)?;

    let distribution = class_distribution(&engineered, &config.columns.label)?;
    info!("Class distribution ({} rows):", distribution.total);
    for (label, count) in &distribution.counts {
        info!("  {}: {} ({:.2}%)", label, count, distribution.percentage(label));
    }

    let (processed, _) = fit_transform(engineered.clone(), &config.columns)?;
    let staged = stage_csv(&processed, &config.paths.output)?;

    let outcome = if config.modeling.enabled {
        run_modeling(&engineered, config)?
    } else {
        info!("Modeling disabled; stopping after the processed table");
        ModelingOutcome::default()
    };

    let report = RunReport {
        version: crate::VERSION.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        output: config.paths.output.clone(),
        output_blake3: staged.digest().to_string(),
        processed_rows: processed.len(),
        processed_columns: processed.columns().len(),
        class_distribution: distribution,
        split: outcome.split,
        evaluations: outcome.evaluations,
        cross_validation: outcome.cross_validation,
        feature_importances: outcome.feature_importances,
    };
    let report_json = match &config.paths.report {
        Some(_) => Some(serde_json::to_string_pretty(&report)?),
        None => None,
    };

    // every stage has succeeded; only now touch the destination files
    let digest = staged.commit()?;
    info!(
        "Wrote processed table to {} ({} rows x {} columns, blake3 {})",
        config.paths.output.display(),
        processed.len(),
        processed.columns().len(),
        digest
    );

    if let (Some(path), Some(json)) = (&config.paths.report, report_json) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        info!("Wrote run report to {}", path.display());
    }

    Ok(report)
}
