//! Integration tests for the full fraud pipeline
//!
//! Runs on a small generated dataset where fraud rows purchase one second after
//! signing up and share a handful of devices.

use anyhow::Result;
use fraudscope_core::matrix::labels_from_table;
use fraudscope_trainer::pipeline::{load_engineered, prepare_split};
use fraudscope_trainer::{
    cross_validate, run, train, ForestConfig, ModelKind, ModelParams, PipelineConfig, TrainerError,
};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const ROWS: usize = 240;

fn transactions_csv() -> String {
    let mut csv = String::from(
        "user_id,signup_time,purchase_time,purchase_value,device_id,source,browser,sex,age,ip_address,class\n",
    );
    let browsers = ["Chrome", "Safari", "FireFox", "IE", "Opera"];
    let sources = ["SEO", "Ads", "Direct"];
    for i in 0..ROWS {
        let fraud = i % 8 == 0;
        let month = 1 + (i / 28) % 6;
        let day = 1 + i % 28;
        let hour = i % 24;
        let signup = format!("2015-{:02}-{:02} {:02}:00:00", month, day, hour);
        let purchase = if fraud {
            format!("2015-{:02}-{:02} {:02}:00:01", month, day, hour)
        } else {
            format!("2015-{:02}-{:02} {:02}:30:00", month + 3, day, hour)
        };
        let device = if fraud {
            format!("FRAUDDEV{}", i % 3)
        } else {
            format!("DEV{:05}", i)
        };
        let ip = if i % 5 == 0 {
            "1.2.3.4".to_string()
        } else {
            format!("{}.5", 16_909_056 + (i * 37) % 600)
        };
        writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{},{},{}",
            10_000 + i,
            signup,
            purchase,
            10 + (i * 7) % 90,
            device,
            sources[i % sources.len()],
            browsers[i % browsers.len()],
            if i % 2 == 0 { "M" } else { "F" },
            18 + (i * 3) % 50,
            ip,
            u8::from(fraud)
        )
        .expect("writing to a String");
    }
    csv
}

const RANGES: &str = "\
lower_bound_ip_address,upper_bound_ip_address,country
16909056.0,16909311,United States
16909312.0,16909567,Canada
";

struct Fixture {
    dir: TempDir,
    config: PipelineConfig,
}

fn fixture() -> Result<Fixture> {
    let dir = tempdir()?;
    let transactions = dir.path().join("Fraud_Data.csv");
    let ranges = dir.path().join("IpAddress_to_Country.csv");
    fs::write(&transactions, transactions_csv())?;
    fs::write(&ranges, RANGES)?;

    let mut config = PipelineConfig::default();
    config.paths.transactions = transactions;
    config.paths.ip_ranges = ranges;
    config.paths.output = dir.path().join("processed").join("fraud_processed.csv");
    config.paths.report = Some(dir.path().join("report.json"));
    config.modeling.cv_folds = 3;
    config.modeling.forest = ForestConfig {
        n_trees: 10,
        max_depth: 5,
        ..ForestConfig::default()
    };
    Ok(Fixture { dir, config })
}

fn small_params() -> ModelParams {
    ModelParams {
        forest: ForestConfig {
            n_trees: 10,
            max_depth: 5,
            ..ForestConfig::default()
        },
        ..ModelParams::default()
    }
}

#[test]
fn test_full_pipeline_run() -> Result<()> {
    let fx = fixture()?;
    let report = run(&fx.config)?;

    assert!(fx.config.paths.output.exists());
    assert_eq!(report.processed_rows, ROWS);
    assert_eq!(report.class_distribution.counts.get("1"), Some(&30));

    let split = report.split.as_ref().expect("modeling ran");
    assert_eq!(split.test_rows, 48);
    assert_eq!(split.test_classes, (42, 6));
    assert_eq!(split.train_classes, (168, 24));
    assert_eq!(split.train_classes_fitted, (168, 168));

    assert_eq!(report.evaluations.len(), 2);
    assert_eq!(report.evaluations[0].model, "LogisticRegression");
    assert_eq!(report.evaluations[1].model, "RandomForest");
    for evaluation in &report.evaluations {
        assert!(evaluation.roc_auc > 0.9, "{} roc_auc {}", evaluation.model, evaluation.roc_auc);
        assert!((0.0..=1.0).contains(&evaluation.pr_auc));
    }
    for cv in &report.cross_validation {
        assert_eq!(cv.scores.len(), 3);
    }
    assert!(!report.feature_importances.is_empty());

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(fx.dir.path().join("report.json"))?)?;
    assert_eq!(json["output_blake3"], report.output_blake3.as_str());
    assert_eq!(json["evaluations"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn test_reruns_are_reproducible() -> Result<()> {
    let fx = fixture()?;
    let first = run(&fx.config)?;
    let second = run(&fx.config)?;

    assert_eq!(first.output_blake3, second.output_blake3);
    for (a, b) in first.evaluations.iter().zip(&second.evaluations) {
        assert_eq!(a.pr_auc, b.pr_auc);
        assert_eq!(a.roc_auc, b.roc_auc);
    }
    for (a, b) in first.cross_validation.iter().zip(&second.cross_validation) {
        assert_eq!(a, b);
    }
    Ok(())
}

#[test]
fn test_skip_modeling_writes_table_only() -> Result<()> {
    let mut fx = fixture()?;
    fx.config.modeling.enabled = false;
    let report = run(&fx.config)?;

    assert!(fx.config.paths.output.exists());
    assert!(report.split.is_none());
    assert!(report.evaluations.is_empty());
    Ok(())
}

#[test]
fn test_missing_input_fails() -> Result<()> {
    let mut fx = fixture()?;
    fx.config.paths.ip_ranges = Path::new("does/not/exist.csv").to_path_buf();
    assert!(run(&fx.config).is_err());
    assert!(!fx.config.paths.output.exists());
    Ok(())
}

#[test]
fn test_modeling_failure_writes_nothing() -> Result<()> {
    let mut fx = fixture()?;
    // more folds than fraud rows: cross-validation fails after the table is built
    fx.config.modeling.cv_folds = 500;

    let err = run(&fx.config).unwrap_err();
    assert!(matches!(err, TrainerError::InsufficientData(_)));
    assert!(!fx.config.paths.output.exists());
    assert!(!fx.dir.path().join("report.json").exists());
    Ok(())
}

#[test]
fn test_modeling_failure_keeps_previous_output() -> Result<()> {
    let mut fx = fixture()?;
    let output = fx.config.paths.output.clone();
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, "previous run\n")?;

    fx.config.modeling.cv_folds = 500;
    assert!(run(&fx.config).is_err());
    assert_eq!(fs::read_to_string(&output)?, "previous run\n");
    Ok(())
}

#[test]
fn test_test_partition_untouched_by_resampling() -> Result<()> {
    let fx = fixture()?;
    let engineered = load_engineered(&fx.config)?;
    let split = prepare_split(&engineered, &fx.config)?;
    let test_before = split.test.clone();

    let resampled = split.resample_train(&fx.config.imbalance.smote())?;
    assert_eq!(resampled.test, test_before);
    let (neg, pos) = resampled.train.class_counts();
    assert_eq!(neg, pos);
    Ok(())
}

#[test]
fn test_model_rejects_reordered_columns() -> Result<()> {
    let fx = fixture()?;
    let engineered = load_engineered(&fx.config)?;
    let split = prepare_split(&engineered, &fx.config)?;

    let model = train(
        ModelKind::LogisticRegression,
        &small_params(),
        &split.columns,
        &split.train.rows,
        &split.train.labels,
    )?;

    let mut reordered = split.columns.clone();
    reordered.swap(0, 1);
    let err = model.predict_proba(&reordered, &split.test.rows).unwrap_err();
    assert!(matches!(err, TrainerError::FeatureMismatch { .. }));
    Ok(())
}

#[test]
fn test_cross_validation_same_seed_same_scores() -> Result<()> {
    let fx = fixture()?;
    let engineered = load_engineered(&fx.config)?;
    let split = prepare_split(&engineered, &fx.config)?;

    let a = cross_validate(ModelKind::RandomForest, &small_params(), &split.columns, &split.train, 3, 42)?;
    let b = cross_validate(ModelKind::RandomForest, &small_params(), &split.columns, &split.train, 3, 42)?;
    assert_eq!(a.mean, b.mean);
    assert_eq!(a.scores, b.scores);
    Ok(())
}

#[test]
fn test_labels_survive_engineering() -> Result<()> {
    let fx = fixture()?;
    let engineered = load_engineered(&fx.config)?;
    let labels = labels_from_table(&engineered, &fx.config.columns.label)?;
    assert_eq!(labels.iter().filter(|&&l| l == 1).count(), 30);
    Ok(())
}
