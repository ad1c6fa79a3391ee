//! Stratified partitioning of labelled feature rows
//!
//! Both the train/test split and the cross-validation folds keep each class's
//! share of rows. Shuffling is seeded, and every returned index list is sorted
//! so partitions keep the input's relative order.

use fraudscope_core::FeatureMatrix;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use tracing::info;

use crate::deterministic::seeded_rng;
use crate::errors::{Result, TrainerError};
use crate::imbalance::Smote;

/// Feature rows with their labels
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl Partition {
    pub fn select(rows: &[Vec<f64>], labels: &[u8], indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| labels[i]).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// (legitimate, fraud) row counts
    pub fn class_counts(&self) -> (usize, usize) {
        let fraud = self.labels.iter().filter(|&&l| l == 1).count();
        (self.labels.len() - fraud, fraud)
    }
}

fn indices_by_class(labels: &[u8]) -> BTreeMap<u8, Vec<usize>> {
    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }
    by_class
}

/// Split row indices into (train, test), preserving the class ratio
pub fn stratified_split_indices(
    labels: &[u8],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainerError::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut rng = seeded_rng(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (label, mut members) in indices_by_class(labels) {
        if members.len() < 2 {
            return Err(TrainerError::InsufficientData(format!(
                "class {} has {} rows; a stratified split needs at least 2",
                label,
                members.len()
            )));
        }
        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .clamp(1, members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Assign row indices to `k` folds, dealing each class round-robin after a shuffle
pub fn stratified_folds(labels: &[u8], k: usize, seed: u64) -> Result<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(TrainerError::InvalidParameter(format!(
            "cross-validation needs at least 2 folds, got {}",
            k
        )));
    }

    let mut rng = seeded_rng(seed);
    let mut folds = vec![Vec::new(); k];

    for (label, mut members) in indices_by_class(labels) {
        if members.len() < k {
            return Err(TrainerError::InsufficientData(format!(
                "class {} has {} rows, fewer than {} folds",
                label,
                members.len(),
                k
            )));
        }
        members.shuffle(&mut rng);
        for (pos, idx) in members.into_iter().enumerate() {
            folds[pos % k].push(idx);
        }
    }

    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Train and test partitions sharing one feature layout
///
/// Resampling is only reachable through `resample_train`, which never touches
/// the test partition.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub columns: Vec<String>,
    pub train: Partition,
    pub test: Partition,
    resampled: bool,
}

impl TrainTestSplit {
    /// Pair separately transformed train and test matrices
    pub fn from_partitions(train: FeatureMatrix, test: FeatureMatrix) -> Result<Self> {
        if train.columns != test.columns {
            return Err(TrainerError::FeatureMismatch {
                expected: train.columns,
                actual: test.columns,
            });
        }
        Ok(Self {
            columns: train.columns,
            train: Partition {
                rows: train.rows,
                labels: train.labels,
            },
            test: Partition {
                rows: test.rows,
                labels: test.labels,
            },
            resampled: false,
        })
    }

    pub fn is_resampled(&self) -> bool {
        self.resampled
    }

    /// Oversample the minority class of the training partition
    pub fn resample_train(mut self, smote: &Smote) -> Result<Self> {
        if self.resampled {
            return Err(TrainerError::InvalidStage(
                "training partition has already been resampled".into(),
            ));
        }
        let (before_neg, before_pos) = self.train.class_counts();
        let (rows, labels) = smote.resample(&self.train.rows, &self.train.labels)?;
        self.train = Partition { rows, labels };
        self.resampled = true;

        let (after_neg, after_pos) = self.train.class_counts();
        info!(
            "Resampled training partition: [{}, {}] -> [{}, {}]",
            before_neg, before_pos, after_neg, after_pos
        );
        Ok(self)
    }
}

/// Stratified train/test split of a feature matrix
pub fn split(matrix: &FeatureMatrix, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    let (train_idx, test_idx) = stratified_split_indices(&matrix.labels, test_fraction, seed)?;
    let train = Partition::select(&matrix.rows, &matrix.labels, &train_idx);
    let test = Partition::select(&matrix.rows, &matrix.labels, &test_idx);

    info!(
        "Split {} rows: train={} test={}",
        matrix.len(),
        train.len(),
        test.len()
    );

    Ok(TrainTestSplit {
        columns: matrix.columns.clone(),
        train,
        test,
        resampled: false,
    })
}
