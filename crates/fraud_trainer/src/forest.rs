//! Random forest of bootstrapped Gini trees
//!
//! Each tree gets its own RNG stream derived from the forest seed and its
//! index, so trees can be grown in parallel with identical results.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cart::{CartBuilder, Tree, TreeConfig};
use crate::deterministic::{derive_seed, seeded_rng};
use crate::errors::{Result, TrainerError};

/// How many features each split may consider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, feature_count: usize) -> usize {
        let n = match *self {
            MaxFeatures::All => feature_count,
            MaxFeatures::Sqrt => (feature_count as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (feature_count as f64).log2().floor() as usize,
            MaxFeatures::Count(n) => n,
        };
        n.clamp(1, feature_count.max(1))
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 15,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<Tree>,
    /// Mean decrease in impurity per feature, summing to 1 when any split was made
    pub feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit(config: &ForestConfig, rows: &[Vec<f64>], labels: &[u8]) -> Result<Self> {
        if config.n_trees == 0 {
            return Err(TrainerError::InvalidParameter("n_trees must be at least 1".into()));
        }
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(TrainerError::InsufficientData(format!(
                "{} rows with {} labels",
                rows.len(),
                labels.len()
            )));
        }

        let feature_count = rows[0].len();
        let tree_config = TreeConfig {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: Some(config.max_features.resolve(feature_count)),
        };

        tracing::info!(
            "Growing {} trees (max_depth={}, max_features={:?}) on {} rows",
            config.n_trees,
            config.max_depth,
            config.max_features,
            rows.len()
        );

        let grown: Vec<(Tree, Vec<f64>)> = (0..config.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = seeded_rng(derive_seed(config.seed, tree_idx as u64));
                let sample: Vec<usize> = if config.bootstrap {
                    (0..rows.len()).map(|_| rng.gen_range(0..rows.len())).collect()
                } else {
                    (0..rows.len()).collect()
                };
                CartBuilder::new(rows, labels, tree_config.clone()).build(&sample, &mut rng)
            })
            .collect();

        let mut feature_importances = vec![0.0; feature_count];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, importances) in grown {
            let total: f64 = importances.iter().sum();
            if total > 0.0 {
                for (acc, imp) in feature_importances.iter_mut().zip(&importances) {
                    *acc += imp / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut feature_importances {
                *imp /= total;
            }
        }

        Ok(Self {
            trees,
            feature_importances,
        })
    }

    /// Mean of the trees' leaf fraud fractions
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
        sum / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let x = i as f64;
            rows.push(vec![x, (i % 5) as f64, 1.0]);
            labels.push(u8::from(i >= 40));
        }
        (rows, labels)
    }

    fn small() -> ForestConfig {
        ForestConfig {
            n_trees: 10,
            max_depth: 4,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(20), 4);
        assert_eq!(MaxFeatures::Log2.resolve(20), 4);
        assert_eq!(MaxFeatures::All.resolve(20), 20);
        assert_eq!(MaxFeatures::Count(50).resolve(20), 20);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn test_forest_separates_classes() {
        let (rows, labels) = data();
        let config = ForestConfig {
            max_features: MaxFeatures::All,
            ..small()
        };
        let forest = RandomForest::fit(&config, &rows, &labels).unwrap();
        assert_eq!(forest.trees.len(), 10);
        assert!(forest.predict_proba(&[55.0, 0.0, 1.0]) > 0.5);
        assert!(forest.predict_proba(&[5.0, 0.0, 1.0]) < 0.5);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (rows, labels) = data();
        let a = RandomForest::fit(&small(), &rows, &labels).unwrap();
        let b = RandomForest::fit(&small(), &rows, &labels).unwrap();
        assert_eq!(a.trees, b.trees);
        assert_eq!(a.feature_importances, b.feature_importances);
    }

    #[test]
    fn test_importances_normalized() {
        let (rows, labels) = data();
        let forest = RandomForest::fit(&small(), &rows, &labels).unwrap();
        let total: f64 = forest.feature_importances.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        // constant column never splits
        assert_eq!(forest.feature_importances[2], 0.0);

        let config = ForestConfig {
            max_features: MaxFeatures::All,
            ..small()
        };
        let forest = RandomForest::fit(&config, &rows, &labels).unwrap();
        assert!(forest.feature_importances[0] > forest.feature_importances[1]);
    }

    #[test]
    fn test_zero_trees_rejected() {
        let (rows, labels) = data();
        let config = ForestConfig {
            n_trees: 0,
            ..ForestConfig::default()
        };
        assert!(RandomForest::fit(&config, &rows, &labels).is_err());
    }
}
