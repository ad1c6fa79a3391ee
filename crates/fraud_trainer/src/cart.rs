//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy binary classification trees with Gini impurity. Candidate
//! thresholds are midpoints between consecutive distinct feature values; ties
//! in gain are broken deterministically by (feature, threshold).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::deterministic::SplitTieBreaker;

/// Growth limits for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all of them
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 15,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// A tree node; leaves carry the fraction of fraud rows that reached them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub feature: usize,
    pub threshold: f64,
    pub left: u32,
    pub right: u32,
    pub value: Option<f64>,
}

impl Node {
    fn leaf(value: f64) -> Self {
        Self {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }
}

/// Flat tree, node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Probability of class 1 for one row
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };
            if let Some(value) = node.value {
                return value;
            }
            idx = if row.get(node.feature).copied().unwrap_or(0.0) <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if node.value.is_none() => {
                    1 + walk(nodes, node.left as usize).max(walk(nodes, node.right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature: usize, threshold: f64, gain: f64) -> Self {
        Self {
            feature,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature, threshold),
        }
    }

    fn beats(&self, other: &Self) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Gini impurity of a node, weighted by its row count
fn weighted_gini(n: usize, positives: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n_f = n as f64;
    let pos = positives as f64;
    let neg = n_f - pos;
    n_f - (pos * pos + neg * neg) / n_f
}

/// Build a classification tree over a sample of row indices
pub struct CartBuilder<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [u8],
    config: TreeConfig,
    feature_count: usize,
    importances: Vec<f64>,
}

impl<'a> CartBuilder<'a> {
    pub fn new(rows: &'a [Vec<f64>], labels: &'a [u8], config: TreeConfig) -> Self {
        assert_eq!(rows.len(), labels.len());
        let feature_count = rows.first().map(Vec::len).unwrap_or(0);
        Self {
            rows,
            labels,
            config,
            feature_count,
            importances: vec![0.0; feature_count],
        }
    }

    /// Grow a tree on `indices` (repeats allowed, as in a bootstrap sample)
    ///
    /// Returns the tree and the total weighted impurity decrease per feature.
    pub fn build(mut self, indices: &[usize], rng: &mut StdRng) -> (Tree, Vec<f64>) {
        let mut nodes = Vec::new();
        self.build_node(indices.to_vec(), 0, &mut nodes, rng);
        (Tree { nodes }, self.importances)
    }

    fn build_node(
        &mut self,
        indices: Vec<usize>,
        depth: usize,
        nodes: &mut Vec<Node>,
        rng: &mut StdRng,
    ) -> u32 {
        let current_idx = nodes.len() as u32;
        let positives = indices.iter().filter(|&&i| self.labels[i] == 1).count();
        let leaf_value = if indices.is_empty() {
            0.0
        } else {
            positives as f64 / indices.len() as f64
        };

        // Check stopping conditions
        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || indices.len() < 2 * self.config.min_samples_leaf
            || positives == 0
            || positives == indices.len()
        {
            nodes.push(Node::leaf(leaf_value));
            return current_idx;
        }

        let split = match self.find_best_split(&indices, positives, rng) {
            Some(s) if s.gain > 0.0 => s,
            _ => {
                nodes.push(Node::leaf(leaf_value));
                return current_idx;
            }
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.rows[i][split.feature] <= split.threshold);

        self.importances[split.feature] += split.gain;

        // Reserve space for current node
        nodes.push(Node {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
            value: None,
        });

        let left_idx = self.build_node(left_indices, depth + 1, nodes, rng);
        let right_idx = self.build_node(right_indices, depth + 1, nodes, rng);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    /// Feature visiting order and how many splittable features to inspect
    fn candidate_features(&self, rng: &mut StdRng) -> (Vec<usize>, usize) {
        let mut order: Vec<usize> = (0..self.feature_count).collect();
        match self.config.max_features {
            Some(m) if m > 0 && m < self.feature_count => {
                order.shuffle(rng);
                (order, m)
            }
            _ => (order, self.feature_count),
        }
    }

    /// Whether `feature` takes more than one value over the node
    fn varies(&self, indices: &[usize], feature: usize) -> bool {
        let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = self.rows[i][feature];
            (lo.min(v), hi.max(v))
        });
        min < max
    }

    /// Sweep candidate features for the best Gini decrease
    ///
    /// Features that are constant over the node do not count toward the
    /// `max_features` budget, so a node is only left unsplit when no feature
    /// varies at all.
    fn find_best_split(
        &self,
        indices: &[usize],
        positives: usize,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let parent = weighted_gini(n, positives);
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;
        let (order, budget) = self.candidate_features(rng);
        let mut inspected = 0usize;

        for feature in order {
            if inspected >= budget {
                break;
            }
            if !self.varies(indices, feature) {
                continue;
            }
            inspected += 1;

            let mut column: Vec<(f64, u8)> = indices
                .iter()
                .map(|&i| (self.rows[i][feature], self.labels[i]))
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0usize;
            for p in 0..n - 1 {
                left_pos += usize::from(column[p].1 == 1);
                let left_n = p + 1;
                let right_n = n - left_n;

                if column[p].0 == column[p + 1].0 || left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let gain = parent
                    - weighted_gini(left_n, left_pos)
                    - weighted_gini(right_n, positives - left_pos);

                let mut threshold = column[p].0 + (column[p + 1].0 - column[p].0) / 2.0;
                if threshold >= column[p + 1].0 {
                    threshold = column[p].0;
                }

                let candidate = SplitCandidate::new(feature, threshold, gain);
                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }
}
