//! Synthetic minority oversampling (SMOTE)
//!
//! New minority rows are placed on the segment between a minority row and one
//! of its k nearest minority neighbours until both classes have the same
//! count. Call this on a training partition only, after the train/test split:
//! synthetic rows built from test rows would leak near-duplicates into
//! evaluation. `TrainTestSplit::resample_train` is the pipeline's way in.

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::deterministic::seeded_rng;
use crate::errors::{Result, TrainerError};

/// SMOTE configuration
#[derive(Debug, Clone)]
pub struct Smote {
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for Smote {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Indices (into `points`) of the k nearest other points for each point
fn nearest_neighbors(points: &[&[f64]], k: usize) -> Vec<Vec<usize>> {
    points
        .par_iter()
        .enumerate()
        .map(|(i, p)| {
            let mut dists: Vec<(f64, usize)> = points
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, q)| (squared_distance(p, q), j))
                .collect();
            let by_distance = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
            if k < dists.len() {
                dists.select_nth_unstable_by(k, by_distance);
                dists.truncate(k);
            }
            dists.sort_by(by_distance);
            dists.into_iter().map(|(_, j)| j).collect()
        })
        .collect()
}

impl Smote {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self { k_neighbors, seed }
    }

    /// Return the input rows followed by synthetic minority rows
    #[instrument(skip(self, rows, labels), fields(rows = rows.len()))]
    pub fn resample(&self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(Vec<Vec<f64>>, Vec<u8>)> {
        if rows.len() != labels.len() {
            return Err(TrainerError::InvalidParameter(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if self.k_neighbors == 0 {
            return Err(TrainerError::InvalidParameter("k_neighbors must be at least 1".into()));
        }

        let positives = labels.iter().filter(|&&l| l == 1).count();
        let negatives = labels.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(TrainerError::InsufficientData(
                "oversampling needs both classes present".into(),
            ));
        }
        if positives == negatives {
            return Ok((rows.to_vec(), labels.to_vec()));
        }

        let (minority_label, majority_count) = if positives < negatives {
            (1u8, negatives)
        } else {
            (0u8, positives)
        };
        let minority: Vec<&[f64]> = rows
            .iter()
            .zip(labels)
            .filter(|(_, &l)| l == minority_label)
            .map(|(r, _)| r.as_slice())
            .collect();

        if minority.len() < 2 {
            return Err(TrainerError::InsufficientData(format!(
                "{} minority rows; interpolation needs at least 2",
                minority.len()
            )));
        }

        let k = self.k_neighbors.min(minority.len() - 1);
        let neighbors = nearest_neighbors(&minority, k);
        let n_new = majority_count - minority.len();
        debug!(
            "Synthesizing {} rows from {} minority rows (k={})",
            n_new,
            minority.len(),
            k
        );

        let mut rng = seeded_rng(self.seed);
        let mut out_rows = rows.to_vec();
        let mut out_labels = labels.to_vec();
        out_rows.reserve(n_new);
        out_labels.reserve(n_new);

        for s in 0..n_new {
            let base = minority[s % minority.len()];
            let neighbor = minority[neighbors[s % minority.len()][rng.gen_range(0..k)]];
            let gap: f64 = rng.gen();
            let synthetic = base
                .iter()
                .zip(neighbor)
                .map(|(b, n)| b + gap * (n - b))
                .collect();
            out_rows.push(synthetic);
            out_labels.push(minority_label);
        }

        Ok((out_rows, out_labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            rows.push(vec![i as f64, 0.0]);
            labels.push(0);
        }
        for i in 0..5 {
            rows.push(vec![100.0 + i as f64, 10.0]);
            labels.push(1);
        }
        (rows, labels)
    }

    #[test]
    fn test_classes_balanced() {
        let (rows, labels) = data();
        let (out_rows, out_labels) = Smote::default().resample(&rows, &labels).unwrap();
        let pos = out_labels.iter().filter(|&&l| l == 1).count();
        assert_eq!(pos, 20);
        assert_eq!(out_labels.len(), 40);
        assert_eq!(out_rows.len(), 40);
        assert_eq!(&out_rows[..25], &rows[..]);
    }

    #[test]
    fn test_synthetic_rows_lie_between_minority_rows() {
        let (rows, labels) = data();
        let (out_rows, _) = Smote::new(2, 7).resample(&rows, &labels).unwrap();
        for row in &out_rows[25..] {
            assert!(row[0] >= 100.0 && row[0] <= 104.0);
            assert_eq!(row[1], 10.0);
        }
    }

    #[test]
    fn test_reproducible_with_seed() {
        let (rows, labels) = data();
        let a = Smote::new(3, 11).resample(&rows, &labels).unwrap();
        let b = Smote::new(3, 11).resample(&rows, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_minority_row_rejected() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0]];
        let labels = vec![0, 0, 1];
        let err = Smote::default().resample(&rows, &labels).unwrap_err();
        assert!(matches!(err, TrainerError::InsufficientData(_)));
    }

    #[test]
    fn test_nearest_neighbors_excludes_self() {
        let a = [0.0];
        let b = [1.0];
        let c = [5.0];
        let points: Vec<&[f64]> = vec![&a, &b, &c];
        let nn = nearest_neighbors(&points, 1);
        assert_eq!(nn, vec![vec![1], vec![0], vec![1]]);
    }

    #[test]
    fn test_nearest_neighbors_ordered_by_distance() {
        let coords: Vec<[f64; 2]> = (0..12)
            .map(|i| [((i * 7) % 12) as f64, ((i * 5) % 3) as f64])
            .collect();
        let points: Vec<&[f64]> = coords.iter().map(|c| c.as_slice()).collect();
        let nn = nearest_neighbors(&points, 3);

        for (i, found) in nn.iter().enumerate() {
            let mut all: Vec<(f64, usize)> = (0..points.len())
                .filter(|&j| j != i)
                .map(|j| (squared_distance(points[i], points[j]), j))
                .collect();
            all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let expected: Vec<usize> = all.iter().take(3).map(|&(_, j)| j).collect();
            assert_eq!(found, &expected);
        }

        // k larger than the population returns everyone else
        assert_eq!(nearest_neighbors(&points[..3], 10)[0].len(), 2);
    }
}
