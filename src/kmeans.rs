use itertools::Itertools as _;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct KMeansOptions {
    n_clusters: NonZeroUsize,
    max_iter: NonZeroUsize,
    seed: Option<u64>,
}

impl KMeansOptions {
    pub fn new(n_clusters: NonZeroUsize) -> Self {
        Self {
            n_clusters,
            max_iter: NonZeroUsize::new(100).expect("never fails"),
            seed: None,
        }
    }

    pub fn max_iter(mut self, max_iter: NonZeroUsize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        let seed = self.seed.unwrap_or_else(|| rand::thread_rng().gen());
        StdRng::seed_from_u64(seed)
    }

    /// Lloyd's algorithm started from `n_clusters` distinct random points.
    #[instrument(skip(self, points), fields(n = points.len(), k = self.n_clusters.get()))]
    pub fn fit(&self, points: &[Vec<f64>]) -> Result<KMeans, KMeansError> {
        let k = self.n_clusters.get();
        let dim = points.first().ok_or(KMeansError::EmptyPoints)?.len();
        if k > points.len() {
            return Err(KMeansError::TooManyClusters {
                k,
                n: points.len(),
            });
        }
        for (row, p) in points.iter().enumerate() {
            if p.len() != dim {
                return Err(KMeansError::DimensionMismatch {
                    row,
                    expected: dim,
                    got: p.len(),
                });
            }
            if p.iter().any(|x| !x.is_finite()) {
                return Err(KMeansError::NonFinite { row });
            }
        }

        let indices = (0..points.len()).collect::<Vec<_>>();
        let mut centroids = indices
            .choose_multiple(&mut self.rng(), k)
            .map(|&i| points[i].clone())
            .collect::<Vec<_>>();

        let mut labels = Vec::new();
        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iter.get() {
            iterations += 1;
            labels = assign(points, &centroids);
            let next = update(points, &labels, &centroids);
            debug!(
                iteration = iterations,
                inertia = inertia(points, &labels, &centroids),
                "k-means step"
            );
            if next == centroids {
                converged = true;
                break;
            }
            centroids = next;
        }

        info!(iterations, converged, "k-means finished");
        Ok(KMeans {
            labels,
            centroids,
            iterations,
            converged,
        })
    }
}

/// Index of the nearest centroid for every point; ties go to the lower index.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points
        .par_iter()
        .map(|p| {
            centroids
                .iter()
                .map(|c| squared_distance(p, c))
                .position_min_by(|a, b| a.total_cmp(b))
                .expect("never fails")
        })
        .collect()
}

/// Member means; a cluster without members keeps its centroid.
fn update(points: &[Vec<f64>], labels: &[usize], centroids: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut sums = vec![vec![0.0; centroids[0].len()]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (p, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (s, x) in sums[label].iter_mut().zip(p) {
            *s += x;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(centroids)
        .map(|((sum, count), old)| {
            if count == 0 {
                old.clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn inertia(points: &[Vec<f64>], labels: &[usize], centroids: &[Vec<f64>]) -> f64 {
    points
        .iter()
        .zip(labels)
        .map(|(p, &label)| squared_distance(p, &centroids[label]))
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KMeans {
    labels: Vec<usize>,
    centroids: Vec<Vec<f64>>,
    iterations: usize,
    converged: bool,
}

impl KMeans {
    /// Cluster index of every input point.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Sum of squared distances from every point to its centroid.
    pub fn inertia(&self, points: &[Vec<f64>]) -> f64 {
        inertia(points, &self.labels, &self.centroids)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KMeansError {
    #[error("at least one point is required")]
    EmptyPoints,

    #[error("cannot form {k} clusters from {n} points")]
    TooManyClusters { k: usize, n: usize },

    #[error("point {row} has {got} coordinates, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("point {row} has a non finite coordinate")]
    NonFinite { row: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).expect("non-zero")
    }

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![10.0, 10.0],
            vec![10.0, 11.0],
            vec![11.0, 10.0],
        ]
    }

    #[test]
    fn separated_blobs_are_found() -> Result<(), anyhow::Error> {
        let points = blobs();
        for seed in 0..10 {
            let result = KMeansOptions::new(nz(2)).seed(seed).fit(&points)?;
            let labels = result.labels();
            assert_eq!(labels.len(), points.len());
            if !result.converged() {
                continue;
            }
            // A bad start can merge the blobs; a good one must separate them.
            if labels[0] != labels[3] {
                assert!(labels[..3].iter().all(|&l| l == labels[0]));
                assert!(labels[3..].iter().all(|&l| l == labels[3]));
                let low = &result.centroids()[labels[0]];
                assert!((low[0] - 1.0 / 3.0).abs() < 1e-12);
                assert!((low[1] - 1.0 / 3.0).abs() < 1e-12);
                assert!((result.inertia(&points) - 8.0 / 3.0).abs() < 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn same_seed_same_result() -> Result<(), anyhow::Error> {
        let points = blobs();
        let a = KMeansOptions::new(nz(3)).seed(7).fit(&points)?;
        let b = KMeansOptions::new(nz(3)).seed(7).fit(&points)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn one_cluster_is_the_mean() -> Result<(), anyhow::Error> {
        let points = vec![vec![1.0], vec![2.0], vec![6.0]];
        let result = KMeansOptions::new(nz(1)).seed(0).fit(&points)?;
        assert_eq!(result.labels(), [0, 0, 0]);
        assert_eq!(result.centroids(), [vec![3.0]]);
        assert!(result.converged());
        Ok(())
    }

    #[test]
    fn max_iter_bounds_the_loop() -> Result<(), anyhow::Error> {
        let result = KMeansOptions::new(nz(2))
            .max_iter(nz(1))
            .seed(3)
            .fit(&blobs())?;
        assert_eq!(result.iterations(), 1);
        Ok(())
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let options = KMeansOptions::new(nz(2));
        assert_eq!(options.fit(&[]), Err(KMeansError::EmptyPoints));
        assert_eq!(
            options.fit(&[vec![1.0]]),
            Err(KMeansError::TooManyClusters { k: 2, n: 1 })
        );
        assert_eq!(
            options.fit(&[vec![1.0], vec![1.0, 2.0]]),
            Err(KMeansError::DimensionMismatch {
                row: 1,
                expected: 1,
                got: 2
            })
        );
        assert_eq!(
            options.fit(&[vec![1.0], vec![f64::NAN]]),
            Err(KMeansError::NonFinite { row: 1 })
        );
    }
}
