use crate::error::{IndexError, Result};
use crate::index::IndexStore;
use crate::vsm::{Representation, TermSimilarity, TermVector, VectorSpaceModel};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const DEFAULT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_SEED: u64 = 2;

/// Lloyd's k-means over dense rows with Euclidean distance.
///
/// Initial centroids are distinct rows picked in a seeded random order, so
/// a dataset with fewer than `k` distinct rows leaves some clusters empty.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    seed: u64,
}

impl KMeans {
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 {
            return Err(IndexError::invalid_argument("k must be greater than 0"));
        }
        Ok(Self { k, max_iterations: DEFAULT_MAX_ITERATIONS, seed: DEFAULT_SEED })
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn k(&self) -> usize { self.k }

    /// Cluster label of every row, in row order. Labels are in `0..k`.
    pub fn fit(&self, rows: &[&[f64]]) -> Vec<usize> {
        if rows.is_empty() {
            return Vec::new();
        }
        let mut centroids = self.initial_centroids(rows);
        let mut assignments = assign(rows, &centroids);

        for iteration in 0..self.max_iterations {
            update_centroids(rows, &assignments, &mut centroids);
            let next = assign(rows, &centroids);
            if next == assignments {
                tracing::debug!(iterations = iteration + 1, "k-means converged");
                break;
            }
            assignments = next;
        }
        assignments
    }

    fn initial_centroids(&self, rows: &[&[f64]]) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.shuffle(&mut rng);

        let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(self.k);
        for i in order {
            if centroids.len() == self.k {
                break;
            }
            if !centroids.iter().any(|c| c.as_slice() == rows[i]) {
                centroids.push(rows[i].to_vec());
            }
        }
        centroids
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centroid per row; ties go to the lower label.
fn assign(rows: &[&[f64]], centroids: &[Vec<f64>]) -> Vec<usize> {
    rows.iter()
        .map(|row| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (i, c) in centroids.iter().enumerate() {
                let d = squared_distance(row, c);
                if d < best_distance {
                    best = i;
                    best_distance = d;
                }
            }
            best
        })
        .collect()
}

fn update_centroids(rows: &[&[f64]], assignments: &[usize], centroids: &mut [Vec<f64>]) {
    let dim = rows[0].len();
    let mut sums = vec![vec![0.0; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (row, &label) in rows.iter().zip(assignments) {
        counts[label] += 1;
        for (s, x) in sums[label].iter_mut().zip(row.iter()) {
            *s += x;
        }
    }
    for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
        // an emptied cluster keeps its previous centroid
        if count > 0 {
            *centroid = sum.into_iter().map(|s| s / count as f64).collect();
        }
    }
}

/// Result of clustering the terms closest to a pivot.
#[derive(Debug, Clone)]
pub struct TermClusters {
    pub pivot: String,
    /// The ranked terms that were clustered, most similar first.
    pub ranking: Vec<TermSimilarity>,
    /// Member terms per label; always `k` entries, possibly empty.
    pub clusters: Vec<Vec<String>>,
}

/// Rank the `limit` terms most similar to `pivot`, then partition their
/// vectors into `k` clusters.
pub fn cluster_terms(
    store: &IndexStore,
    field: &str,
    representation: Representation,
    pivot: &str,
    limit: usize,
    kmeans: &KMeans,
) -> Result<TermClusters> {
    let model = VectorSpaceModel::build(store, field, representation)?;
    let ranking = model.rank(pivot, limit)?;

    let vectors: Vec<&TermVector> = ranking
        .iter()
        .map(|t| model.vector(&t.term).ok_or_else(|| IndexError::TermNotFound { field: field.to_string(), term: t.term.clone() }))
        .collect::<Result<_>>()?;
    let rows: Vec<&[f64]> = vectors.iter().map(|v| v.as_slice()).collect();
    let assignments = kmeans.fit(&rows);

    let mut clusters = vec![Vec::new(); kmeans.k()];
    for (term, label) in ranking.iter().zip(assignments) {
        clusters[label].push(term.term.clone());
    }
    Ok(TermClusters { pivot: pivot.to_string(), ranking, clusters })
}
