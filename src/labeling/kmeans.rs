use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{AppError, Result};

/// Lloyd's K-Means with k-means++ seeding and several restarts.
/// Every random draw comes from one `StdRng` seeded with `seed`, so a fit is
/// a pure function of `(data, parameters)`.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// `n_clusters x n_features`, in the space the data was given in.
    pub centroids: Array2<f64>,
    pub assignments: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeans {
    pub fn fit(&self, data: ArrayView2<f64>) -> Result<KMeansFit> {
        let n = data.nrows();
        if self.n_clusters == 0 {
            return Err(AppError::Training("n_clusters must be positive".to_string()));
        }
        if n < self.n_clusters {
            return Err(AppError::Training(format!(
                "need at least {} samples to form {} clusters, got {n}",
                self.n_clusters, self.n_clusters
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;

        for run in 0..self.n_init.max(1) {
            let init = plus_plus_init(data, self.n_clusters, &mut rng);
            let fit = self.lloyd(data, init, &mut rng);
            debug!(run, inertia = fit.inertia, iterations = fit.iterations, "[LABEL] k-means restart");
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| AppError::Training("k-means produced no fit".to_string()))
    }

    fn lloyd(&self, data: ArrayView2<f64>, mut centroids: Array2<f64>, rng: &mut StdRng) -> KMeansFit {
        let k = self.n_clusters;
        let mut assignments = vec![0usize; data.nrows()];
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;
            for (i, row) in data.axis_iter(Axis(0)).enumerate() {
                assignments[i] = nearest(centroids.view(), row).0;
            }

            let mut next = Array2::<f64>::zeros(centroids.raw_dim());
            let mut counts = vec![0usize; k];
            for (i, row) in data.axis_iter(Axis(0)).enumerate() {
                let c = assignments[i];
                counts[c] += 1;
                let mut target = next.row_mut(c);
                target += &row;
            }

            for c in 0..k {
                if counts[c] == 0 {
                    // Re-seed an empty cluster on a random sample.
                    let idx = rng.gen_range(0..data.nrows());
                    next.row_mut(c).assign(&data.row(idx));
                } else {
                    next.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                }
            }

            let shift: f64 = (&next - &centroids).mapv(|v| v * v).sum();
            centroids = next;
            if shift <= self.tol {
                break;
            }
        }

        // Final assignment against the converged centroids.
        let mut inertia = 0.0;
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            let (c, d2) = nearest(centroids.view(), row);
            assignments[i] = c;
            inertia += d2;
        }

        KMeansFit { centroids, assignments, inertia, iterations }
    }
}

fn plus_plus_init(data: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::<f64>::zeros((k, data.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));
    let mut d2: Vec<f64> = data
        .axis_iter(Axis(0))
        .map(|row| sq_dist(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = d2.iter().sum();
        let idx = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, w) in d2.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            rng.gen_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(idx));
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            d2[i] = d2[i].min(sq_dist(row, centroids.row(c)));
        }
    }
    centroids
}

/// `(cluster index, squared distance)`; ties go to the lower index.
pub fn nearest(centroids: ArrayView2<f64>, row: ArrayView1<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
        let d = sq_dist(row, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
