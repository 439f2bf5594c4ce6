use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Config, KMEANS_MAX_ITER, KMEANS_N_INIT, KMEANS_TOL};
use crate::error::{AppError, Result};
use crate::labeling::kmeans::KMeans;
use crate::model::scaler::StandardScaler;
use crate::types::{CustomerFeatureVector, LabelSource, LabeledCustomer, RiskClass, RiskLabel};

/// Aggregate view of one RFM cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub size: usize,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
    /// `z(recency) - z(frequency) - z(monetary)` of the cluster mean. Larger = riskier.
    pub risk_score: f64,
}

/// What was done to produce the labels; persisted with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelingSummary {
    pub method: String,
    pub n_clusters: usize,
    pub seed: u64,
    pub high_risk_cluster: usize,
    pub high_risk_count: usize,
    pub clusters: Vec<ClusterProfile>,
}

#[derive(Debug, Clone)]
pub struct ProxyLabeling {
    /// Aligned with the input slice.
    pub labels: Vec<RiskLabel>,
    pub summary: LabelingSummary,
}

impl ProxyLabeling {
    pub fn attach(&self, customers: &[CustomerFeatureVector]) -> Vec<LabeledCustomer> {
        customers
            .iter()
            .zip(self.labels.iter())
            .map(|(features, label)| LabeledCustomer { features: features.clone(), label: *label })
            .collect()
    }
}

/// Derives a binary proxy default label from RFM behaviour: cluster the
/// standardized `[recency, frequency, monetary]` vectors and flag the cluster
/// that is most recent-inactive, least frequent, and lowest spending.
#[derive(Debug, Clone)]
pub struct ProxyLabeler {
    kmeans: KMeans,
}

impl ProxyLabeler {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            kmeans: KMeans {
                n_clusters,
                n_init: KMEANS_N_INIT,
                max_iter: KMEANS_MAX_ITER,
                tol: KMEANS_TOL,
                seed,
            },
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.kmeans_clusters, cfg.random_seed)
    }

    pub fn label(&self, customers: &[CustomerFeatureVector]) -> Result<ProxyLabeling> {
        let k = self.kmeans.n_clusters;
        if customers.len() < k {
            return Err(AppError::Training(format!(
                "proxy labeling needs at least {k} customers, got {}",
                customers.len()
            )));
        }

        let flat: Vec<f64> = customers.iter().flat_map(|c| c.rfm()).collect();
        let rfm = Array2::from_shape_vec((customers.len(), 3), flat)
            .map_err(|e| AppError::Training(format!("RFM matrix: {e}")))?;

        let scaler = StandardScaler::fit(rfm.view());
        let scaled = scaler.transform(rfm.view());
        let fit = self.kmeans.fit(scaled.view())?;

        let clusters = profile_clusters(&rfm, &fit.assignments, k, &scaler);
        let high_risk_cluster = select_high_risk(&clusters);

        let labels: Vec<RiskLabel> = fit
            .assignments
            .iter()
            .map(|&cluster| RiskLabel {
                class: if cluster == high_risk_cluster {
                    RiskClass::HighRisk
                } else {
                    RiskClass::LowRisk
                },
                source: LabelSource::RfmProxy { cluster },
            })
            .collect();
        let high_risk_count = labels.iter().filter(|l| l.class.is_high_risk()).count();

        for c in &clusters {
            info!(
                cluster = c.cluster,
                size = c.size,
                risk_score = c.risk_score,
                "[LABEL] cluster {} | n={} | recency={:.1} frequency={:.1} monetary={:.1}",
                c.cluster, c.size, c.mean_recency, c.mean_frequency, c.mean_monetary,
            );
        }
        info!(
            high_risk_cluster,
            high_risk_count,
            customers = customers.len(),
            inertia = fit.inertia,
            "[LABEL] cluster {high_risk_cluster} designated high-risk (proxy default)"
        );

        Ok(ProxyLabeling {
            labels,
            summary: LabelingSummary {
                method: "rfm_kmeans".to_string(),
                n_clusters: k,
                seed: self.kmeans.seed,
                high_risk_cluster,
                high_risk_count,
                clusters,
            },
        })
    }
}

fn profile_clusters(
    rfm: &Array2<f64>,
    assignments: &[usize],
    k: usize,
    scaler: &StandardScaler,
) -> Vec<ClusterProfile> {
    (0..k)
        .map(|cluster| {
            let members: Vec<usize> = assignments
                .iter()
                .enumerate()
                .filter(|(_, a)| **a == cluster)
                .map(|(i, _)| i)
                .collect();
            let size = members.len();
            let means = if size == 0 {
                ndarray::Array1::from(scaler.mean.clone())
            } else {
                rfm.select(Axis(0), &members)
                    .mean_axis(Axis(0))
                    .unwrap_or_else(|| ndarray::Array1::from(scaler.mean.clone()))
            };
            let z = scaler.transform_row(means.view());
            ClusterProfile {
                cluster,
                size,
                mean_recency: means[0],
                mean_frequency: means[1],
                mean_monetary: means[2],
                risk_score: z[0] - z[1] - z[2],
            }
        })
        .collect()
}

/// A cluster that is simultaneously the most dormant, least frequent and
/// lowest spending wins outright. Otherwise every cluster holding one of those
/// extremes is a candidate and the highest risk score wins; exact ties go to
/// the lowest cluster id. Empty clusters never qualify.
pub fn select_high_risk(clusters: &[ClusterProfile]) -> usize {
    let live: Vec<&ClusterProfile> = clusters.iter().filter(|c| c.size > 0).collect();
    if live.is_empty() {
        return 0;
    }

    let max_r = live.iter().map(|c| c.mean_recency).fold(f64::NEG_INFINITY, f64::max);
    let min_f = live.iter().map(|c| c.mean_frequency).fold(f64::INFINITY, f64::min);
    let min_m = live.iter().map(|c| c.mean_monetary).fold(f64::INFINITY, f64::min);

    if let Some(c) = live
        .iter()
        .find(|c| c.mean_recency == max_r && c.mean_frequency == min_f && c.mean_monetary == min_m)
    {
        return c.cluster;
    }

    let mut best: Option<&ClusterProfile> = None;
    for c in live.iter().filter(|c| {
        c.mean_recency == max_r || c.mean_frequency == min_f || c.mean_monetary == min_m
    }) {
        if best.map_or(true, |b| c.risk_score > b.risk_score) {
            best = Some(*c);
        }
    }
    best.map(|c| c.cluster).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::synthetic_customers;

    fn profile(cluster: usize, r: f64, f: f64, m: f64, score: f64) -> ClusterProfile {
        ClusterProfile {
            cluster,
            size: 10,
            mean_recency: r,
            mean_frequency: f,
            mean_monetary: m,
            risk_score: score,
        }
    }

    #[test]
    fn clear_winner_is_selected() {
        let clusters = vec![
            profile(0, 5.0, 50.0, 9000.0, -2.0),
            profile(1, 200.0, 2.0, 100.0, 3.0),
            profile(2, 20.0, 15.0, 3000.0, -0.5),
        ];
        assert_eq!(select_high_risk(&clusters), 1);
    }

    #[test]
    fn conflicting_extremes_fall_back_to_risk_score() {
        // Cluster 0 is the most dormant, cluster 2 spends least.
        let clusters = vec![
            profile(0, 300.0, 10.0, 800.0, 1.2),
            profile(1, 5.0, 60.0, 9000.0, -2.5),
            profile(2, 100.0, 3.0, 50.0, 1.9),
        ];
        assert_eq!(select_high_risk(&clusters), 2);
    }

    #[test]
    fn risk_score_tie_goes_to_lowest_id() {
        let clusters = vec![
            profile(0, 300.0, 10.0, 800.0, 1.5),
            profile(1, 5.0, 60.0, 9000.0, -2.5),
            profile(2, 100.0, 3.0, 50.0, 1.5),
        ];
        assert_eq!(select_high_risk(&clusters), 0);
    }

    #[test]
    fn empty_clusters_never_win() {
        let mut empty = profile(0, 999.0, 0.0, 0.0, 9.0);
        empty.size = 0;
        let clusters = vec![empty, profile(1, 5.0, 60.0, 9000.0, -2.5), profile(2, 100.0, 3.0, 50.0, 1.0)];
        assert_eq!(select_high_risk(&clusters), 2);
    }

    #[test]
    fn labeling_is_reproducible() {
        let customers = synthetic_customers();
        let labeler = ProxyLabeler::new(3, 42);
        let a = labeler.label(&customers).unwrap();
        let b = labeler.label(&customers).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn bottom_decile_lands_in_high_risk_cluster() {
        let customers = synthetic_customers();
        assert_eq!(customers.len(), 100);
        let labeling = ProxyLabeler::new(3, 42).label(&customers).unwrap();

        for (c, label) in customers.iter().zip(&labeling.labels) {
            let dormant = c.customer_id.starts_with("DORMANT");
            assert_eq!(label.class.is_high_risk(), dormant, "{} labeled {}", c.customer_id, label.class);
            assert!(matches!(label.source, LabelSource::RfmProxy { .. }));
        }
        assert_eq!(labeling.summary.high_risk_count, 10);
    }

    #[test]
    fn very_active_customer_is_not_high_risk() {
        let mut customers = synthetic_customers();
        let mut whale = customers[0].clone();
        whale.customer_id = "WHALE".to_string();
        whale.recency = 0.0;
        whale.frequency = 100.0;
        whale.monetary = 60_000.0;
        customers.push(whale);

        let labeling = ProxyLabeler::new(3, 42).label(&customers).unwrap();
        let last = labeling.labels.last().unwrap();
        assert_eq!(last.class, RiskClass::LowRisk);
    }

    #[test]
    fn too_few_customers_is_an_error() {
        let customers = synthetic_customers();
        let err = ProxyLabeler::new(3, 42).label(&customers[..2]).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }
}
