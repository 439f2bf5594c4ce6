use crate::model::TrainedModelArtifact;
use crate::types::FeatureAttribution;

/// Exact additive attribution for a linear-logit model.
///
/// With log-odds `f(z) = b + Σ w_i z_i` and baseline row `μ`, each feature gets
/// `φ_i = w_i (z_i - μ_i)` and `f(μ) + Σ φ_i = f(z)`. Returns `(f(μ), φ)`.
pub fn linear_attributions(artifact: &TrainedModelArtifact, z: &[f64]) -> (f64, Vec<FeatureAttribution>) {
    let base_value = artifact.classifier.decision(&artifact.baseline);
    let attributions = artifact
        .schema
        .features
        .iter()
        .zip(z)
        .zip(artifact.classifier.weights.iter().zip(&artifact.baseline))
        .map(|((spec, &value), (&w, &mu))| FeatureAttribution {
            feature: spec.name.clone(),
            transformed_value: value,
            contribution: w * (value - mu),
        })
        .collect();
    (base_value, attributions)
}

/// Attributions ordered by absolute contribution, largest first.
pub fn top_drivers(attributions: &[FeatureAttribution], n: usize) -> Vec<&FeatureAttribution> {
    let mut sorted: Vec<&FeatureAttribution> = attributions.iter().collect();
    sorted.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
    sorted.truncate(n);
    sorted
}
