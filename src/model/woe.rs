use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Weight-of-Evidence encoding for one categorical column.
///
/// `woe(c) = ln( ((bad_c + r) / (bad + 2r)) / ((good_c + r) / (good + 2r)) )`
/// where "bad" is the high-risk class. Positive values lean high-risk.
/// Categories never seen during fitting encode to 0 (no evidence either way).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoeTable {
    pub mapping: BTreeMap<String, f64>,
    /// Information Value of the column on the training split.
    pub information_value: f64,
}

impl WoeTable {
    pub fn fit(values: &[&str], high_risk: &[bool], regularization: f64) -> Self {
        let mut counts: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
        for (&v, &bad) in values.iter().zip(high_risk) {
            let entry = counts.entry(v).or_insert((0.0, 0.0));
            if bad {
                entry.0 += 1.0;
            } else {
                entry.1 += 1.0;
            }
        }

        let total_bad: f64 = counts.values().map(|c| c.0).sum();
        let total_good: f64 = counts.values().map(|c| c.1).sum();
        let r = regularization;

        let mut mapping = BTreeMap::new();
        let mut information_value = 0.0;
        for (value, (bad, good)) in counts {
            let dist_bad = (bad + r) / (total_bad + 2.0 * r);
            let dist_good = (good + r) / (total_good + 2.0 * r);
            let woe = (dist_bad / dist_good).ln();
            let woe = if woe.is_finite() { woe } else { 0.0 };
            information_value += (dist_bad - dist_good) * woe;
            mapping.insert(value.to_string(), woe);
        }

        Self { mapping, information_value }
    }

    pub fn encode(&self, value: &str) -> f64 {
        self.mapping.get(value).copied().unwrap_or(0.0)
    }
}

/// Conventional reading of an IV value, used in training logs.
pub fn iv_strength(iv: f64) -> &'static str {
    if iv < 0.02 {
        "useless"
    } else if iv < 0.1 {
        "weak"
    } else if iv < 0.3 {
        "medium"
    } else if iv < 0.5 {
        "strong"
    } else {
        "suspicious"
    }
}
