use serde::{Deserialize, Serialize};

/// Hold-out evaluation. Reporting only; nothing gates on these numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub n_samples: usize,
    pub n_positive: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// None when the evaluated set holds a single class.
    pub roc_auc: Option<f64>,
}

impl ClassificationReport {
    pub fn evaluate(y_true: &[bool], scores: &[f64], threshold: f64) -> Self {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut tn = 0usize;
        let mut fn_ = 0usize;
        for (&actual, &score) in y_true.iter().zip(scores) {
            match (actual, score >= threshold) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }

        let n = y_true.len();
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            n_samples: n,
            n_positive: tp + fn_,
            accuracy: ratio(tp + tn, n),
            precision,
            recall,
            f1,
            roc_auc: roc_auc(y_true, scores),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Area under the ROC curve via the rank-sum (Mann-Whitney U) statistic,
/// with tied scores sharing their average rank.
pub fn roc_auc(y_true: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&y| y).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of positions i..=j
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks.iter().zip(y_true).filter(|(_, y)| **y).map(|(r, _)| r).sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_ranking_has_auc_one() {
        let y = [false, false, true, true];
        let s = [0.1, 0.2, 0.8, 0.9];
        assert_eq!(roc_auc(&y, &s), Some(1.0));
    }

    #[test]
    fn ties_count_half() {
        let y = [false, true];
        let s = [0.5, 0.5];
        assert_eq!(roc_auc(&y, &s), Some(0.5));
    }

    #[test]
    fn single_class_has_no_auc() {
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.9]), None);
    }

    #[test]
    fn confusion_metrics() {
        let y = [true, true, false, false];
        let s = [0.9, 0.4, 0.6, 0.1];
        let r = ClassificationReport::evaluate(&y, &s, 0.5);
        assert_eq!(r.n_samples, 4);
        assert_eq!(r.n_positive, 2);
        assert_eq!(r.accuracy, 0.5);
        assert_eq!(r.precision, 0.5);
        assert_eq!(r.recall, 0.5);
        assert_eq!(r.f1, 0.5);
        assert_eq!(r.roc_auc, Some(0.75));
    }
}
