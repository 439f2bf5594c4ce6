use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Column-wise z-scoring with population standard deviation.
/// Zero-variance columns keep scale 1 so they map to 0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(data: ArrayView2<f64>) -> Self {
        let n = data.nrows().max(1) as f64;
        let mut mean = Vec::with_capacity(data.ncols());
        let mut scale = Vec::with_capacity(data.ncols());
        for col in data.axis_iter(Axis(1)) {
            let (m, s) = column_stats(col, n);
            mean.push(m);
            scale.push(s);
        }
        Self { mean, scale }
    }

    pub fn transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.scale[j];
            }
        }
        out
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| (v - self.mean[j]) / self.scale[j])
            .collect()
    }
}

/// `(mean, population std)` of one column, std floored to 1 when degenerate.
pub fn column_stats(col: ArrayView1<f64>, n: f64) -> (f64, f64) {
    let mean = col.sum() / n;
    let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    let scale = if std.is_finite() && std > f64::EPSILON { std } else { 1.0 };
    (mean, scale)
}
