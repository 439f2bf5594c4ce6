use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::config::WOE_REGULARIZATION;
use crate::error::{AppError, Result};
use crate::features::{FeatureKind, FeatureSchema};
use crate::model::scaler::column_stats;
use crate::model::woe::WoeTable;
use crate::types::{FeatureRecord, FeatureValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transform", rename_all = "snake_case")]
pub enum ColumnTransform {
    Standardize { mean: f64, scale: f64 },
    WeightOfEvidence(WoeTable),
}

/// Fitted per-column transform, one entry per schema feature, same order.
/// Parameters are frozen at training time; `transform` never refits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub columns: Vec<ColumnTransform>,
}

impl Preprocessor {
    pub fn fit(schema: &FeatureSchema, rows: &[FeatureRecord], high_risk: &[bool]) -> Result<Self> {
        if rows.is_empty() {
            return Err(AppError::Training("cannot fit preprocessing on zero rows".to_string()));
        }
        for row in rows {
            schema.check(row)?;
        }

        let n = rows.len() as f64;
        let mut columns = Vec::with_capacity(schema.len());
        for (pos, spec) in schema.features.iter().enumerate() {
            let transform = match spec.kind {
                FeatureKind::Numeric => {
                    let values: Array1<f64> = rows
                        .iter()
                        .map(|r| numeric_at(r, pos))
                        .collect::<Result<Array1<f64>>>()?;
                    let (mean, scale) = column_stats(values.view(), n);
                    ColumnTransform::Standardize { mean, scale }
                }
                FeatureKind::Categorical => {
                    let values: Vec<&str> = rows
                        .iter()
                        .map(|r| categorical_at(r, pos))
                        .collect::<Result<Vec<&str>>>()?;
                    ColumnTransform::WeightOfEvidence(WoeTable::fit(
                        &values,
                        high_risk,
                        WOE_REGULARIZATION,
                    ))
                }
            };
            columns.push(transform);
        }
        Ok(Self { columns })
    }

    /// Schema-checked transform of one record into model space.
    pub fn transform(&self, schema: &FeatureSchema, record: &FeatureRecord) -> Result<Vec<f64>> {
        schema.check(record)?;
        if self.columns.len() != schema.len() {
            return Err(AppError::SchemaMismatch(format!(
                "preprocessor has {} columns, schema has {}",
                self.columns.len(),
                schema.len()
            )));
        }

        self.columns
            .iter()
            .enumerate()
            .map(|(pos, column)| match column {
                ColumnTransform::Standardize { mean, scale } => {
                    let v = numeric_at(record, pos)?;
                    if !v.is_finite() {
                        return Err(AppError::InvalidFeature(format!(
                            "{} must be finite, got {v}",
                            record.features[pos].name
                        )));
                    }
                    Ok((v - mean) / scale)
                }
                ColumnTransform::WeightOfEvidence(table) => {
                    Ok(table.encode(categorical_at(record, pos)?))
                }
            })
            .collect()
    }

    /// `(feature name, IV)` for every WoE column.
    pub fn information_values<'a>(&'a self, schema: &'a FeatureSchema) -> Vec<(&'a str, f64)> {
        schema
            .features
            .iter()
            .zip(&self.columns)
            .filter_map(|(spec, column)| match column {
                ColumnTransform::WeightOfEvidence(t) => Some((spec.name.as_str(), t.information_value)),
                ColumnTransform::Standardize { .. } => None,
            })
            .collect()
    }
}

fn numeric_at(record: &FeatureRecord, pos: usize) -> Result<f64> {
    match record.features.get(pos).map(|f| &f.value) {
        Some(FeatureValue::Numeric(v)) => Ok(*v),
        _ => Err(AppError::SchemaMismatch(format!("position {pos} is not numeric"))),
    }
}

fn categorical_at(record: &FeatureRecord, pos: usize) -> Result<&str> {
    match record.features.get(pos).map(|f| &f.value) {
        Some(FeatureValue::Categorical(v)) => Ok(v.as_str()),
        _ => Err(AppError::SchemaMismatch(format!("position {pos} is not categorical"))),
    }
}
