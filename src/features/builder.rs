use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::DataQualityError;
use crate::types::{CustomerFeatureVector, TransactionRecord};

#[derive(Debug, Default)]
pub struct BuildStats {
    pub records_seen: usize,
    pub records_used: usize,
    pub rejected_customer_id: usize,
    pub rejected_amount: usize,
    pub rejected_after_as_of: usize,
}

#[derive(Debug)]
pub struct FeatureBuild {
    /// One vector per customer with at least one valid record, sorted by id.
    pub vectors: Vec<CustomerFeatureVector>,
    pub as_of: Option<DateTime<Utc>>,
    pub stats: BuildStats,
}

/// Aggregates transaction records into per-customer RFM profiles.
///
/// Monetary is gross volume (Σ|amount|) so refunds and credits add to activity
/// rather than cancel it. Customers with no valid record are left out.
pub struct FeatureBuilder {
    as_of: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Accumulator<'a> {
    count: usize,
    last_seen: Option<DateTime<Utc>>,
    abs_amounts: Vec<f64>,
    product_category: BTreeMap<&'a str, usize>,
    channel_id: BTreeMap<&'a str, usize>,
    pricing_strategy: BTreeMap<&'a str, usize>,
}

impl FeatureBuilder {
    /// `as_of = None` measures recency from the latest valid transaction in the batch.
    pub fn new(as_of: Option<DateTime<Utc>>) -> Self {
        Self { as_of }
    }

    pub fn build(&self, records: &[TransactionRecord]) -> FeatureBuild {
        let mut stats = BuildStats { records_seen: records.len(), ..Default::default() };

        let as_of = self.as_of.or_else(|| {
            records
                .iter()
                .filter(|r| r.amount.is_finite() && !r.customer_id.trim().is_empty())
                .map(|r| r.timestamp)
                .max()
        });

        let Some(as_of) = as_of else {
            warn!("[FEATURES] no usable records; nothing to aggregate");
            return FeatureBuild { vectors: Vec::new(), as_of: None, stats };
        };

        let mut per_customer: BTreeMap<&str, Accumulator> = BTreeMap::new();

        for record in records {
            if let Err(e) = check_record(record, as_of) {
                match e {
                    DataQualityError::MissingCustomerId => stats.rejected_customer_id += 1,
                    DataQualityError::AfterAsOf => stats.rejected_after_as_of += 1,
                    _ => stats.rejected_amount += 1,
                }
                warn!(
                    transaction_id = %record.transaction_id,
                    error = %e,
                    "[FEATURES] skipping record"
                );
                continue;
            }
            stats.records_used += 1;

            let acc = per_customer.entry(record.customer_id.as_str()).or_default();
            acc.count += 1;
            acc.last_seen = Some(acc.last_seen.map_or(record.timestamp, |t| t.max(record.timestamp)));
            acc.abs_amounts.push(record.amount.abs());
            *acc.product_category.entry(record.product_category.as_str()).or_default() += 1;
            *acc.channel_id.entry(record.channel_id.as_str()).or_default() += 1;
            *acc.pricing_strategy.entry(record.pricing_strategy.as_str()).or_default() += 1;
        }

        let vectors: Vec<CustomerFeatureVector> = per_customer
            .into_iter()
            .filter_map(|(customer_id, acc)| {
                let last_seen = acc.last_seen?;
                Some(finish(customer_id, &acc, last_seen, as_of))
            })
            .collect();

        info!(
            customers = vectors.len(),
            records_used = stats.records_used,
            records_seen = stats.records_seen,
            as_of = %as_of,
            "[FEATURES] built {} customer profiles",
            vectors.len(),
        );

        FeatureBuild { vectors, as_of: Some(as_of), stats }
    }
}

fn check_record(record: &TransactionRecord, as_of: DateTime<Utc>) -> Result<(), DataQualityError> {
    if record.customer_id.trim().is_empty() {
        return Err(DataQualityError::MissingCustomerId);
    }
    if !record.amount.is_finite() {
        return Err(DataQualityError::NonFiniteAmount);
    }
    if record.timestamp > as_of {
        return Err(DataQualityError::AfterAsOf);
    }
    Ok(())
}

fn finish(
    customer_id: &str,
    acc: &Accumulator<'_>,
    last_seen: DateTime<Utc>,
    as_of: DateTime<Utc>,
) -> CustomerFeatureVector {
    let frequency = acc.count as f64;
    let monetary: f64 = acc.abs_amounts.iter().sum();
    let mean = monetary / frequency;
    let variability = if acc.count > 1 {
        let ss: f64 = acc.abs_amounts.iter().map(|a| (a - mean).powi(2)).sum();
        (ss / (frequency - 1.0)).sqrt()
    } else {
        0.0
    };
    let recency = (as_of - last_seen).num_days().max(0) as f64;

    debug!(customer_id, recency, frequency, monetary, "[FEATURES] profile");

    CustomerFeatureVector {
        customer_id: customer_id.to_string(),
        recency,
        frequency,
        monetary,
        avg_transaction_value: mean,
        transaction_variability: variability,
        product_category: mode(&acc.product_category),
        channel_id: mode(&acc.channel_id),
        pricing_strategy: mode(&acc.pricing_strategy),
    }
}

/// Most frequent value; ties resolve to the lexicographically smallest.
fn mode(counts: &BTreeMap<&str, usize>) -> String {
    let mut best: Option<(&str, usize)> = None;
    for (&value, &count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string()).unwrap_or_else(|| "Unknown".to_string())
}
