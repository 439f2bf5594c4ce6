//! Deterministic fixtures shared by unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::types::{CustomerFeatureVector, TransactionRecord, TransactionType};

/// 100 customers in three well-separated RFM groups:
/// 10 `DORMANT` (bottom decile on every axis), 45 `REGULAR`, 45 `LOYAL`.
pub fn synthetic_customers() -> Vec<CustomerFeatureVector> {
    let mut out = Vec::with_capacity(100);
    for i in 0..10 {
        out.push(customer(
            &format!("DORMANT-{i:02}"),
            250.0 + (i * 9) as f64,
            1.0 + (i % 3) as f64,
            60.0 + (i * 20) as f64,
            ["utility_bill", "airtime"][i % 2],
            "ChannelId_1",
        ));
    }
    for i in 0..45 {
        out.push(customer(
            &format!("REGULAR-{i:02}"),
            5.0 + (i % 25) as f64,
            10.0 + (i % 11) as f64,
            2_000.0 + (i * 66) as f64,
            ["airtime", "financial_services", "data_bundles"][i % 3],
            ["ChannelId_2", "ChannelId_3"][i % 2],
        ));
    }
    for i in 0..45 {
        out.push(customer(
            &format!("LOYAL-{i:02}"),
            (i % 5) as f64,
            50.0 + (i % 31) as f64,
            20_000.0 + (i * 440) as f64,
            ["financial_services", "airtime"][i % 2],
            "ChannelId_3",
        ));
    }
    out
}

fn customer(
    id: &str,
    recency: f64,
    frequency: f64,
    monetary: f64,
    category: &str,
    channel: &str,
) -> CustomerFeatureVector {
    CustomerFeatureVector {
        customer_id: id.to_string(),
        recency,
        frequency,
        monetary,
        avg_transaction_value: monetary / frequency,
        transaction_variability: monetary / frequency * 0.1,
        product_category: category.to_string(),
        channel_id: channel.to_string(),
        pricing_strategy: if frequency > 20.0 { "2" } else { "4" }.to_string(),
    }
}

pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap()
}

/// Raw transactions that aggregate (as of `as_of()`) into profiles shaped like
/// `synthetic_customers`.
pub fn synthetic_transactions() -> Vec<TransactionRecord> {
    let mut out = Vec::new();
    for c in synthetic_customers() {
        let n = c.frequency as usize;
        let per_tx = c.monetary / n as f64;
        for t in 0..n {
            out.push(TransactionRecord {
                transaction_id: format!("{}-T{t}", c.customer_id),
                customer_id: c.customer_id.clone(),
                timestamp: as_of() - Duration::days(c.recency as i64 + t as i64 * 2),
                amount: per_tx,
                transaction_type: TransactionType::Debit,
                product_category: c.product_category.clone(),
                channel_id: c.channel_id.clone(),
                pricing_strategy: c.pricing_strategy.clone(),
            });
        }
    }
    out
}
