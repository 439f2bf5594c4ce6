use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{DataQualityError, Result};
use crate::types::{TransactionRecord, TransactionType};

/// Row shape of the raw transaction export. Every column is optional here so a
/// single bad cell rejects one row instead of the whole file.
#[derive(Debug, Deserialize)]
struct RawTransaction {
    #[serde(rename = "TransactionId")]
    transaction_id: Option<String>,
    #[serde(rename = "CustomerId")]
    customer_id: Option<String>,
    #[serde(rename = "Amount")]
    amount: Option<String>,
    #[serde(rename = "TransactionStartTime")]
    transaction_start_time: Option<String>,
    #[serde(rename = "TransactionType", default)]
    transaction_type: Option<String>,
    #[serde(rename = "ProductCategory", default)]
    product_category: Option<String>,
    #[serde(rename = "ChannelId", default)]
    channel_id: Option<String>,
    #[serde(rename = "PricingStrategy", default)]
    pricing_strategy: Option<String>,
}

#[derive(Debug, Default)]
pub struct IngestStats {
    pub rows_read: usize,
    pub accepted: usize,
    pub rejected_malformed: usize,
    pub rejected_customer_id: usize,
    pub rejected_timestamp: usize,
    pub rejected_amount: usize,
    pub rejected_type: usize,
}

impl IngestStats {
    pub fn rejected(&self) -> usize {
        self.rejected_malformed
            + self.rejected_customer_id
            + self.rejected_timestamp
            + self.rejected_amount
            + self.rejected_type
    }

    fn count(&mut self, err: &DataQualityError) {
        match err {
            DataQualityError::MissingCustomerId => self.rejected_customer_id += 1,
            DataQualityError::InvalidTimestamp(_) => self.rejected_timestamp += 1,
            DataQualityError::InvalidAmount(_) | DataQualityError::NonFiniteAmount => {
                self.rejected_amount += 1
            }
            DataQualityError::UnknownTransactionType(_) => self.rejected_type += 1,
            DataQualityError::MissingField("Amount") => self.rejected_amount += 1,
            DataQualityError::MissingField("TransactionStartTime") => self.rejected_timestamp += 1,
            DataQualityError::MissingField(_) | DataQualityError::AfterAsOf => {
                self.rejected_malformed += 1
            }
        }
    }
}

/// Read a transactions CSV from disk. Unreadable files and headers are fatal;
/// bad rows are skipped and counted.
pub fn read_transactions(path: impl AsRef<Path>) -> Result<(Vec<TransactionRecord>, IngestStats)> {
    let path = path.as_ref();
    info!("[INGEST] reading transactions from {}", path.display());
    let file = std::fs::File::open(path)?;
    read_transactions_from(file)
}

pub fn read_transactions_from<R: Read>(reader: R) -> Result<(Vec<TransactionRecord>, IngestStats)> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.headers()?;

    let mut records = Vec::new();
    let mut stats = IngestStats::default();

    for (idx, row) in rdr.deserialize::<RawTransaction>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        stats.rows_read += 1;

        let raw = match row {
            Ok(r) => r,
            Err(e) => {
                stats.rejected_malformed += 1;
                warn!(line, error = %e, "[INGEST] skipping malformed row");
                continue;
            }
        };

        match validate(raw, line) {
            Ok(record) => {
                stats.accepted += 1;
                records.push(record);
            }
            Err(e) => {
                stats.count(&e);
                warn!(line, error = %e, "[INGEST] skipping row");
            }
        }
    }

    info!(
        rows = stats.rows_read,
        accepted = stats.accepted,
        rejected = stats.rejected(),
        "[INGEST] done: {} of {} rows accepted",
        stats.accepted,
        stats.rows_read,
    );
    Ok((records, stats))
}

fn validate(raw: RawTransaction, line: usize) -> std::result::Result<TransactionRecord, DataQualityError> {
    let customer_id = non_empty(raw.customer_id).ok_or(DataQualityError::MissingCustomerId)?;

    let ts_raw = non_empty(raw.transaction_start_time)
        .ok_or(DataQualityError::MissingField("TransactionStartTime"))?;
    let timestamp = parse_timestamp(&ts_raw)?;

    let amount_raw = non_empty(raw.amount).ok_or(DataQualityError::MissingField("Amount"))?;
    let amount = amount_raw
        .parse::<f64>()
        .map_err(|_| DataQualityError::InvalidAmount(amount_raw.clone()))?;
    if !amount.is_finite() {
        return Err(DataQualityError::NonFiniteAmount);
    }

    let transaction_type = match non_empty(raw.transaction_type) {
        Some(t) => TransactionType::parse(&t).ok_or(DataQualityError::UnknownTransactionType(t))?,
        None => TransactionType::from_amount(amount),
    };

    Ok(TransactionRecord {
        transaction_id: non_empty(raw.transaction_id).unwrap_or_else(|| format!("line-{line}")),
        customer_id,
        timestamp,
        amount,
        transaction_type,
        product_category: non_empty(raw.product_category).unwrap_or_else(|| "Unknown".to_string()),
        channel_id: non_empty(raw.channel_id).unwrap_or_else(|| "Unknown".to_string()),
        pricing_strategy: non_empty(raw.pricing_strategy).unwrap_or_else(|| "Unknown".to_string()),
    })
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` (read as UTC)
/// and bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, DataQualityError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(DataQualityError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "TransactionId,CustomerId,Amount,Value,TransactionStartTime,ProductCategory,ChannelId,PricingStrategy\n";

    #[test]
    fn parses_supported_timestamp_formats() {
        let a = parse_timestamp("2025-02-01T00:00:00Z").unwrap();
        let b = parse_timestamp("2025-02-01 00:00:00").unwrap();
        let c = parse_timestamp("2025-02-01").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn reads_valid_rows_and_derives_type() {
        let csv = format!(
            "{HEADER}T1,C1,100.0,100,2025-02-01T00:00:00Z,airtime,ChannelId_3,2\n\
             T2,C1,-50.0,50,2025-02-01T01:00:00Z,financial_services,ChannelId_2,2\n"
        );
        let (records, stats) = read_transactions_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(stats.accepted, 2);
        assert_eq!(records[0].transaction_type, TransactionType::Debit);
        assert_eq!(records[1].transaction_type, TransactionType::Credit);
        assert_eq!(records[1].product_category, "financial_services");
    }

    #[test]
    fn skips_bad_rows_without_aborting() {
        let csv = format!(
            "{HEADER}T1,C1,100.0,100,2025-02-01T00:00:00Z,airtime,ChannelId_3,2\n\
             T2,,10.0,10,2025-02-01T00:00:00Z,airtime,ChannelId_3,2\n\
             T3,C2,abc,10,2025-02-01T00:00:00Z,airtime,ChannelId_3,2\n\
             T4,C2,10.0,10,not-a-date,airtime,ChannelId_3,2\n\
             T5,C3,NaN,10,2025-02-01T00:00:00Z,airtime,ChannelId_3,2\n\
             T6,C3,20.0,20,2025-02-02,,,\n"
        );
        let (records, stats) = read_transactions_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(stats.rows_read, 6);
        assert_eq!(stats.rejected_customer_id, 1);
        assert_eq!(stats.rejected_amount, 2);
        assert_eq!(stats.rejected_timestamp, 1);
        assert_eq!(records[1].product_category, "Unknown");
    }

    #[test]
    fn explicit_transaction_type_is_validated() {
        let csv = "CustomerId,Amount,TransactionStartTime,TransactionType\n\
                   C1,10,2025-01-01,refund\n\
                   C1,10,2025-01-01,CREDIT\n";
        let (records, stats) = read_transactions_from(csv.as_bytes()).unwrap();
        assert_eq!(stats.rejected_type, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction_type, TransactionType::Credit);
    }
}
