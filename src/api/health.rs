//! Shared health state for the `/` endpoint.
//! Updated by the prediction handlers, read by the health handler.

use std::sync::atomic::{AtomicU64, Ordering};

/// Serving counters. Handlers update, API reads.
#[derive(Default)]
pub struct HealthState {
    /// Predictions returned successfully.
    pub predictions_served: AtomicU64,
    /// Requests rejected before scoring (schema mismatch, invalid feature).
    pub predictions_rejected: AtomicU64,
    /// Nanosecond timestamp of the last successful prediction (0 = none).
    pub last_prediction_at_ns: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_prediction(&self, at_ns: u64) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
        self.last_prediction_at_ns.store(at_ns, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.predictions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn predictions_served(&self) -> u64 {
        self.predictions_served.load(Ordering::Relaxed)
    }

    pub fn predictions_rejected(&self) -> u64 {
        self.predictions_rejected.load(Ordering::Relaxed)
    }

    pub fn last_prediction_at_ns(&self) -> u64 {
        self.last_prediction_at_ns.load(Ordering::Relaxed)
    }
}
