pub mod credit_scorer;
pub mod explain;

pub use credit_scorer::CreditScorer;
