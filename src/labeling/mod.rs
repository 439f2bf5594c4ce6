pub mod kmeans;
pub mod proxy;

pub use proxy::{ClusterProfile, LabelingSummary, ProxyLabeler, ProxyLabeling};
