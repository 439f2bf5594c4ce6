pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod labeling;
pub mod model;
pub mod pipeline;
pub mod scorer;
pub mod types;

#[cfg(test)]
mod test_support;
