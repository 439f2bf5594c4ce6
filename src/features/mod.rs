pub mod builder;
pub mod schema;

pub use builder::{FeatureBuild, FeatureBuilder};
pub use schema::{FeatureKind, FeatureSchema, FeatureSpec};
