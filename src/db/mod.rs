pub mod models;
pub mod registry;

pub use models::TrainingRunRow;
pub use registry::RunRegistry;
