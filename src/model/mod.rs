pub mod artifact;
pub mod logistic;
pub mod metrics;
pub mod preprocess;
pub mod scaler;
pub mod trainer;
pub mod woe;

pub use artifact::{SavedArtifact, TrainedModelArtifact};
pub use trainer::{ModelTrainer, TrainerConfig};
