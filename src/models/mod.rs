/// ML модели

pub mod artifact;
pub mod linear;
pub mod registry;

pub use artifact::ModelArtifact;
pub use linear::{LinearEstimator, Model, TrainedModel};
pub use registry::ModelRegistry;
