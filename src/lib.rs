//! linreg-serve - подготовка данных, линейная регрессия и HTTP-сервис предсказаний

pub mod config;
pub mod error;
pub mod models;
pub mod preprocessing;
pub mod serving;
pub mod storage;
pub mod training;
pub mod types;

pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use models::{LinearEstimator, Model, ModelArtifact, ModelRegistry};
pub use preprocessing::{FittedScaler, Sanitizer};
pub use serving::{router, ArtifactSink, ServingEndpoint};
pub use storage::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use training::{sample_dataset, TrainingPipeline};
pub use types::*;
