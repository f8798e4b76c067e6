/// API сервер линейной регрессии

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use linreg_serve::{
    config::AppConfig, router, sample_dataset, ArtifactSink, BlobStore, Dataset, FsBlobStore,
    ModelArtifact, ModelRegistry, PipelineError, ServingEndpoint, TrainingPipeline,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Инициализация логирования
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.storage.root));
    let pipeline = TrainingPipeline::from_config(&config.training);

    let artifact = initial_artifact(&config, store.as_ref(), &pipeline)?;
    let info = artifact.describe();
    tracing::info!(
        features = ?info.features,
        r2 = info.metrics.r2,
        mse = info.metrics.mse,
        "Serving model trained at {}",
        info.trained_at
    );

    let registry = Arc::new(ModelRegistry::new(artifact));
    let endpoint = ServingEndpoint::new(registry, pipeline).with_sink(ArtifactSink {
        store,
        blob_name: config.storage.model_blob.clone(),
    });
    let app = router(Arc::new(endpoint));

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Сохраненный артефакт, если есть; иначе обучение и сохранение
fn initial_artifact(
    config: &AppConfig,
    store: &dyn BlobStore,
    pipeline: &TrainingPipeline,
) -> anyhow::Result<ModelArtifact> {
    match ModelArtifact::load(store, &config.storage.model_blob) {
        Ok(artifact) => return Ok(artifact),
        Err(PipelineError::Storage(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(blob = %config.storage.model_blob, "No saved model, training a new one");
        }
        Err(e) => return Err(e).context("Failed to load saved model"),
    }

    let data = match &config.storage.training_blob {
        Some(name) => {
            let bytes = store
                .read_blob(name)
                .with_context(|| format!("Failed to read training data '{name}'"))?;
            Dataset::from_json_bytes(&bytes)?
        }
        None => sample_dataset(config.training.sample_rows, config.training.seed)?,
    };

    let artifact = pipeline.run(&data).context("Training failed")?;
    artifact.save(store, &config.storage.model_blob)?;
    Ok(artifact)
}
