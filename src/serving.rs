//! Обслуживание предсказаний и HTTP API

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{Map, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::error::{PipelineError, Result};
use crate::models::{ModelArtifact, ModelRegistry};
use crate::preprocessing::Sanitizer;
use crate::storage::BlobStore;
use crate::training::TrainingPipeline;
use crate::types::{
    Dataset, ErrorResponse, ModelInfo, PredictRequest, PredictResponse, RetrainRequest,
    RetrainResponse,
};

/// Куда сохранять новые артефакты после переобучения
pub struct ArtifactSink {
    pub store: Arc<dyn BlobStore>,
    pub blob_name: String,
}

/// Запрос -> санитизация -> стандартизация -> предсказание.
/// Разделяемое состояние только читается, кроме атомарной замены в `retrain`.
pub struct ServingEndpoint {
    registry: Arc<ModelRegistry>,
    pipeline: TrainingPipeline,
    sink: Option<ArtifactSink>,
    /// Сохранение и публикация идут в одном порядке для всех переобучений
    publish_lock: Mutex<()>,
}

impl ServingEndpoint {
    pub fn new(registry: Arc<ModelRegistry>, pipeline: TrainingPipeline) -> Self {
        Self {
            registry,
            pipeline,
            sink: None,
            publish_lock: Mutex::new(()),
        }
    }

    pub fn with_sink(mut self, sink: ArtifactSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn predict(&self, features: &Map<String, Value>) -> Result<f64> {
        let clean = Sanitizer::sanitize(&Dataset::from_feature_map(features))?;
        if clean.nrows() == 0 {
            return Err(PipelineError::validation("Input contains missing values"));
        }

        // Один снимок на весь запрос: scaler и модель из одного обучения
        let artifact = self.registry.snapshot();
        let predictions = artifact.predict(&clean.into_features())?;

        let prediction = predictions
            .first()
            .copied()
            .ok_or_else(|| PipelineError::validation("Model returned no prediction"))?;
        if !prediction.is_finite() {
            return Err(PipelineError::validation("Prediction is not a finite number"));
        }
        Ok(prediction)
    }

    pub fn describe_model(&self) -> ModelInfo {
        self.registry.snapshot().describe()
    }

    /// Обучение в стороне, сохранение, затем публикация пары целиком.
    /// При ошибке текущая пара не меняется.
    pub fn retrain(&self, data: &Dataset) -> Result<Arc<ModelArtifact>> {
        let artifact = Arc::new(self.pipeline.run(data)?);

        let _guard = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = &self.sink {
            artifact.save(sink.store.as_ref(), &sink.blob_name)?;
        }
        self.registry.publish(Arc::clone(&artifact));
        Ok(artifact)
    }
}

#[derive(Clone)]
struct AppState {
    endpoint: Arc<ServingEndpoint>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

pub fn router(endpoint: Arc<ServingEndpoint>) -> Router {
    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/model-info", get(model_info))
        .route("/retrain", post(retrain))
        .layer(cors)
        .with_state(AppState { endpoint })
}

async fn root() -> Json<Value> {
    Json(serde_json::json!({
        "message": "Linear regression API (Rust)",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::debug!("Predict request: {} features", request.features.len());

    match state.endpoint.predict(&request.features) {
        Ok(prediction) => Ok(Json(PredictResponse { prediction })),
        Err(e) => {
            tracing::warn!(error = %e, "Prediction request rejected");
            Err(e.into())
        }
    }
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.endpoint.describe_model())
}

async fn retrain(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RetrainRequest>, JsonRejection>,
) -> std::result::Result<Json<RetrainResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!("Retrain request: {} rows", request.rows.len());

    let endpoint = Arc::clone(&state.endpoint);
    let outcome = tokio::task::spawn_blocking(move || {
        endpoint.retrain(&Dataset::from_records(&request.rows))
    })
    .await
    .map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: format!("Training task failed: {e}"),
    })?;

    match outcome {
        Ok(artifact) => Ok(Json(RetrainResponse {
            metrics: *artifact.metrics(),
            trained_at: artifact.trained_at(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Retraining failed, keeping current model");
            Err(e.into())
        }
    }
}
