use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use linreg_serve::{
    router, sample_dataset, ArtifactSink, BlobStore, MemoryBlobStore, ModelArtifact,
    ModelRegistry, ServingEndpoint, TrainingPipeline,
};

fn trained_endpoint() -> Arc<ServingEndpoint> {
    let artifact = TrainingPipeline::default()
        .run(&sample_dataset(100, 42).unwrap())
        .unwrap();
    Arc::new(ServingEndpoint::new(
        Arc::new(ModelRegistry::new(artifact)),
        TrainingPipeline::default(),
    ))
}

async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn predict_returns_single_float() {
    let app = router(trained_endpoint());
    let (status, body) = call(
        app,
        "POST",
        "/predict",
        Some(json!({"features": {"feature1": 0.25, "feature2": 0.5, "feature3": 0.75}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["prediction"].as_f64().unwrap().is_finite());
}

#[tokio::test]
async fn unknown_feature_is_client_error() {
    let app = router(trained_endpoint());
    let (status, body) = call(
        app,
        "POST",
        "/predict",
        Some(json!({"features": {
            "feature1": 0.2,
            "feature2": 0.4,
            "feature3": 0.6,
            "feature4": 0.8
        }})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("feature4"));
}

#[tokio::test]
async fn missing_value_is_client_error() {
    let app = router(trained_endpoint());
    let (status, body) = call(
        app,
        "POST",
        "/predict",
        Some(json!({"features": {"feature1": null, "feature2": 0.4, "feature3": 0.6}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn malformed_body_is_client_error() {
    let app = router(trained_endpoint());
    let (status, body) = call(app, "POST", "/predict", Some(json!({"values": [1, 2]}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn model_info_describes_serving_pair() {
    let endpoint = trained_endpoint();
    let snapshot = endpoint.registry().snapshot();
    let (status, body) = call(router(endpoint), "GET", "/model-info", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_type"], "Linear Regression");
    assert_eq!(body["features"], json!(["feature1", "feature2", "feature3"]));

    let coefficients: Vec<f64> =
        serde_json::from_value(body["model_parameters"]["coefficients"].clone()).unwrap();
    assert_eq!(coefficients, snapshot.model().coefficients());
    assert_eq!(
        body["model_parameters"]["intercept"].as_f64().unwrap(),
        snapshot.model().intercept()
    );
}

#[tokio::test]
async fn retrain_swaps_model_and_persists() {
    let store = Arc::new(MemoryBlobStore::new());
    let artifact = TrainingPipeline::default()
        .run(&sample_dataset(100, 42).unwrap())
        .unwrap();
    let registry = Arc::new(ModelRegistry::new(artifact));
    let endpoint = ServingEndpoint::new(registry.clone(), TrainingPipeline::default()).with_sink(
        ArtifactSink {
            store: store.clone(),
            blob_name: "model.json".into(),
        },
    );
    let app = router(Arc::new(endpoint));

    let rows: Vec<Value> = (0..50)
        .map(|i| {
            let x = i as f64 / 50.0;
            json!({"a": x, "b": (x * 7.0) % 1.0, "target": 3.0 * x + 1.0})
        })
        .collect();
    let (status, body) = call(app.clone(), "POST", "/retrain", Some(json!({ "rows": rows }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["metrics"]["r2"].as_f64().unwrap() > 0.99);

    let current = registry.snapshot();
    assert_eq!(current.scaler().features(), ["a", "b"]);
    let saved = ModelArtifact::from_bytes(&store.read_blob("model.json").unwrap()).unwrap();
    assert_eq!(saved, *current);

    // Старые признаки больше не принимаются
    let (status, _) = call(
        app.clone(),
        "POST",
        "/predict",
        Some(json!({"features": {"feature1": 0.2, "feature2": 0.4, "feature3": 0.6}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = json!({"features": {"a": 0.5, "b": 0.5}});
    let (status, body) = call(app, "POST", "/predict", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["prediction"].as_f64().unwrap() - 2.5).abs() < 1e-6);
}

#[tokio::test]
async fn retrain_on_empty_rows_keeps_model() {
    let endpoint = trained_endpoint();
    let before = endpoint.registry().snapshot();
    let (status, body) = call(
        router(endpoint.clone()),
        "POST",
        "/retrain",
        Some(json!({"rows": []})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("insufficient"));
    assert!(Arc::ptr_eq(&before, &endpoint.registry().snapshot()));
}

#[tokio::test]
async fn health_and_root() {
    let (status, body) = call(router(trained_endpoint()), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(router(trained_endpoint()), "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
}
