//! HTTP inference service.
//!
//! Serves predictions from one artifact loaded at startup. Every answer to
//! `POST /predict` is HTTP 200; failures are reported in the `error` field.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::estimator::{Estimator, Features};

/// Errors that stop the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Shared request state.
#[derive(Clone)]
pub struct AppState {
    pub estimator: Arc<Estimator>,
}

/// Body of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictRequest {
    pub category: String,
    pub sub_category: String,
    #[serde(default)]
    pub product_name: Option<String>,
    /// Extra numeric inputs the dashboard client may send. The model does not
    /// use them; they are accepted so those requests still predict.
    #[serde(default)]
    pub feature1: Option<f64>,
    #[serde(default)]
    pub feature2: Option<f64>,
    #[serde(default)]
    pub feature3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction { prediction: f64 },
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub fn router(estimator: Arc<Estimator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .with_state(AppState { estimator })
        .layer(cors)
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Weight prediction API is running",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn predict(State(state): State<AppState>, body: Bytes) -> Json<PredictResponse> {
    Json(predict_payload(&state.estimator, &body))
}

/// Parse a raw request body and predict, folding every failure into the payload.
pub fn predict_payload(estimator: &Estimator, body: &[u8]) -> PredictResponse {
    let request: PredictRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => {
            debug!("Rejected predict request: {err}");
            return PredictResponse::Error {
                error: format!("invalid request: {err}"),
            };
        }
    };
    let features = Features::new(&request.category, &request.sub_category);
    match estimator.predict(&features) {
        Ok(prediction) => {
            debug!(
                product = request.product_name.as_deref().unwrap_or(""),
                prediction, "Predicted weight"
            );
            PredictResponse::Prediction { prediction }
        }
        Err(err) => PredictResponse::Error {
            error: err.to_string(),
        },
    }
}

/// Bind `bind_addr` and serve until the process is stopped.
pub async fn serve(estimator: Arc<Estimator>, bind_addr: &str) -> Result<(), ServiceError> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|source| ServiceError::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;
    info!("Inference service listening on {bind_addr}");
    axum::serve(listener, router(estimator))
        .await
        .map_err(ServiceError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::tests::sample_estimator;

    fn state() -> State<AppState> {
        State(AppState {
            estimator: Arc::new(sample_estimator()),
        })
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let Json(body) = root().await;
        assert_eq!(body.service, "heft");
        assert!(!body.message.is_empty());
    }

    #[tokio::test]
    async fn predicts_known_category() {
        let body = Bytes::from_static(
            br#"{"category":"Boxes","sub_category":"large","product_name":"Crate"}"#,
        );
        let Json(response) = predict(state(), body).await;
        match response {
            PredictResponse::Prediction { prediction } => {
                assert!((prediction - 12.0).abs() < 0.5, "prediction={prediction}")
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn product_name_is_optional() {
        let body = Bytes::from_static(br#"{"category":"boxes","sub_category":"small"}"#);
        let Json(response) = predict(state(), body).await;
        assert!(matches!(response, PredictResponse::Prediction { .. }));
    }

    #[tokio::test]
    async fn dashboard_feature_fields_are_accepted() {
        let body = Bytes::from_static(
            br#"{"category":"boxes","sub_category":"large","feature1":1.5,"feature2":null}"#,
        );
        let Json(response) = predict(state(), body).await;
        assert!(
            matches!(response, PredictResponse::Prediction { .. }),
            "got {response:?}"
        );

        let body =
            Bytes::from_static(br#"{"category":"boxes","sub_category":"large","feature4":1}"#);
        let Json(response) = predict(state(), body).await;
        assert!(matches!(response, PredictResponse::Error { .. }));
    }

    #[tokio::test]
    async fn malformed_requests_yield_error_payloads() {
        for body in [
            &b"not json"[..],
            br#"{"category":"boxes"}"#,
            br#"{"category":"boxes","sub_category":"small","colour":"red"}"#,
            br#"{"category":"boxes","sub_category":"  "}"#,
        ] {
            let Json(response) = predict(state(), Bytes::copy_from_slice(body)).await;
            assert!(
                matches!(response, PredictResponse::Error { .. }),
                "body {:?} gave {response:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn responses_serialize_flat() {
        let ok = serde_json::to_value(PredictResponse::Prediction { prediction: 1.5 }).unwrap();
        assert_eq!(ok, serde_json::json!({ "prediction": 1.5 }));
        let err = serde_json::to_value(PredictResponse::Error {
            error: "bad".into(),
        })
        .unwrap();
        assert_eq!(err, serde_json::json!({ "error": "bad" }));
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let err = serve(Arc::new(sample_estimator()), "not-an-address")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Bind { .. }));
    }
}
