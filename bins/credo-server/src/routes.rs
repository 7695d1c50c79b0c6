//! Axum router and HTTP handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use credo_core::error::{FeatureError, ModelError};
use credo_core::traits::CreditScorer;
use credo_core::types::{FeatureVector, LendingPosition, ScoreResult, TransactionDocument};
use credo_features::{WalletAnalysis, WalletAnalyzer};
use credo_scoring::RuleBasedScorer;
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, warn};

use crate::AppState;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<FeatureError> for ApiError {
    fn from(e: FeatureError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        let status = match e {
            ModelError::NotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %e, "scoring failed");
        }
        Self { status, message: e.to_string() }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/predict-credit-score", post(predict_credit_score))
        .route("/analyze-wallet", post(analyze_wallet))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Model-backed score, or the rule-based one if the server is configured to
/// fall back while no model is loaded.
fn score(state: &AppState, features: &FeatureVector) -> Result<ScoreResult, ApiError> {
    match state.model.score(features) {
        Err(ModelError::NotLoaded) if state.config.fallback_when_unloaded => {
            debug!("no model loaded, using rule-based scorer");
            Ok(RuleBasedScorer.score(features)?)
        }
        other => Ok(other?),
    }
}

/// `POST /predict-credit-score`: score a nine-field feature payload.
async fn predict_credit_score(State(state): State<AppState>, body: Bytes) -> ApiResult<ScoreResult> {
    let features: FeatureVector = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "rejecting feature payload");
        ApiError::bad_request(format!("invalid feature payload: {e}"))
    })?;
    features.validate()?;
    Ok(Json(score(&state, &features)?))
}

#[derive(Serialize)]
struct AnalyzeResponse {
    address: Option<String>,
    analysis: WalletAnalysis,
    features: FeatureVector,
    score: ScoreResult,
}

/// Split an analyze body into the transaction document and the optional
/// `lending` object riding alongside it.
fn parse_analyze_body(body: &[u8]) -> Result<(TransactionDocument, LendingPosition), ApiError> {
    let mut value: Value = serde_json::from_slice(body)
        .map_err(|e| FeatureError::MalformedDocument(e.to_string()))?;

    let lending = match value.as_object_mut().and_then(|o| o.remove("lending")) {
        Some(Value::Null) | None => LendingPosition::default(),
        Some(raw) => serde_json::from_value(raw)
            .map_err(|e| ApiError::bad_request(format!("invalid lending position: {e}")))?,
    };
    let document: TransactionDocument =
        serde_json::from_value(value).map_err(|e| FeatureError::MalformedDocument(e.to_string()))?;
    Ok((document, lending))
}

/// `POST /analyze-wallet`: extract wallet features from a transaction
/// history and score them.
async fn analyze_wallet(State(state): State<AppState>, body: Bytes) -> ApiResult<AnalyzeResponse> {
    let (document, lending) = parse_analyze_body(&body)?;
    let analysis = WalletAnalyzer::new(&document.transactions).analyze(Utc::now());
    let features = analysis.features(&lending);
    features.validate()?;
    let score = state.model.score_or_fallback(&features)?;

    Ok(Json(AnalyzeResponse { address: document.address, analysis, features, score }))
}

/// `GET /health`: liveness plus what model, if any, is loaded.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let current = state.model.current();
    let summary = current.as_ref().map(|m| m.summary);
    Json(json!({
        "status": "healthy",
        "model_loaded": summary.is_some(),
        "model_type": summary.map(|s| format!("credo_bundle_v{}", s.format_version)),
        "has_predict": summary.is_some(),
        "clusters": summary.map(|s| s.clusters),
        "trees": summary.map(|s| s.trees),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use credo_core::constants::FEATURE_COUNT;
    use credo_model::{Dataset, Trainer};
    use credo_scoring::ModelHandle;
    use tower::ServiceExt;

    use crate::config::ServerConfig;

    fn trained_handle() -> ModelHandle {
        let rows = (0..60)
            .map(|i| {
                let mut r = [(i % 3) as f64 * 4.0; FEATURE_COUNT];
                r[i % FEATURE_COUNT] += 0.05 * i as f64;
                r
            })
            .collect();
        let outcome = Trainer::default().fit(&Dataset { rows, dropped: 0 }).unwrap();
        ModelHandle::with_bundle(&outcome.bundle).unwrap()
    }

    fn app(model: ModelHandle, fallback: bool) -> Router {
        let config = ServerConfig { fallback_when_unloaded: fallback, ..ServerConfig::default() };
        router(AppState { model: Arc::new(model), config: Arc::new(config) })
    }

    async fn call(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    #[tokio::test]
    async fn health_without_model() {
        let (status, body) = call(app(ModelHandle::empty(), false), "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], false);
        assert_eq!(body["has_predict"], false);
        assert!(body["model_type"].is_null());
    }

    #[tokio::test]
    async fn health_with_model() {
        let (_, body) = call(app(trained_handle(), false), "GET", "/health", "").await;
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["model_type"], "credo_bundle_v1");
        assert_eq!(body["clusters"], 3);
        assert_eq!(body["trees"], 100);
    }

    #[tokio::test]
    async fn predict_without_model_is_unavailable() {
        let (status, body) = call(app(ModelHandle::empty(), false), "POST", "/predict-credit-score", "{}").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "model artifacts not loaded");
    }

    #[tokio::test]
    async fn predict_falls_back_when_configured() {
        let (status, body) = call(
            app(ModelHandle::empty(), true),
            "POST",
            "/predict-credit-score",
            r#"{"account_age_days": 365, "total_transactions": 87}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scorer"], "rule_based");
        // 500 + 36.5 + 8.7 = 545.2
        assert_eq!(body["credit_score"], 545);
        assert!(body.get("cluster").is_none());
        assert!(body.get("is_anomaly").is_none());
    }

    #[tokio::test]
    async fn predict_with_model_returns_full_result() {
        let (status, body) = call(
            app(trained_handle(), false),
            "POST",
            "/predict-credit-score",
            r#"{"repayment_ratio": 1.0, "liquidation_ratio": null, "total_collateral": 8}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scorer"], "model");
        let score = body["credit_score"].as_u64().unwrap();
        assert!((300..=850).contains(&score));
        assert!(body["cluster"].as_u64().unwrap() < 3);
        assert!(body["is_anomaly"].is_boolean());
        assert_eq!(body["features_used"]["liquidation_ratio"], 0.0);
        assert_eq!(body["features_used"]["total_collateral"], 8.0);
        assert_eq!(body["features_used"]["unique_tokens"], 0.0);
    }

    #[tokio::test]
    async fn predict_rejects_non_numeric_fields() {
        let (status, body) = call(
            app(trained_handle(), false),
            "POST",
            "/predict-credit-score",
            r#"{"account_age_days": "old"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid feature payload"));
    }

    #[tokio::test]
    async fn predict_rejects_malformed_json() {
        let (status, _) = call(app(trained_handle(), false), "POST", "/predict-credit-score", "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_wallet_uses_fallback_without_model() {
        let body = r#"{
            "address": "0xabc",
            "transactions": [
                {"to": "0x1", "value": "1000", "timeStamp": "1700000000"},
                {"to": "0xdai", "value": "0", "timeStamp": "1700086400", "functionName": "transfer(address,uint256)"},
                {"to": "0x2", "value": "5", "timeStamp": "garbage"}
            ],
            "lending": {"total_collateral_eth": 30.0, "total_debt_eth": 10.0}
        }"#;
        let (status, json) = call(app(ModelHandle::empty(), false), "POST", "/analyze-wallet", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["address"], "0xabc");
        assert_eq!(json["analysis"]["activity_frequency"]["total_transactions"], 2);
        assert_eq!(json["analysis"]["diagnostics"]["malformed_timestamp"], 1);
        assert_eq!(json["features"]["liquidation_ratio"], 3.0);
        assert_eq!(json["features"]["total_collateral"], 30.0);
        assert_eq!(json["score"]["scorer"], "rule_based");
    }

    #[tokio::test]
    async fn analyze_wallet_tolerates_non_text_recipient_and_method() {
        let body = r#"{
            "transactions": [
                {"to": 42, "value": "1000", "timeStamp": "1700000000", "functionName": "transfer(address,uint256)"},
                {"to": "0x1", "value": "1", "timeStamp": "1700086400", "functionName": {"name": "transfer"}}
            ]
        }"#;
        let (status, json) = call(app(ModelHandle::empty(), false), "POST", "/analyze-wallet", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["analysis"]["activity_frequency"]["total_transactions"], 2);
        assert_eq!(json["analysis"]["diagnostics"]["malformed_recipient"], 1);
        assert_eq!(json["analysis"]["diagnostics"]["malformed_method"], 1);
        assert_eq!(json["score"]["scorer"], "rule_based");
    }

    #[tokio::test]
    async fn analyze_wallet_accepts_bare_array() {
        let body = r#"[{"to": "0x1", "value": 1, "timeStamp": 1700000000}]"#;
        let (status, json) = call(app(trained_handle(), false), "POST", "/analyze-wallet", body).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["address"].is_null());
        assert_eq!(json["score"]["scorer"], "model");
    }

    #[tokio::test]
    async fn analyze_wallet_rejects_bad_lending() {
        let body = r#"{"transactions": [], "lending": {"total_debt_eth": "lots"}}"#;
        let (status, json) = call(app(ModelHandle::empty(), false), "POST", "/analyze-wallet", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("lending"));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, _) = call(app(ModelHandle::empty(), false), "GET", "/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
