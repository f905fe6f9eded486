//! HTTP处理器
//!
//! 薄包装：请求体校验、调用协调器 `submit`、错误到状态码的
//! 映射。核心逻辑不依赖任何HTTP语义。

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use hps_core::HpsError;
use hps_pipeline::PredictionCoordinator;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Web层共享状态
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<PredictionCoordinator>,
}

/// 预测请求体
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub user_id: i64,
    pub symptom_codes: Vec<String>,
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "HPS Prediction API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "predict": "/api/v1/predict"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

/// 预测提交处理器
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> impl IntoResponse {
    info!(
        "Predict request for user {} with {} symptom codes",
        request.user_id,
        request.symptom_codes.len()
    );

    if request.symptom_codes.is_empty() {
        return error_response(&HpsError::Validation(
            "symptom_codes must not be empty".to_string(),
        ));
    }

    match state
        .coordinator
        .submit(request.user_id, &request.symptom_codes)
        .await
    {
        Ok(outcome) => {
            let mut body = match serde_json::to_value(&outcome.prediction) {
                Ok(Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            body.insert("medical_record_id".to_string(), json!(outcome.record_id));
            (StatusCode::OK, Json(Value::Object(body)))
        }
        Err(e) => {
            warn!("Predict request failed: {}", e);
            error_response(&e)
        }
    }
}

/// 错误到HTTP响应的统一映射
fn error_response(err: &HpsError) -> (StatusCode, Json<Value>) {
    let status = match err {
        HpsError::UserNotFound(_) => StatusCode::NOT_FOUND,
        HpsError::InvalidSymptomCode(_) | HpsError::Validation(_) => StatusCode::BAD_REQUEST,
        HpsError::PredictionUnavailable(_)
        | HpsError::ArtifactNotFound(_)
        | HpsError::EmptyArtifact
        | HpsError::DimensionMismatch { .. } => StatusCode::SERVICE_UNAVAILABLE,
        HpsError::StorageTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = json!({
        "error_code": status.as_u16(),
        "error_kind": err.kind(),
        "error_message": err.to_string(),
    });

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let (status, _) = error_response(&HpsError::UserNotFound(7));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, Json(body)) =
            error_response(&HpsError::InvalidSymptomCode(vec!["bogus".into()]));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_kind"], "invalid_symptom_code");
        assert!(body["error_message"].as_str().unwrap().contains("bogus"));

        let (status, _) = error_response(&HpsError::StorageTimeout("10s".into()));
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let (status, _) = error_response(&HpsError::PredictionUnavailable("no model".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = error_response(&HpsError::Database("boom".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
