//! Retell 外呼 webhook 处理器
//!
//! 独立的薄适配层端点，与轮询引擎没有任何共享状态。

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::server::AppState;
use crate::telephony::{is_valid_e164, CreateCallRequest};

/// POST /webhook/retell-call —— 由 n8n webhook 触发一次电话外呼
pub async fn retell_call(
    State(state): State<AppState>,
    Json(request): Json<CreateCallRequest>,
) -> impl IntoResponse {
    let Some(adapter) = state.telephony.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": "Retell 适配器未配置" })),
        );
    };

    tracing::info!("[RETELL] 收到 webhook 外呼请求");

    let Some(phone_number) = request.phone_number() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Missing required field: phone_number or to_number"
            })),
        );
    };

    if !is_valid_e164(phone_number) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Invalid phone number format. Use E.164 format (e.g., +19373293653)"
            })),
        );
    }

    match adapter
        .create_call(
            phone_number,
            request.agent_id.as_deref(),
            request.metadata.clone(),
        )
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)),
        Err(err) => {
            tracing::error!("[RETELL] 外呼创建失败: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::backends::{BackendResult, GenerationBackend};
    use crate::credential::{Credential, CredentialPool};
    use crate::rotation::{RotationEngine, RotationPolicy};

    struct IdleBackend;

    #[async_trait]
    impl GenerationBackend for IdleBackend {
        async fn generate(&self, _prompt: &str, _credential: &Credential) -> BackendResult<Value> {
            unreachable!("webhook 端点不应触发生成后端")
        }

        fn name(&self) -> &str {
            "idle"
        }
    }

    fn state_without_adapter() -> AppState {
        let pool = CredentialPool::parse("key-a").unwrap();
        let engine = Arc::new(RotationEngine::new(
            pool,
            Arc::new(IdleBackend),
            RotationPolicy::default(),
            None,
        ));
        AppState {
            engine,
            telephony: None,
        }
    }

    fn request(phone: Option<&str>) -> CreateCallRequest {
        CreateCallRequest {
            phone_number: phone.map(str::to_string),
            to_number: None,
            agent_id: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_adapter_returns_503() {
        let response = retell_call(
            State(state_without_adapter()),
            Json(request(Some("+19373293653"))),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_missing_phone_number_returns_400() {
        let mut state = state_without_adapter();
        state.telephony = Some(Arc::new(crate::telephony::TelephonyAdapter::new(
            crate::config::RetellConfig {
                api_key: "key_test".to_string(),
                from_number: "+12137531237".to_string(),
                default_agent_id: "agent_default".to_string(),
            },
        )));

        let response = retell_call(State(state), Json(request(None)))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_phone_number_returns_400() {
        let mut state = state_without_adapter();
        state.telephony = Some(Arc::new(crate::telephony::TelephonyAdapter::new(
            crate::config::RetellConfig {
                api_key: "key_test".to_string(),
                from_number: "+12137531237".to_string(),
                default_agent_id: "agent_default".to_string(),
            },
        )));

        let response = retell_call(State(state), Json(request(Some("not-a-number"))))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
