//! 文本生成端点处理器

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::server::AppState;

/// POST /generate 请求体
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// GET / —— 存活探测
pub async fn index() -> &'static str {
    "✅ Gemini Prompt Server is running. Use POST /generate to interact."
}

/// POST /generate —— 经由轮询引擎调用 Gemini
///
/// 成功时原样返回 Provider 的响应载荷；耗尽映射为 503，
/// 其余致命错误映射为 500 并携带错误消息。
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> impl IntoResponse {
    // 缺少 prompt 直接拒绝：不触发远端调用，也不改动游标
    let prompt = match request.prompt.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing \"prompt\" in request body" })),
            );
        }
    };

    tracing::info!("[GENERATE] 收到 prompt（{} 字符）", prompt.chars().count());

    match state.engine.dispatch(&prompt).await {
        Ok(payload) => (StatusCode::OK, Json(json!({ "response": payload }))),
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(error_body(&err)))
        }
    }
}

/// 分发错误对应的响应体
///
/// 耗尽使用独立的"服务暂不可用"文案，与一般服务端错误区分。
fn error_body(err: &DispatchError) -> Value {
    match err {
        DispatchError::PoolExhausted => {
            json!({ "error": "All Gemini API keys exhausted or unavailable" })
        }
        other => json!({ "error": other.to_string() }),
    }
}
