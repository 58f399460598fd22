//! Retell 外呼适配器
//!
//! 独立于轮询引擎的薄适配层：接收 n8n webhook 请求并调用 Retell 的
//! create-phone-call 接口触发电话外呼。与凭证池、游标没有任何共享状态。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::RetellConfig;

/// Retell create-phone-call 端点
pub const RETELL_ENDPOINT: &str = "https://api.retellai.com/v2/create-phone-call";

/// E.164 号码格式（基础校验）
static E164_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[1-9]\d{1,14}$").expect("E.164 正则非法")
});

/// 校验号码是否符合 E.164 格式
pub fn is_valid_e164(number: &str) -> bool {
    E164_RE.is_match(number)
}

/// webhook 请求体
///
/// 号码字段 `phone_number` 与 `to_number` 二选一，前者优先。
#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub to_number: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl CreateCallRequest {
    /// 取号码字段（`phone_number` 优先）
    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number
            .as_deref()
            .or(self.to_number.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 适配器错误
#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("Retell API 请求失败: {0}")]
    Network(String),

    #[error("Retell API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Retell 外呼适配器
pub struct TelephonyAdapter {
    client: reqwest::Client,
    endpoint: String,
    config: RetellConfig,
}

impl TelephonyAdapter {
    pub fn new(config: RetellConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: RETELL_ENDPOINT.to_string(),
            config,
        }
    }

    /// 组装 Retell 请求体
    fn build_payload(&self, to_number: &str, agent_id: Option<&str>, metadata: Option<Value>) -> Value {
        json!({
            "from_number": self.config.from_number,
            "to_number": to_number,
            "override_agent_id": agent_id.unwrap_or(&self.config.default_agent_id),
            "metadata": metadata.unwrap_or_else(|| json!({})),
        })
    }

    /// 触发一次电话外呼
    ///
    /// 成功时返回包装过的调用结果（含 Retell 原始响应）。
    pub async fn create_call(
        &self,
        to_number: &str,
        agent_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<Value, TelephonyError> {
        let body = self.build_payload(to_number, agent_id, metadata);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TelephonyError::Network(e.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| TelephonyError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TelephonyError::Api {
                status: status.as_u16(),
                message: payload.to_string(),
            });
        }

        tracing::info!(
            "[RETELL] 外呼已创建: call_id={}",
            payload.get("call_id").and_then(serde_json::Value::as_str).unwrap_or("?")
        );

        Ok(json!({
            "success": true,
            "callId": payload.get("call_id").cloned().unwrap_or(Value::Null),
            "status": payload.get("call_status").cloned().unwrap_or(Value::Null),
            "agentId": payload.get("agent_id").cloned().unwrap_or(Value::Null),
            "data": payload,
        }))
    }
}
