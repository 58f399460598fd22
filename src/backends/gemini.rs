//! Gemini 后端实现
//!
//! 调用 Google generativelanguage 的 generateContent 接口，
//! API Key 以查询参数传递，prompt 包装进 Provider 要求的信封格式。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::{BackendError, BackendResult, GenerationBackend};
use crate::credential::Credential;

/// 默认 Gemini 生成端点
pub const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// generateContent 请求信封
#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        }
    }
}

/// Gemini 结构化错误响应
#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

/// Gemini 后端
pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl GeminiBackend {
    /// 创建 Gemini 后端
    ///
    /// `timeout` 是单次远端调用的限定等待上限，同时设置在
    /// reqwest 客户端与外层的 `tokio::time::timeout` 上。
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: GEMINI_ENDPOINT.to_string(),
            timeout,
        })
    }

    /// 自定义端点（测试用）
    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// 从错误响应体提取 Provider 消息
    ///
    /// 结构化 `{"error":{"message":…}}` 优先，解析失败时原样返回响应体。
    fn extract_error_message(body: &str) -> String {
        serde_json::from_str::<GeminiErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string())
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, prompt: &str, credential: &Credential) -> BackendResult<Value> {
        let url = format!("{}?key={}", self.endpoint, credential.as_str());
        let body = GenerateContentRequest::from_prompt(prompt);

        // 限定等待：超时后丢弃 in-flight 请求，由轮询引擎决定是否换 Key
        let send = self.client.post(&url).json(&body).send();
        let response = match tokio::time::timeout(self.timeout, send).await {
            Err(_) => {
                return Err(BackendError::timeout(format!(
                    "{}ms 内未返回",
                    self.timeout.as_millis()
                )))
            }
            Ok(Err(e)) if e.is_timeout() => return Err(BackendError::timeout(e.to_string())),
            Ok(Err(e)) => return Err(BackendError::network(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = Self::extract_error_message(&body_text);
            return Err(BackendError::api(status.as_u16(), message));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::network(format!("响应解析失败: {}", e)))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_shape() {
        let request = GenerateContentRequest::from_prompt("你好，Gemini");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({ "contents": [ { "parts": [ { "text": "你好，Gemini" } ] } ] })
        );
    }

    #[test]
    fn test_extract_structured_error_message() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            GeminiBackend::extract_error_message(body),
            "Resource has been exhausted"
        );
    }

    #[test]
    fn test_extract_error_message_falls_back_to_raw_body() {
        let body = "upstream gateway error";
        assert_eq!(GeminiBackend::extract_error_message(body), body);
    }

    #[test]
    fn test_endpoint_override() {
        let backend = GeminiBackend::new(Duration::from_secs(1))
            .unwrap()
            .with_endpoint("http://127.0.0.1:1/v1/generate");
        assert_eq!(backend.endpoint, "http://127.0.0.1:1/v1/generate");
    }
}
