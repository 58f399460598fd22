//! 后端调用层 Trait 定义
//!
//! 定义文本生成后端的核心接口。
//! 后端层只负责一次远端 HTTP 调用，不包含任何轮询或重试逻辑。

use async_trait::async_trait;
use serde_json::Value;

use crate::credential::Credential;

/// 可重试的 HTTP 状态码（限流与服务端/网关错误）
pub const RETRYABLE_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504];

/// 后端调用结果
pub type BackendResult<T> = Result<T, BackendError>;

/// 后端错误类型
#[derive(Debug, Clone)]
pub struct BackendError {
    /// 错误类型
    pub kind: BackendErrorKind,
    /// 错误消息
    pub message: String,
    /// HTTP 状态码（如果有结构化响应）
    pub status_code: Option<u16>,
}

/// 后端错误类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// 限定等待超时，in-flight 调用已被中止
    Timeout,
    /// Provider 返回了结构化错误响应
    Api,
    /// 传输层失败，没有结构化响应
    Network,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "Timeout"),
            Self::Api => write!(f, "Api"),
            Self::Network => write!(f, "Network"),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = self.status_code {
            write!(f, "{} ({}): {}", self.kind, code, self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    /// 创建超时错误
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Timeout,
            message: message.into(),
            status_code: None,
        }
    }

    /// 创建 Provider 结构化错误
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Api,
            message: message.into(),
            status_code: Some(status),
        }
    }

    /// 创建传输层错误
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Network,
            message: message.into(),
            status_code: None,
        }
    }

    /// 是否可通过切换 Key 重试
    ///
    /// 超时一律可重试，不按状态码分类；结构化错误按状态码判定；
    /// 纯网络错误视为致命，立即向调用方透传。
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            BackendErrorKind::Timeout => true,
            BackendErrorKind::Api => self
                .status_code
                .map(|code| RETRYABLE_STATUS_CODES.contains(&code))
                .unwrap_or(false),
            BackendErrorKind::Network => false,
        }
    }
}

/// 文本生成后端 Trait
///
/// 远端生成接口的不透明抽象，轮询引擎只依赖这一层。
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// 使用指定凭证调用一次远端生成接口
    ///
    /// # 返回
    ///
    /// Provider 的原始响应 JSON，不做任何改写。
    async fn generate(&self, prompt: &str, credential: &Credential) -> BackendResult<Value>;

    /// 后端名称（用于日志）
    fn name(&self) -> &str;
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::network("connection refused");
        assert_eq!(format!("{}", err), "Network: connection refused");

        let err = BackendError::api(500, "internal error");
        assert_eq!(format!("{}", err), "Api (500): internal error");
    }

    #[test]
    fn test_retryable_status_codes() {
        for code in [429u16, 500, 502, 503, 504] {
            assert!(BackendError::api(code, "").is_retryable(), "状态码 {}", code);
        }
        for code in [400u16, 401, 403, 404, 501] {
            assert!(!BackendError::api(code, "").is_retryable(), "状态码 {}", code);
        }
    }

    #[test]
    fn test_timeout_always_retryable() {
        assert!(BackendError::timeout("deadline elapsed").is_retryable());
    }

    #[test]
    fn test_network_error_is_fatal() {
        assert!(!BackendError::network("dns failure").is_retryable());
    }
}
