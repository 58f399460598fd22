//! 错误类型定义
//!
//! 定义配置加载与请求分发过程中的错误分类。
//! 后端单次调用的错误见 [`crate::backends::BackendError`]。

use thiserror::Error;

use crate::backends::{BackendError, BackendErrorKind};

/// 配置错误
///
/// 启动阶段致命：任何配置错误都会阻止进程启动。
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 缺少必需的环境变量
    #[error("缺少必需的环境变量: {0}")]
    MissingVar(&'static str),

    /// 环境变量的值无法解析
    #[error("环境变量 {name} 的值无效: {message}")]
    InvalidVar {
        name: &'static str,
        message: String,
    },

    /// API Key 列表解析后为空
    #[error("API Key 列表为空")]
    EmptyCredentialPool,
}

/// 请求分发错误
///
/// 轮询引擎向请求边界暴露的终态错误。可重试失败在引擎内部消化，
/// 只有耗尽或致命错误才会以此类型浮出。
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// Provider 返回不可重试的错误，状态码与消息原样透传
    #[error("Gemini API error {status}: {message}")]
    Provider { status: u16, message: String },

    /// 传输层失败，没有结构化响应
    #[error("网络错误: {0}")]
    Transport(String),

    /// 所有 Key 在一轮内全部失败，且冷却重试额度已用尽
    #[error("所有 Gemini API Key 已耗尽")]
    PoolExhausted,
}

impl DispatchError {
    /// 获取对应的 HTTP 状态码
    ///
    /// 耗尽映射为 503（服务暂不可用），与一般服务端错误区分开。
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::Provider { .. } => 500,
            DispatchError::Transport(_) => 500,
            DispatchError::PoolExhausted => 503,
        }
    }
}

impl From<BackendError> for DispatchError {
    /// 不可重试的后端错误映射为分发错误
    ///
    /// 带状态码的结构化错误透传 Provider 状态与消息，其余视为传输错误。
    fn from(err: BackendError) -> Self {
        match (err.kind, err.status_code) {
            (BackendErrorKind::Api, Some(status)) => DispatchError::Provider {
                status,
                message: err.message,
            },
            _ => DispatchError::Transport(err.message),
        }
    }
}
