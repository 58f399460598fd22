//! promptcast 库入口
//!
//! Gemini 文本生成代理服务器：多 API Key 轮询、失败重试、
//! 整轮耗尽冷却与邮件告警。

pub mod backends;
pub mod config;
pub mod credential;
pub mod error;
pub mod notify;
pub mod rotation;
pub mod server;
pub mod telephony;
