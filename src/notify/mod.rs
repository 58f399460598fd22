//! 邮件告警模块
//!
//! 受监控的 Key 触发限流时向运维人员发送告警邮件。
//! 发送是 fire-and-forget：派发后不等待结果，失败只记录日志，
//! 绝不影响主流程，也不保证与主响应之间的先后顺序。

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

/// 告警发送错误
///
/// 只在本模块内部与日志中出现，永远不向调用方传播。
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("邮件地址无效: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("邮件构建失败: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP 发送失败: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// 告警通道 Trait
///
/// 测试时注入记录用的假实现，生产环境使用 [`AlertMailer`]。
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// 针对指定序号（1-based）的 Key 发送一次限流告警
    async fn send_alert(&self, ordinal: usize) -> Result<(), NotifyError>;
}

/// SMTP 邮件告警通道
pub struct AlertMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl AlertMailer {
    /// 依据 SMTP 配置创建告警通道（STARTTLS + 用户名密码认证）
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(SmtpCredentials::new(
                config.user.clone(),
                config.pass.clone(),
            ))
            .build();

        let from: Mailbox = format!("Gemini Server Alerts <{}>", config.user).parse()?;
        let to: Mailbox = config.notify_email.parse()?;

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl AlertSink for AlertMailer {
    async fn send_alert(&self, ordinal: usize) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format!("🚨 Gemini API Key #{} 触发限流", ordinal))
            .body(format!(
                "Gemini API Key #{} 已触发限流，服务器已切换到下一个 Key。\n\
                 除非多个 Key 连续失败，否则无需处理。\n\n\
                 时间: {}",
                ordinal,
                chrono::Utc::now().to_rfc3339()
            ))?;

        self.transport.send(message).await?;
        tracing::info!("[ALERT] Key #{} 的告警邮件已发送", ordinal);
        Ok(())
    }
}

/// 异步派发一次告警
///
/// 结果只记录日志，调用方既不等待也感知不到失败。
pub fn spawn_alert(sink: Arc<dyn AlertSink>, ordinal: usize) {
    tokio::spawn(async move {
        if let Err(e) = sink.send_alert(ordinal).await {
            tracing::error!("[ALERT] Key #{} 告警发送失败: {}", ordinal, e);
        }
    });
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingSink {
        alerts: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send_alert(&self, ordinal: usize) -> Result<(), NotifyError> {
            self.alerts.lock().push(ordinal);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn send_alert(&self, _ordinal: usize) -> Result<(), NotifyError> {
            let err = "not-an-email".parse::<Mailbox>().unwrap_err();
            Err(NotifyError::Address(err))
        }
    }

    #[tokio::test]
    async fn test_spawn_alert_is_detached() {
        let sink = Arc::new(RecordingSink {
            alerts: Mutex::new(Vec::new()),
        });
        spawn_alert(sink.clone(), 5);

        // 让出执行权，给派发出去的任务运行机会
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*sink.alerts.lock(), vec![5]);
    }

    #[tokio::test]
    async fn test_spawn_alert_swallows_failure() {
        // 发送失败不会 panic，也没有任何结果浮出
        spawn_alert(Arc::new(FailingSink), 8);
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}
