//! promptcast 服务入口
//!
//! 启动流程：初始化日志 → 加载配置 → 解析凭证池 → 构建轮询引擎
//! 与可选的告警/外呼通道 → 启动 HTTP 服务。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use promptcast::backends::GeminiBackend;
use promptcast::config::AppConfig;
use promptcast::credential::CredentialPool;
use promptcast::notify::{AlertMailer, AlertSink};
use promptcast::rotation::{RotationEngine, RotationPolicy};
use promptcast::server::{build_router, AppState};
use promptcast::telephony::TelephonyAdapter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promptcast=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env().context("配置加载失败")?;

    let pool = CredentialPool::parse(&config.raw_api_keys).context("API Key 列表解析失败")?;
    tracing::info!("✅ 已加载 {} 个 Gemini API Key", pool.len());

    let backend =
        GeminiBackend::new(config.request_timeout).context("Gemini HTTP 客户端构建失败")?;

    let alert_sink: Option<Arc<dyn AlertSink>> = match &config.smtp {
        Some(smtp) => {
            let mailer = AlertMailer::new(smtp).context("SMTP 告警通道初始化失败")?;
            Some(Arc::new(mailer))
        }
        None => {
            tracing::warn!("SMTP 未配置，邮件告警已禁用");
            None
        }
    };

    let policy = RotationPolicy {
        exhaustion: config.exhaustion_policy,
        cycle_cooldown: config.cycle_cooldown,
        watch_ordinals: config.watch_ordinals.clone(),
        ..RotationPolicy::default()
    };
    let engine = Arc::new(RotationEngine::new(
        pool,
        Arc::new(backend),
        policy,
        alert_sink,
    ));

    let telephony = config
        .retell
        .clone()
        .map(|retell| Arc::new(TelephonyAdapter::new(retell)));
    if telephony.is_none() {
        tracing::info!("Retell 未配置，webhook 外呼已禁用");
    }

    let app = build_router(AppState { engine, telephony });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Gemini Prompt Server 监听 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("端口绑定失败")?;
    axum::serve(listener, app)
        .await
        .context("HTTP 服务异常退出")?;

    Ok(())
}
