//! HTTP 服务模块
//!
//! 基于 axum 暴露对外端点：文本生成、存活探测与 Retell 外呼 webhook。

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::rotation::RotationEngine;
use crate::telephony::TelephonyAdapter;

/// 请求体大小上限（1 MiB）
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 轮询引擎（进程内单实例）
    pub engine: Arc<RotationEngine>,
    /// Retell 外呼适配器（未配置时为 None，与引擎没有共享状态）
    pub telephony: Option<Arc<TelephonyAdapter>>,
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/generate", post(handlers::generate))
        .route("/webhook/retell-call", post(handlers::retell_call))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
