//! 轮询引擎模块
//!
//! 持有共享游标与重试/冷却/告警策略，
//! 向请求边界暴露单一的 dispatch 操作。

mod engine;

pub use engine::{RotationEngine, RotationPolicy};
