//! 轮询引擎实现
//!
//! 每次分发从共享游标指向的 Key 开始逐个尝试：可重试失败推进游标并
//! 换下一个 Key；整轮耗尽后按策略冷却或直接失败；成功时把游标钉在
//! 成功的 Key 上，让下一个独立请求从这里开始。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::backends::GenerationBackend;
use crate::config::{ExhaustionPolicy, DEFAULT_COOLDOWN_MS, DEFAULT_WATCH_ORDINALS};
use crate::credential::CredentialPool;
use crate::error::DispatchError;
use crate::notify::{self, AlertSink};

/// 轮询策略参数
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// 整轮耗尽策略
    pub exhaustion: ExhaustionPolicy,
    /// 整轮耗尽后的冷却时间
    pub cycle_cooldown: Duration,
    /// 单次请求允许的冷却次数上限，超出后终止并返回"已耗尽"
    pub max_cooldowns: u32,
    /// 触发告警的 Key 序号（1-based）
    pub watch_ordinals: HashSet<usize>,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            exhaustion: ExhaustionPolicy::Cooldown,
            cycle_cooldown: Duration::from_millis(DEFAULT_COOLDOWN_MS),
            max_cooldowns: 1,
            watch_ordinals: DEFAULT_WATCH_ORDINALS.iter().copied().collect(),
        }
    }
}

/// 共享轮询状态
///
/// 游标与已告警集合放在同一把锁内；临界区只做内存读写，
/// 绝不跨越 await 持锁。
#[derive(Debug, Default)]
struct RotationState {
    /// 下一个独立请求的起始槽位（最近一次成功的 Key 所在槽位）
    cursor: usize,
    /// 本进程内已触发过告警的 Key 序号（1-based），只增不减
    alerted: HashSet<usize>,
}

/// 轮询引擎
///
/// 进程内单实例、显式注入到请求边界，测试可以各自实例化而互不干扰。
pub struct RotationEngine {
    pool: CredentialPool,
    backend: Arc<dyn GenerationBackend>,
    policy: RotationPolicy,
    alert_sink: Option<Arc<dyn AlertSink>>,
    state: Mutex<RotationState>,
}

impl RotationEngine {
    /// 创建轮询引擎
    ///
    /// `alert_sink` 为 None 时告警只落日志。
    pub fn new(
        pool: CredentialPool,
        backend: Arc<dyn GenerationBackend>,
        policy: RotationPolicy,
        alert_sink: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        Self {
            pool,
            backend,
            policy,
            alert_sink,
            state: Mutex::new(RotationState::default()),
        }
    }

    /// 当前共享游标（诊断与测试用）
    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    /// 使用轮询策略执行一次生成请求
    ///
    /// 可重试失败（超时、429、5xx）在内部消化；不可重试的 Provider
    /// 错误与传输错误立即终止轮询并透传；整轮耗尽后按策略冷却重试，
    /// 冷却额度用尽时返回 [`DispatchError::PoolExhausted`]。
    ///
    /// 冷却只挂起当前请求自身的控制流，不阻塞其他并发请求。
    pub async fn dispatch(&self, prompt: &str) -> Result<Value, DispatchError> {
        let pool_len = self.pool.len();
        let mut slot = self.state.lock().cursor % pool_len;
        let mut tried_in_cycle = 0usize;
        let mut cooldowns_used = 0u32;

        loop {
            if tried_in_cycle >= pool_len {
                let fail_now = self.policy.exhaustion == ExhaustionPolicy::FailFast
                    || cooldowns_used >= self.policy.max_cooldowns;
                if fail_now {
                    tracing::error!(
                        "[ROTATION] 一轮内全部 {} 个 Key 均失败，终止请求",
                        pool_len
                    );
                    return Err(DispatchError::PoolExhausted);
                }

                tracing::warn!(
                    "[ROTATION] 全部 {} 个 Key 已耗尽，冷却 {}ms 后从头重试",
                    pool_len,
                    self.policy.cycle_cooldown.as_millis()
                );
                tokio::time::sleep(self.policy.cycle_cooldown).await;
                cooldowns_used += 1;
                tried_in_cycle = 0;
                slot = 0;
            }

            let credential = self.pool.get(slot);
            let ordinal = slot + 1;
            tracing::info!(
                "[ROTATION] 使用 Key #{} (本轮第 {}/{} 次尝试)",
                ordinal,
                tried_in_cycle + 1,
                pool_len
            );

            match self.backend.generate(prompt, credential).await {
                Ok(payload) => {
                    // 游标钉在成功的槽位，下一个独立请求从这里开始，
                    // 既分散负载，也避免反复冲击刚恢复的 Key
                    self.state.lock().cursor = slot;
                    tracing::info!("[ROTATION] Key #{} 调用成功", ordinal);
                    return Ok(payload);
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!("[ROTATION] Key #{} 失败（可重试）: {}", ordinal, err);
                    let next = (slot + 1) % pool_len;
                    self.state.lock().cursor = next;
                    self.maybe_alert(ordinal);
                    tried_in_cycle += 1;
                    slot = next;
                }
                Err(err) => {
                    tracing::error!("[ROTATION] Key #{} 发生不可重试错误: {}", ordinal, err);
                    return Err(err.into());
                }
            }
        }
    }

    /// 可重试失败时按需派发告警
    ///
    /// 每个受监控序号在进程生命周期内至多告警一次；
    /// 派发是 detached 的，主流程不等待结果。
    fn maybe_alert(&self, ordinal: usize) {
        if !self.policy.watch_ordinals.contains(&ordinal) {
            return;
        }

        let first_time = self.state.lock().alerted.insert(ordinal);
        if !first_time {
            return;
        }

        match &self.alert_sink {
            Some(sink) => {
                tracing::info!("[ROTATION] Key #{} 在监控名单内，派发告警", ordinal);
                notify::spawn_alert(Arc::clone(sink), ordinal);
            }
            None => {
                tracing::warn!("[ROTATION] Key #{} 在监控名单内，但告警通道未配置", ordinal);
            }
        }
    }
}
