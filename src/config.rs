//! 配置加载模块
//!
//! 从环境变量读取启动配置。缺少必需项或值无法解析时返回
//! [`ConfigError`]，进程不应继续启动。

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 3000;
/// 默认单次远端调用的限定等待（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 50_000;
/// 默认整轮耗尽后的冷却时间（毫秒）
pub const DEFAULT_COOLDOWN_MS: u64 = 3_000;
/// 默认触发告警的 Key 序号（1-based）
pub const DEFAULT_WATCH_ORDINALS: &[usize] = &[5, 8, 10];

/// 整轮耗尽策略
///
/// 两种策略互斥，按配置二选一，绝不混用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// 冷却后从头重试（默认：容忍 Provider 级别的瞬时限流，
    /// 不让用户请求直接失败）
    Cooldown,
    /// 立即返回"已耗尽"错误
    FailFast,
}

impl ExhaustionPolicy {
    /// 解析配置值
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cooldown" => Ok(Self::Cooldown),
            "fail-fast" | "failfast" => Ok(Self::FailFast),
            other => Err(format!("未知的耗尽策略: {}", other)),
        }
    }
}

/// SMTP 告警配置
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    /// 告警收件人地址
    pub notify_email: String,
}

/// Retell 外呼适配器配置
#[derive(Debug, Clone)]
pub struct RetellConfig {
    pub api_key: String,
    pub from_number: String,
    pub default_agent_id: String,
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 逗号分隔的 Gemini API Key 原始值
    pub raw_api_keys: String,
    pub port: u16,
    /// 单次远端调用的限定等待
    pub request_timeout: Duration,
    /// 整轮耗尽后的冷却时间
    pub cycle_cooldown: Duration,
    pub exhaustion_policy: ExhaustionPolicy,
    /// 触发告警的 Key 序号（1-based）
    pub watch_ordinals: HashSet<usize>,
    /// SMTP 告警配置（整组缺省时禁用邮件告警）
    pub smtp: Option<SmtpConfig>,
    /// Retell 配置（缺省时禁用 webhook 外呼）
    pub retell: Option<RetellConfig>,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_api_keys = required_var("GOOGLE_GEMINI_API_KEYS")?;

        let port = parse_optional("PORT", DEFAULT_PORT)?;
        let timeout_ms: u64 = parse_optional("GEMINI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let cooldown_ms: u64 = parse_optional("CYCLE_COOLDOWN_MS", DEFAULT_COOLDOWN_MS)?;

        let exhaustion_policy = match optional_var("EXHAUSTION_POLICY") {
            Some(raw) => {
                ExhaustionPolicy::parse(&raw).map_err(|message| ConfigError::InvalidVar {
                    name: "EXHAUSTION_POLICY",
                    message,
                })?
            }
            None => ExhaustionPolicy::Cooldown,
        };

        let watch_ordinals = match optional_var("ALERT_WATCH_KEYS") {
            Some(raw) => {
                parse_watch_ordinals(&raw).map_err(|message| ConfigError::InvalidVar {
                    name: "ALERT_WATCH_KEYS",
                    message,
                })?
            }
            None => DEFAULT_WATCH_ORDINALS.iter().copied().collect(),
        };

        // SMTP 配置整组读取：全部缺省时禁用告警，部分缺失视为配置错误
        let smtp_present = ["SMTP_HOST", "SMTP_PORT", "SMTP_USER", "SMTP_PASS", "NOTIFY_EMAIL"]
            .iter()
            .any(|name| optional_var(name).is_some());
        let smtp = if smtp_present {
            let smtp_port: u16 = required_var("SMTP_PORT")?.trim().parse().map_err(
                |e: std::num::ParseIntError| ConfigError::InvalidVar {
                    name: "SMTP_PORT",
                    message: e.to_string(),
                },
            )?;
            Some(SmtpConfig {
                host: required_var("SMTP_HOST")?,
                port: smtp_port,
                user: required_var("SMTP_USER")?,
                pass: required_var("SMTP_PASS")?,
                notify_email: required_var("NOTIFY_EMAIL")?,
            })
        } else {
            None
        };

        // Retell 同理：整组缺省时禁用外呼适配器
        let retell_present = ["RETELL_API_KEY", "RETELL_FROM_NUMBER", "RETELL_AGENT_ID"]
            .iter()
            .any(|name| optional_var(name).is_some());
        let retell = if retell_present {
            Some(RetellConfig {
                api_key: required_var("RETELL_API_KEY")?,
                from_number: required_var("RETELL_FROM_NUMBER")?,
                default_agent_id: required_var("RETELL_AGENT_ID")?,
            })
        } else {
            None
        };

        Ok(Self {
            raw_api_keys,
            port,
            request_timeout: Duration::from_millis(timeout_ms),
            cycle_cooldown: Duration::from_millis(cooldown_ms),
            exhaustion_policy,
            watch_ordinals,
            smtp,
            retell,
        })
    }
}

/// 读取必需的环境变量，空白值按缺失处理
fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// 读取可选的环境变量，空白值按缺失处理
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// 读取可选的数值型环境变量
fn parse_optional<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            name,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// 解析逗号分隔的告警监控序号列表
fn parse_watch_ordinals(raw: &str) -> Result<HashSet<usize>, String> {
    let mut ordinals = HashSet::new();
    for segment in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let ordinal: usize = segment
            .parse()
            .map_err(|_| format!("无效的 Key 序号: {}", segment))?;
        if ordinal == 0 {
            return Err("Key 序号从 1 开始".to_string());
        }
        ordinals.insert(ordinal);
    }
    Ok(ordinals)
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_parse_watch_ordinals() {
        let ordinals = parse_watch_ordinals("5, 8,10").unwrap();
        assert_eq!(ordinals, [5, 8, 10].into_iter().collect());
    }

    #[test]
    fn test_parse_watch_ordinals_rejects_zero() {
        assert!(parse_watch_ordinals("0,5").is_err());
    }

    #[test]
    fn test_parse_watch_ordinals_rejects_garbage() {
        assert!(parse_watch_ordinals("5,abc").is_err());
    }

    #[test]
    fn test_parse_watch_ordinals_empty_is_allowed() {
        // 显式配置为空列表等价于关闭告警监控
        assert!(parse_watch_ordinals("").unwrap().is_empty());
    }

    #[test]
    fn test_exhaustion_policy_parse() {
        assert_eq!(
            ExhaustionPolicy::parse("cooldown").unwrap(),
            ExhaustionPolicy::Cooldown
        );
        assert_eq!(
            ExhaustionPolicy::parse("FAIL-FAST").unwrap(),
            ExhaustionPolicy::FailFast
        );
        assert!(ExhaustionPolicy::parse("sometimes").is_err());
    }

    #[test]
    fn test_default_watch_ordinals() {
        let defaults: HashSet<usize> = DEFAULT_WATCH_ORDINALS.iter().copied().collect();
        assert_eq!(defaults, [5, 8, 10].into_iter().collect());
    }
}
