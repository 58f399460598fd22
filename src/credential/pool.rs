//! 凭证池实现

use crate::error::ConfigError;

/// 单个 API Key 凭证
///
/// 不透明字符串，以其在池中的 1-based 位置（序号）标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 有序、定长的凭证池
///
/// 启动时从逗号分隔的配置值解析一次，此后只读，
/// 轮询引擎只持有读取访问。
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    /// 解析逗号分隔的原始配置值
    ///
    /// 按逗号拆分并去除首尾空白，保留顺序，不去重；
    /// 空段直接丢弃。原始值为空或没有任何 Key 存活时返回配置错误。
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let credentials: Vec<Credential> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Credential::from)
            .collect();

        if credentials.is_empty() {
            return Err(ConfigError::EmptyCredentialPool);
        }

        Ok(Self { credentials })
    }

    /// 从已有凭证构造（测试用）
    pub fn from_credentials(credentials: Vec<Credential>) -> Result<Self, ConfigError> {
        if credentials.is_empty() {
            return Err(ConfigError::EmptyCredentialPool);
        }
        Ok(Self { credentials })
    }

    /// 按槽位取凭证
    ///
    /// 索引对池大小取模，保证永远落在有效槽位上。
    pub fn get(&self, slot: usize) -> &Credential {
        &self.credentials[slot % self.credentials.len()]
    }

    /// 池大小
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
