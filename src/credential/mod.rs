//! 凭证池模块
//!
//! 管理启动时加载的 Gemini API Key 列表（进程生命周期内只读）。

mod pool;

pub use pool::{Credential, CredentialPool};
