//! 后端调用层
//!
//! 对远端文本生成接口的不透明封装。

mod gemini;
mod traits;

pub use gemini::{GeminiBackend, GEMINI_ENDPOINT};
pub use traits::{
    BackendError, BackendErrorKind, BackendResult, GenerationBackend, RETRYABLE_STATUS_CODES,
};
