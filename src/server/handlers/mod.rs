//! 请求处理器

mod generate;
mod telephony;

pub use generate::{generate, index};
pub use telephony::retell_call;
