//! # Telemed Core
//!
//! 远程医疗工作台的核心模块，提供数据模型、错误定义、时间戳与标识符工具。

pub mod error;
pub mod models;
pub mod time;
pub mod utils;

pub use error::{Result, TelemedError};
pub use models::*;
pub use time::Timestamp;
pub use utils::{generate_id, IdKind};
