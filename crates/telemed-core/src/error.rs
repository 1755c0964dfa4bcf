//! 错误定义模块

use thiserror::Error;

/// 远程医疗系统统一错误类型
///
/// 实现 `Clone`，同一次去重后的远程读取失败需要分发给所有等待者。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemedError {
    #[error("远程服务客户端尚未就绪")]
    ActorUnavailable,

    #[error("远程服务拒绝: {0}")]
    Remote(String),

    #[error("网络错误: {0}")]
    Transport(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("用户已登录")]
    AlreadyAuthenticated,

    #[error("用户未登录")]
    NotAuthenticated,

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },
}

impl TelemedError {
    /// 是否属于"服务尚不可用"一类（视为暂无数据，不作为用户错误展示）
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TelemedError::ActorUnavailable)
    }
}

impl From<serde_json::Error> for TelemedError {
    fn from(err: serde_json::Error) -> Self {
        TelemedError::Serialization(err.to_string())
    }
}

/// 远程医疗系统统一结果类型
pub type Result<T> = std::result::Result<T, TelemedError>;
