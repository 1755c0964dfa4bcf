//! 写操作状态跟踪
//!
//! 视图据此显示"保存中"或禁用按钮，失败只报告一次，是否重试由调用方决定。

use std::future::Future;
use std::sync::{Arc, Mutex};
use telemed_core::Result;

/// 写操作状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(String),
}

/// 单个写操作入口的状态
#[derive(Debug, Clone, Default)]
pub struct MutationTracker {
    status: Arc<Mutex<MutationStatus>>,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> MutationStatus {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or(MutationStatus::Idle)
    }

    pub fn is_pending(&self) -> bool {
        self.status() == MutationStatus::Pending
    }

    fn set(&self, status: MutationStatus) {
        if let Ok(mut current) = self.status.lock() {
            *current = status;
        }
    }

    /// 跟踪一次写操作直到完成
    pub async fn track<R, Fut>(&self, mutation: Fut) -> Result<R>
    where
        Fut: Future<Output = Result<R>>,
    {
        self.set(MutationStatus::Pending);
        let result = mutation.await;
        match &result {
            Ok(_) => self.set(MutationStatus::Succeeded),
            Err(e) => self.set(MutationStatus::Failed(e.to_string())),
        }
        result
    }

    /// 回到初始状态，例如关闭表单后
    pub fn reset(&self) {
        self.set(MutationStatus::Idle);
    }
}
