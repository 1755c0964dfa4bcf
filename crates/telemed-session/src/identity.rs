//! 身份提供方
//!
//! 身份提供方是外部协作者，这里只定义接入点和一个本地实现。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use telemed_core::{Principal, Result, TelemedError};
use tokio::sync::RwLock;
use tracing::info;

/// 登录状态
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoginStatus {
    #[default]
    Idle,
    LoggingIn,
    Success,
    LoginError(String),
}

/// 身份提供方接口
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 当前已认证的调用者
    async fn principal(&self) -> Option<Principal>;

    /// 发起登录；已持有身份时返回 `AlreadyAuthenticated`
    async fn login(&self) -> Result<Principal>;

    /// 注销，可重复调用
    async fn clear(&self) -> Result<()>;
}

/// 使用预先配置身份的本地提供方
#[derive(Debug)]
pub struct LocalIdentityProvider {
    configured: Principal,
    current: RwLock<Option<Principal>>,
    login_attempts: AtomicUsize,
    clears: AtomicUsize,
}

impl LocalIdentityProvider {
    pub fn new(configured: Principal) -> Self {
        Self {
            configured,
            current: RwLock::new(None),
            login_attempts: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }

    /// 启动时已持有身份（例如上次会话未注销）
    pub fn already_authenticated(configured: Principal) -> Self {
        Self {
            current: RwLock::new(Some(configured.clone())),
            ..Self::new(configured)
        }
    }

    pub fn login_attempts(&self) -> usize {
        self.login_attempts.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn principal(&self) -> Option<Principal> {
        self.current.read().await.clone()
    }

    async fn login(&self) -> Result<Principal> {
        self.login_attempts.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.write().await;
        if current.is_some() {
            return Err(TelemedError::AlreadyAuthenticated);
        }
        *current = Some(self.configured.clone());
        info!("Authenticated as {}", self.configured);
        Ok(self.configured.clone())
    }

    async fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.write().await;
        if let Some(principal) = current.take() {
            info!("Cleared identity {}", principal);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_and_clear() {
        let provider = LocalIdentityProvider::new(Principal::new("doctor-1"));
        assert_eq!(provider.principal().await, None);

        let principal = provider.login().await.unwrap();
        assert_eq!(principal, Principal::new("doctor-1"));
        assert_eq!(provider.principal().await, Some(principal));

        assert_eq!(provider.login().await, Err(TelemedError::AlreadyAuthenticated));

        provider.clear().await.unwrap();
        provider.clear().await.unwrap();
        assert_eq!(provider.principal().await, None);
        assert_eq!(provider.clears(), 2);
    }

    #[tokio::test]
    async fn test_already_authenticated_start() {
        let provider = LocalIdentityProvider::already_authenticated(Principal::new("doctor-1"));
        assert!(provider.principal().await.is_some());
        assert_eq!(provider.login().await, Err(TelemedError::AlreadyAuthenticated));
    }
}
