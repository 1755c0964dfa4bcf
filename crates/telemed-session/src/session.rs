//! 登录会话
//!
//! 负责身份确立后装入远程服务客户端，注销时卸下客户端并清空查询缓存。
//! 登录时若提供方报告"已登录"，先注销再重试一次。

use std::sync::{Arc, Mutex};
use std::time::Duration;
use telemed_core::{Principal, Result, TelemedError};
use telemed_query::{Queries, SharedBackend};
use tracing::{info, warn};

use crate::identity::{IdentityProvider, LoginStatus};

/// 为已认证的调用者构造远程服务客户端
pub type BackendFactory = Arc<dyn Fn(&Principal) -> Result<SharedBackend> + Send + Sync>;

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 登录冲突时注销后等待多久再重试
    pub login_retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_retry_delay: Duration::from_millis(300),
        }
    }
}

/// 登录会话
pub struct Session {
    provider: Arc<dyn IdentityProvider>,
    queries: Queries,
    factory: BackendFactory,
    config: SessionConfig,
    status: Mutex<LoginStatus>,
}

impl Session {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        queries: Queries,
        factory: BackendFactory,
        config: SessionConfig,
    ) -> Self {
        Self {
            provider,
            queries,
            factory,
            config,
            status: Mutex::new(LoginStatus::Idle),
        }
    }

    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    pub fn status(&self) -> LoginStatus {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or(LoginStatus::Idle)
    }

    fn set_status(&self, status: LoginStatus) {
        if let Ok(mut current) = self.status.lock() {
            *current = status;
        }
    }

    pub async fn principal(&self) -> Option<Principal> {
        self.provider.principal().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.principal().await.is_some()
    }

    /// 若提供方已持有身份，直接装入客户端
    pub async fn restore(&self) -> Result<Option<Principal>> {
        let Some(principal) = self.provider.principal().await else {
            return Ok(None);
        };
        if !self.queries.actor().is_ready() {
            self.install_actor(&principal)?;
        }
        Ok(Some(principal))
    }

    fn install_actor(&self, principal: &Principal) -> Result<()> {
        let backend = (self.factory)(principal)?;
        self.queries.actor().install(backend);
        info!("Backend client ready for {}", principal);
        Ok(())
    }

    /// 登录，冲突时注销并重试一次
    pub async fn login(&self) -> Result<Principal> {
        self.set_status(LoginStatus::LoggingIn);

        let principal = match self.provider.login().await {
            Ok(principal) => principal,
            Err(TelemedError::AlreadyAuthenticated) => {
                warn!("Identity already authenticated, clearing and retrying login");
                self.reset_local_state().await?;
                tokio::time::sleep(self.config.login_retry_delay).await;
                match self.provider.login().await {
                    Ok(principal) => principal,
                    Err(e) => return Err(self.fail(e)),
                }
            }
            Err(e) => return Err(self.fail(e)),
        };

        if let Err(e) = self.install_actor(&principal) {
            return Err(self.fail(e));
        }
        self.set_status(LoginStatus::Success);
        info!("Logged in as {}", principal);
        Ok(principal)
    }

    fn fail(&self, error: TelemedError) -> TelemedError {
        warn!("Login failed: {}", error);
        self.set_status(LoginStatus::LoginError(error.to_string()));
        error
    }

    async fn reset_local_state(&self) -> Result<()> {
        self.provider.clear().await?;
        self.queries.actor().detach();
        self.queries.cache().clear()
    }

    /// 注销：清除身份、卸下客户端、清空缓存，可重复调用
    pub async fn logout(&self) -> Result<()> {
        self.reset_local_state().await?;
        self.set_status(LoginStatus::Idle);
        info!("Logged out");
        Ok(())
    }

    /// 登录按钮：已登录则注销，否则登录
    pub async fn toggle_auth(&self) -> Result<Option<Principal>> {
        if self.is_authenticated().await {
            self.logout().await?;
            Ok(None)
        } else {
            self.login().await.map(Some)
        }
    }
}
