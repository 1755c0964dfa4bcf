//! 档案引导关卡
//!
//! 已登录但没有档案的调用者必须先保存档案，才能访问其他页面。
//! 表单只能提交，不能跳过。

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use telemed_core::{Result, TelemedError, UserProfile};
use telemed_query::{MutationStatus, MutationTracker, ProfileLookup};
use tracing::{info, warn};

use crate::session::Session;
use crate::state_machine::{BootstrapEvent, BootstrapState, ProfileStateMachine};

/// 档案表单中角色的默认值
pub const DEFAULT_PROFILE_ROLE: &str = "Doctor";

/// 档案填写表单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub role: String,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            role: DEFAULT_PROFILE_ROLE.to_string(),
        }
    }
}

impl ProfileForm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// 校验并生成档案：姓名去除首尾空白后不能为空，角色按填写内容保存
    pub fn into_profile(self) -> Result<UserProfile> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TelemedError::Validation("请输入姓名".to_string()));
        }
        Ok(UserProfile {
            name: name.to_string(),
            role: self.role,
        })
    }
}

#[derive(Debug)]
struct GateState {
    state: BootstrapState,
    profile: Option<UserProfile>,
    last_error: Option<TelemedError>,
}

/// 档案引导关卡
pub struct ProfileGate {
    session: Arc<Session>,
    machine: ProfileStateMachine,
    inner: Mutex<GateState>,
    /// 档案保存请求的状态，表单据此禁用提交按钮
    saving: MutationTracker,
}

impl ProfileGate {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            machine: ProfileStateMachine::new(),
            inner: Mutex::new(GateState {
                state: BootstrapState::Unauthenticated,
                profile: None,
                last_error: None,
            }),
            saving: MutationTracker::new(),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn state(&self) -> BootstrapState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(BootstrapState::Unauthenticated)
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.lock().ok().and_then(|inner| inner.profile.clone())
    }

    /// 最近一次档案读取失败的原因
    pub fn last_error(&self) -> Option<TelemedError> {
        self.inner.lock().ok().and_then(|inner| inner.last_error.clone())
    }

    pub fn save_status(&self) -> MutationStatus {
        self.saving.status()
    }

    pub fn can_access_protected(&self) -> bool {
        self.state() == BootstrapState::AuthenticatedWithProfile
    }

    fn apply(&self, event: BootstrapEvent) -> Result<BootstrapState> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| TelemedError::Internal("profile gate lock poisoned".to_string()))?;
        let next = self.machine.transition(&inner.state, &event)?;
        info!("Profile bootstrap {:?} --{:?}--> {:?}", inner.state, event, next);
        inner.state = next;
        if next == BootstrapState::Unauthenticated {
            inner.profile = None;
            inner.last_error = None;
        }
        Ok(next)
    }

    fn record(&self, profile: Option<UserProfile>, error: Option<TelemedError>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.profile = profile;
            inner.last_error = error;
        }
    }

    /// 根据当前身份重新读取档案
    pub async fn refresh(&self) -> Result<BootstrapState> {
        if self.session.restore().await?.is_none() {
            if self.state() != BootstrapState::Unauthenticated {
                self.apply(BootstrapEvent::LoggedOut)?;
            }
            return Ok(BootstrapState::Unauthenticated);
        }

        match self.state() {
            BootstrapState::Unauthenticated => {
                self.apply(BootstrapEvent::LoggedIn)?;
            }
            BootstrapState::Resolving => {}
            _ => {
                self.apply(BootstrapEvent::Retry)?;
            }
        }
        self.resolve().await
    }

    async fn resolve(&self) -> Result<BootstrapState> {
        match self.session.queries().caller_profile().await {
            Ok(ProfileLookup::Found(profile)) => {
                self.record(Some(profile), None);
                self.apply(BootstrapEvent::ProfileFound)
            }
            Ok(ProfileLookup::Missing) => {
                self.record(None, None);
                self.apply(BootstrapEvent::ProfileMissing)
            }
            // 客户端尚未就绪，视为仍在读取
            Ok(ProfileLookup::Unavailable) => Ok(self.state()),
            Err(e) => {
                warn!("Failed to load caller profile: {}", e);
                self.record(None, Some(e));
                self.apply(BootstrapEvent::ProfileFetchFailed)
            }
        }
    }

    /// 提交档案表单
    ///
    /// 仅在"已登录无档案"状态下可用；保存成功后重新读取档案确认。
    pub async fn submit(&self, form: ProfileForm) -> Result<BootstrapState> {
        self.machine
            .transition(&self.state(), &BootstrapEvent::ProfileSaved)?;
        let profile = form.into_profile()?;

        self.saving
            .track(self.session.queries().save_caller_profile(profile))
            .await?;
        self.apply(BootstrapEvent::ProfileSaved)?;
        self.resolve().await
    }

    /// 注销并回到未登录状态
    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await?;
        if self.state() != BootstrapState::Unauthenticated {
            self.apply(BootstrapEvent::LoggedOut)?;
        }
        Ok(())
    }
}
