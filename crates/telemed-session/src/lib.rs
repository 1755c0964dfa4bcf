//! # Telemed 会话与身份
//!
//! - 身份提供方接入点与本地实现
//! - 登录会话：登录冲突恢复、注销时清空缓存
//! - 档案引导：登录后必须拥有档案才能访问受保护页面

pub mod gate;
pub mod identity;
pub mod session;
pub mod state_machine;

pub use gate::{ProfileForm, ProfileGate, DEFAULT_PROFILE_ROLE};
pub use identity::{IdentityProvider, LocalIdentityProvider, LoginStatus};
pub use session::{BackendFactory, Session, SessionConfig};
pub use state_machine::{BootstrapEvent, BootstrapState, ProfileStateMachine};
