//! 命令行配置
//!
//! 优先级从低到高：内置默认值、配置文件、`TELEMED__*` 环境变量、命令行参数。

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use telemed_client::HttpBackendConfig;
use telemed_query::CacheConfig;
use telemed_session::SessionConfig;

/// 客户端完整配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemedConfig {
    pub backend: BackendSection,
    pub identity: IdentitySection,
    pub session: SessionSection,
    pub cache: CacheSection,
    pub logging: LoggingSection,
}

/// 远程服务配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub url: String,
    /// 单次请求超时（毫秒）
    pub request_timeout_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4943".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// 身份配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub principal: String,
    /// 离线模式下首次登录时保存的档案姓名
    pub display_name: Option<String>,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            principal: "local-doctor".to_string(),
            display_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// 登录冲突时的重试间隔（毫秒）
    pub login_retry_delay_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            login_retry_delay_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub event_capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { event_capacity: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl TelemedConfig {
    /// 加载配置文件与环境变量
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("TELEMED").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: TelemedConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(config)
    }

    /// 校验配置；离线模式不需要远程地址
    pub fn validate(&self, offline: bool) -> Result<()> {
        if !offline && self.backend.url.trim().is_empty() {
            bail!("backend.url must not be empty");
        }
        if self.backend.request_timeout_ms == 0 {
            bail!("backend.request_timeout_ms must be greater than 0");
        }
        if self.identity.principal.trim().is_empty() {
            bail!("identity.principal must not be empty");
        }
        if self.cache.event_capacity == 0 {
            bail!("cache.event_capacity must be greater than 0");
        }
        Ok(())
    }

    pub fn http_backend(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self.backend.url.clone(),
            request_timeout: Some(Duration::from_millis(self.backend.request_timeout_ms)),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            login_retry_delay: Duration::from_millis(self.session.login_retry_delay_ms),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            event_capacity: self.cache.event_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("telemed-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = TelemedConfig::default();
        assert!(config.validate(false).is_ok());
        assert_eq!(config.session_config().login_retry_delay, Duration::from_millis(300));
        assert_eq!(config.cache_config().event_capacity, 64);
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let path = write_temp(
            "load",
            r#"
[backend]
url = "https://telemed.example.org"

[identity]
principal = "doctor-7"
display_name = "Dr. Seven"
"#,
        );

        let config = TelemedConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.backend.url, "https://telemed.example.org");
        assert_eq!(config.backend.request_timeout_ms, 10_000);
        assert_eq!(config.identity.principal, "doctor-7");
        assert_eq!(config.identity.display_name.as_deref(), Some("Dr. Seven"));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(TelemedConfig::load(Some("/nonexistent/telemed-config")).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = TelemedConfig::default();
        config.backend.url = String::new();
        assert!(config.validate(false).is_err());
        assert!(config.validate(true).is_ok());

        let mut config = TelemedConfig::default();
        config.backend.request_timeout_ms = 0;
        assert!(config.validate(true).is_err());

        let mut config = TelemedConfig::default();
        config.identity.principal = "  ".to_string();
        assert!(config.validate(false).is_err());
    }
}
