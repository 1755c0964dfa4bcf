//! 核心数据模型定义
//!
//! 四类记录均由远程服务持有，客户端仅保存可失效的副本。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::Timestamp;

/// 调用者身份（不透明的可验证标识）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 用户档案，每个调用者一份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    /// 自由文本角色，如 Doctor、Nurse
    pub role: String,
}

/// 权限角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
            UserRole::Guest => write!(f, "guest"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = crate::TelemedError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "guest" => Ok(UserRole::Guest),
            other => Err(crate::TelemedError::Validation(format!("unknown role: {}", other))),
        }
    }
}

/// 患者信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u64,
    pub medical_history: String,
}

/// 预约
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub doctor_id: Principal,
    /// 外键，不做引用完整性检查
    pub patient_id: String,
    pub time: Timestamp,
    pub reason: String,
}

/// 问诊会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationSession {
    pub id: String,
    pub appointment_id: String,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<Timestamp>,
}

impl ConsultationSession {
    /// 为预约新建一个空白会话
    pub fn blank(id: impl Into<String>, appointment_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            appointment_id: appointment_id.into(),
            notes: String::new(),
            prescription: None,
            follow_up_date: None,
        }
    }
}
