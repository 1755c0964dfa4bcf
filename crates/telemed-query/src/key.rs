//! 逻辑查询键

use serde::{Deserialize, Serialize};
use std::fmt;

/// 查询族，同一族下的键可以整体失效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryFamily {
    CurrentUserProfile,
    UserProfile,
    CallerRole,
    IsCallerAdmin,
    Patients,
    Patient,
    Appointments,
    Appointment,
    AppointmentsByPatient,
    ConsultationSession,
    ConsultationsByAppointment,
    ConsultationSessions,
}

impl QueryFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentUserProfile => "currentUserProfile",
            Self::UserProfile => "userProfile",
            Self::CallerRole => "callerRole",
            Self::IsCallerAdmin => "isCallerAdmin",
            Self::Patients => "patients",
            Self::Patient => "patient",
            Self::Appointments => "appointments",
            Self::Appointment => "appointment",
            Self::AppointmentsByPatient => "appointmentsByPatient",
            Self::ConsultationSession => "consultationSession",
            Self::ConsultationsByAppointment => "consultationsByAppointment",
            Self::ConsultationSessions => "consultationSessions",
        }
    }
}

/// 缓存读取结果的存放与失效单位
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub family: QueryFamily,
    pub scope: Option<String>,
}

impl QueryKey {
    /// 无参数查询，如"全部患者"
    pub fn of(family: QueryFamily) -> Self {
        Self { family, scope: None }
    }

    /// 带参数查询，如"会话 X"
    pub fn scoped(family: QueryFamily, scope: impl Into<String>) -> Self {
        Self {
            family,
            scope: Some(scope.into()),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}/{}", self.family.as_str(), scope),
            None => write!(f, "{}", self.family.as_str()),
        }
    }
}

/// 失效目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// 仅一个键
    Key(QueryKey),
    /// 整个查询族
    Family(QueryFamily),
}

impl Invalidation {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Invalidation::Key(target) => target == key,
            Invalidation::Family(family) => key.family == *family,
        }
    }
}

impl From<QueryKey> for Invalidation {
    fn from(key: QueryKey) -> Self {
        Invalidation::Key(key)
    }
}

impl From<QueryFamily> for Invalidation {
    fn from(family: QueryFamily) -> Self {
        Invalidation::Family(family)
    }
}
