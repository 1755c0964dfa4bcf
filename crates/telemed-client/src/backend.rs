//! 远程服务接口
//!
//! 每个远程过程对应一个异步方法，调用之间相互独立，不做批量或流水线处理。

use async_trait::async_trait;
use telemed_core::{
    Appointment, ConsultationSession, Patient, Principal, Result, UserProfile, UserRole,
};

/// 远程过程名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    GetCallerUserProfile,
    SaveCallerUserProfile,
    GetUserProfile,
    GetCallerUserRole,
    IsCallerAdmin,
    AssignCallerUserRole,
    CreatePatient,
    UpdatePatient,
    DeletePatient,
    GetAllPatients,
    GetPatient,
    CreateAppointment,
    UpdateAppointment,
    DeleteAppointment,
    GetAllAppointments,
    GetAppointment,
    GetAppointmentsByPatient,
    CreateConsultationSession,
    UpdateConsultationSession,
    DeleteConsultationSession,
    GetConsultationSession,
    GetConsultationsByAppointment,
    GetAllConsultationSessions,
}

impl Procedure {
    /// 线上使用的过程名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetCallerUserProfile => "getCallerUserProfile",
            Self::SaveCallerUserProfile => "saveCallerUserProfile",
            Self::GetUserProfile => "getUserProfile",
            Self::GetCallerUserRole => "getCallerUserRole",
            Self::IsCallerAdmin => "isCallerAdmin",
            Self::AssignCallerUserRole => "assignCallerUserRole",
            Self::CreatePatient => "createPatient",
            Self::UpdatePatient => "updatePatient",
            Self::DeletePatient => "deletePatient",
            Self::GetAllPatients => "getAllPatients",
            Self::GetPatient => "getPatient",
            Self::CreateAppointment => "createAppointment",
            Self::UpdateAppointment => "updateAppointment",
            Self::DeleteAppointment => "deleteAppointment",
            Self::GetAllAppointments => "getAllAppointments",
            Self::GetAppointment => "getAppointment",
            Self::GetAppointmentsByPatient => "getAppointmentsByPatient",
            Self::CreateConsultationSession => "createConsultationSession",
            Self::UpdateConsultationSession => "updateConsultationSession",
            Self::DeleteConsultationSession => "deleteConsultationSession",
            Self::GetConsultationSession => "getConsultationSession",
            Self::GetConsultationsByAppointment => "getConsultationsByAppointment",
            Self::GetAllConsultationSessions => "getAllConsultationSessions",
        }
    }

    /// 是否为写操作
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::SaveCallerUserProfile
                | Self::AssignCallerUserRole
                | Self::CreatePatient
                | Self::UpdatePatient
                | Self::DeletePatient
                | Self::CreateAppointment
                | Self::UpdateAppointment
                | Self::DeleteAppointment
                | Self::CreateConsultationSession
                | Self::UpdateConsultationSession
                | Self::DeleteConsultationSession
        )
    }
}

impl TryFrom<&str> for Procedure {
    type Error = telemed_core::TelemedError;

    fn try_from(value: &str) -> Result<Self> {
        ALL_PROCEDURES
            .iter()
            .copied()
            .find(|p| p.as_str() == value)
            .ok_or_else(|| telemed_core::TelemedError::NotFound(format!("procedure {}", value)))
    }
}

/// 全部远程过程
pub const ALL_PROCEDURES: [Procedure; 23] = [
    Procedure::GetCallerUserProfile,
    Procedure::SaveCallerUserProfile,
    Procedure::GetUserProfile,
    Procedure::GetCallerUserRole,
    Procedure::IsCallerAdmin,
    Procedure::AssignCallerUserRole,
    Procedure::CreatePatient,
    Procedure::UpdatePatient,
    Procedure::DeletePatient,
    Procedure::GetAllPatients,
    Procedure::GetPatient,
    Procedure::CreateAppointment,
    Procedure::UpdateAppointment,
    Procedure::DeleteAppointment,
    Procedure::GetAllAppointments,
    Procedure::GetAppointment,
    Procedure::GetAppointmentsByPatient,
    Procedure::CreateConsultationSession,
    Procedure::UpdateConsultationSession,
    Procedure::DeleteConsultationSession,
    Procedure::GetConsultationSession,
    Procedure::GetConsultationsByAppointment,
    Procedure::GetAllConsultationSessions,
];

/// 远程服务客户端
///
/// 实现只做透传：解码结果或返回服务端报告的错误，不做额外校验。
#[async_trait]
pub trait BackendService: Send + Sync {
    // 用户档案与角色
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>>;
    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<()>;
    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>>;
    async fn get_caller_user_role(&self) -> Result<UserRole>;
    async fn is_caller_admin(&self) -> Result<bool>;
    async fn assign_caller_user_role(&self, user: &Principal, role: UserRole) -> Result<()>;

    // 患者
    async fn create_patient(&self, patient: Patient) -> Result<()>;
    async fn update_patient(&self, id: &str, patient: Patient) -> Result<()>;
    async fn delete_patient(&self, id: &str) -> Result<()>;
    async fn get_all_patients(&self) -> Result<Vec<Patient>>;
    async fn get_patient(&self, id: &str) -> Result<Option<Patient>>;

    // 预约
    async fn create_appointment(&self, appointment: Appointment) -> Result<()>;
    async fn update_appointment(&self, id: &str, appointment: Appointment) -> Result<()>;
    async fn delete_appointment(&self, id: &str) -> Result<()>;
    async fn get_all_appointments(&self) -> Result<Vec<Appointment>>;
    async fn get_appointment(&self, id: &str) -> Result<Option<Appointment>>;
    async fn get_appointments_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>>;

    // 问诊会话
    async fn create_consultation_session(&self, session: ConsultationSession) -> Result<()>;
    async fn update_consultation_session(
        &self,
        id: &str,
        session: ConsultationSession,
    ) -> Result<()>;
    async fn delete_consultation_session(&self, id: &str) -> Result<()>;
    async fn get_consultation_session(&self, id: &str) -> Result<Option<ConsultationSession>>;
    async fn get_consultations_by_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Vec<ConsultationSession>>;
    async fn get_all_consultation_sessions(&self) -> Result<Vec<ConsultationSession>>;
}
