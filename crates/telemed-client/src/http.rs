//! HTTP远程服务客户端
//!
//! 线上格式：`POST {base_url}/rpc/{过程名}`，请求体为位置参数组成的 JSON 数组，
//! 调用者身份放在 `X-Telemed-Principal` 请求头中。响应体 `null` 或空表示缺省值。

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use telemed_core::{
    Appointment, ConsultationSession, Patient, Principal, Result, TelemedError, UserProfile,
    UserRole,
};
use tracing::{debug, warn};

use crate::backend::{BackendService, Procedure};

/// 调用者身份请求头
pub const PRINCIPAL_HEADER: &str = "X-Telemed-Principal";

/// HTTP客户端配置
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// 服务根地址
    pub base_url: String,
    /// 单次请求超时，`None` 表示不设超时
    pub request_timeout: Option<Duration>,
}

/// 基于 reqwest 的远程服务客户端
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    principal: Principal,
}

impl HttpBackend {
    /// 为指定调用者创建客户端
    pub fn new(config: &HttpBackendConfig, principal: Principal) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(TelemedError::Config("backend url is empty".to_string()));
        }

        let mut builder = reqwest::Client::builder().user_agent("Telemed-Client/1.0");
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TelemedError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            principal,
        })
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    fn endpoint(&self, procedure: Procedure) -> String {
        format!("{}/rpc/{}", self.base_url, procedure.as_str())
    }

    /// 发起一次远程调用并解码结果
    async fn call<R: DeserializeOwned>(&self, procedure: Procedure, args: Value) -> Result<R> {
        let url = self.endpoint(procedure);
        debug!("Calling {} as {}", procedure.as_str(), self.principal);

        let response = self
            .client
            .post(&url)
            .header(PRINCIPAL_HEADER, self.principal.as_str())
            .json(&args)
            .send()
            .await
            .map_err(|e| {
                warn!("Request to {} failed: {}", url, e);
                TelemedError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TelemedError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!("{} rejected with status {}", procedure.as_str(), status);
            let reason = if body.trim().is_empty() {
                format!("status {}", status)
            } else {
                body
            };
            return Err(TelemedError::Remote(reason));
        }

        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }
}

#[async_trait]
impl BackendService for HttpBackend {
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>> {
        self.call(Procedure::GetCallerUserProfile, json!([])).await
    }

    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<()> {
        self.call(Procedure::SaveCallerUserProfile, json!([profile])).await
    }

    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>> {
        self.call(Procedure::GetUserProfile, json!([user])).await
    }

    async fn get_caller_user_role(&self) -> Result<UserRole> {
        self.call(Procedure::GetCallerUserRole, json!([])).await
    }

    async fn is_caller_admin(&self) -> Result<bool> {
        self.call(Procedure::IsCallerAdmin, json!([])).await
    }

    async fn assign_caller_user_role(&self, user: &Principal, role: UserRole) -> Result<()> {
        self.call(Procedure::AssignCallerUserRole, json!([user, role])).await
    }

    async fn create_patient(&self, patient: Patient) -> Result<()> {
        self.call(Procedure::CreatePatient, json!([patient])).await
    }

    async fn update_patient(&self, id: &str, patient: Patient) -> Result<()> {
        self.call(Procedure::UpdatePatient, json!([id, patient])).await
    }

    async fn delete_patient(&self, id: &str) -> Result<()> {
        self.call(Procedure::DeletePatient, json!([id])).await
    }

    async fn get_all_patients(&self) -> Result<Vec<Patient>> {
        self.call(Procedure::GetAllPatients, json!([])).await
    }

    async fn get_patient(&self, id: &str) -> Result<Option<Patient>> {
        self.call(Procedure::GetPatient, json!([id])).await
    }

    async fn create_appointment(&self, appointment: Appointment) -> Result<()> {
        self.call(Procedure::CreateAppointment, json!([appointment])).await
    }

    async fn update_appointment(&self, id: &str, appointment: Appointment) -> Result<()> {
        self.call(Procedure::UpdateAppointment, json!([id, appointment])).await
    }

    async fn delete_appointment(&self, id: &str) -> Result<()> {
        self.call(Procedure::DeleteAppointment, json!([id])).await
    }

    async fn get_all_appointments(&self) -> Result<Vec<Appointment>> {
        self.call(Procedure::GetAllAppointments, json!([])).await
    }

    async fn get_appointment(&self, id: &str) -> Result<Option<Appointment>> {
        self.call(Procedure::GetAppointment, json!([id])).await
    }

    async fn get_appointments_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>> {
        self.call(Procedure::GetAppointmentsByPatient, json!([patient_id])).await
    }

    async fn create_consultation_session(&self, session: ConsultationSession) -> Result<()> {
        self.call(Procedure::CreateConsultationSession, json!([session])).await
    }

    async fn update_consultation_session(
        &self,
        id: &str,
        session: ConsultationSession,
    ) -> Result<()> {
        self.call(Procedure::UpdateConsultationSession, json!([id, session])).await
    }

    async fn delete_consultation_session(&self, id: &str) -> Result<()> {
        self.call(Procedure::DeleteConsultationSession, json!([id])).await
    }

    async fn get_consultation_session(&self, id: &str) -> Result<Option<ConsultationSession>> {
        self.call(Procedure::GetConsultationSession, json!([id])).await
    }

    async fn get_consultations_by_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Vec<ConsultationSession>> {
        self.call(Procedure::GetConsultationsByAppointment, json!([appointment_id]))
            .await
    }

    async fn get_all_consultation_sessions(&self) -> Result<Vec<ConsultationSession>> {
        self.call(Procedure::GetAllConsultationSessions, json!([])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: url.to_string(),
            request_timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let backend = HttpBackend::new(&config("http://localhost:4943/"), Principal::new("p")).unwrap();
        assert_eq!(
            backend.endpoint(Procedure::GetAllPatients),
            "http://localhost:4943/rpc/getAllPatients"
        );
    }

    #[test]
    fn test_empty_url_rejected() {
        let result = HttpBackend::new(&config("  "), Principal::new("p"));
        assert!(matches!(result, Err(TelemedError::Config(_))));
    }
}
