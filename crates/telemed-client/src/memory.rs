//! 内存远程服务
//!
//! 与远程服务语义一致的进程内实现，用于离线模式和测试。
//! 多个调用者共享同一个 `MemoryStore`，每个调用者通过 `connect` 获得自己的客户端。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use telemed_core::{
    Appointment, ConsultationSession, Patient, Principal, Result, TelemedError, UserProfile,
    UserRole,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{BackendService, Procedure};

/// 可按 id 存取的记录
trait Record: Clone {
    fn record_id(&self) -> &str;
}

impl Record for Patient {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Record for Appointment {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Record for ConsultationSession {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// 按插入顺序保存的记录表
#[derive(Debug)]
struct Table<T> {
    kind: &'static str,
    rows: Vec<T>,
}

impl<T: Record> Table<T> {
    fn new(kind: &'static str) -> Self {
        Self { kind, rows: Vec::new() }
    }

    fn insert(&mut self, record: T) -> Result<()> {
        if self.get(record.record_id()).is_some() {
            return Err(TelemedError::Remote(format!(
                "{} {} already exists",
                self.kind,
                record.record_id()
            )));
        }
        self.rows.push(record);
        Ok(())
    }

    fn replace(&mut self, id: &str, record: T) -> Result<()> {
        match self.rows.iter_mut().find(|r| r.record_id() == id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(TelemedError::Remote(format!("{} {} not found", self.kind, id))),
        }
    }

    fn remove(&mut self, id: &str) -> Result<()> {
        let before = self.rows.len();
        self.rows.retain(|r| r.record_id() != id);
        if self.rows.len() == before {
            return Err(TelemedError::Remote(format!("{} {} not found", self.kind, id)));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.rows.iter().find(|r| r.record_id() == id)
    }

    fn all(&self) -> Vec<T> {
        self.rows.clone()
    }
}

#[derive(Debug)]
struct StoreState {
    profiles: HashMap<Principal, UserProfile>,
    roles: HashMap<Principal, UserRole>,
    patients: Table<Patient>,
    appointments: Table<Appointment>,
    sessions: Table<ConsultationSession>,
}

/// 测试用的调用控制：计数、延迟与故障注入
#[derive(Debug, Default)]
struct CallControl {
    counts: HashMap<Procedure, usize>,
    failures: HashMap<Procedure, String>,
    latency: Option<Duration>,
}

/// 共享的内存数据
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    control: std::sync::Mutex<CallControl>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(StoreState {
                profiles: HashMap::new(),
                roles: HashMap::new(),
                patients: Table::new("patient"),
                appointments: Table::new("appointment"),
                sessions: Table::new("consultation session"),
            }),
            control: std::sync::Mutex::new(CallControl::default()),
        })
    }

    /// 以指定调用者身份连接
    pub fn connect(self: &Arc<Self>, caller: Principal) -> MemoryBackend {
        MemoryBackend {
            store: Arc::clone(self),
            caller,
        }
    }

    /// 某个远程过程被调用的次数
    pub fn call_count(&self, procedure: Procedure) -> usize {
        self.control
            .lock()
            .map(|c| c.counts.get(&procedure).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// 令某个远程过程持续失败，传 `None` 恢复
    pub fn set_failure(&self, procedure: Procedure, message: Option<&str>) {
        if let Ok(mut control) = self.control.lock() {
            match message {
                Some(message) => {
                    control.failures.insert(procedure, message.to_string());
                }
                None => {
                    control.failures.remove(&procedure);
                }
            }
        }
    }

    /// 为每次调用增加固定延迟
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut control) = self.control.lock() {
            control.latency = latency;
        }
    }

    async fn enter(&self, procedure: Procedure) -> Result<()> {
        let (latency, failure) = {
            let mut control = self
                .control
                .lock()
                .map_err(|_| TelemedError::Internal("call control poisoned".to_string()))?;
            *control.counts.entry(procedure).or_insert(0) += 1;
            (control.latency, control.failures.get(&procedure).cloned())
        };

        debug!("Memory backend handling {}", procedure.as_str());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(message) => Err(TelemedError::Remote(message)),
            None => Ok(()),
        }
    }
}

/// 绑定调用者身份的内存客户端
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    store: Arc<MemoryStore>,
    caller: Principal,
}

impl MemoryBackend {
    pub fn caller(&self) -> &Principal {
        &self.caller
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

#[async_trait]
impl BackendService for MemoryBackend {
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>> {
        self.store.enter(Procedure::GetCallerUserProfile).await?;
        let state = self.store.state.read().await;
        Ok(state.profiles.get(&self.caller).cloned())
    }

    async fn save_caller_user_profile(&self, profile: UserProfile) -> Result<()> {
        self.store.enter(Procedure::SaveCallerUserProfile).await?;
        let mut state = self.store.state.write().await;
        info!("Saved profile for {}", self.caller);
        state.profiles.insert(self.caller.clone(), profile);
        Ok(())
    }

    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>> {
        self.store.enter(Procedure::GetUserProfile).await?;
        let state = self.store.state.read().await;
        Ok(state.profiles.get(user).cloned())
    }

    async fn get_caller_user_role(&self) -> Result<UserRole> {
        self.store.enter(Procedure::GetCallerUserRole).await?;
        let state = self.store.state.read().await;
        Ok(state.roles.get(&self.caller).copied().unwrap_or(UserRole::User))
    }

    async fn is_caller_admin(&self) -> Result<bool> {
        self.store.enter(Procedure::IsCallerAdmin).await?;
        let state = self.store.state.read().await;
        Ok(state.roles.get(&self.caller) == Some(&UserRole::Admin))
    }

    async fn assign_caller_user_role(&self, user: &Principal, role: UserRole) -> Result<()> {
        self.store.enter(Procedure::AssignCallerUserRole).await?;
        let mut state = self.store.state.write().await;

        // 尚无管理员时允许首次指派
        let has_admin = state.roles.values().any(|r| *r == UserRole::Admin);
        let caller_is_admin = state.roles.get(&self.caller) == Some(&UserRole::Admin);
        if has_admin && !caller_is_admin {
            return Err(TelemedError::Remote(
                "Unauthorized: only admins can assign user roles".to_string(),
            ));
        }

        info!("Assigned role {} to {}", role, user);
        state.roles.insert(user.clone(), role);
        Ok(())
    }

    async fn create_patient(&self, patient: Patient) -> Result<()> {
        self.store.enter(Procedure::CreatePatient).await?;
        self.store.state.write().await.patients.insert(patient)
    }

    async fn update_patient(&self, id: &str, patient: Patient) -> Result<()> {
        self.store.enter(Procedure::UpdatePatient).await?;
        self.store.state.write().await.patients.replace(id, patient)
    }

    async fn delete_patient(&self, id: &str) -> Result<()> {
        self.store.enter(Procedure::DeletePatient).await?;
        self.store.state.write().await.patients.remove(id)
    }

    async fn get_all_patients(&self) -> Result<Vec<Patient>> {
        self.store.enter(Procedure::GetAllPatients).await?;
        Ok(self.store.state.read().await.patients.all())
    }

    async fn get_patient(&self, id: &str) -> Result<Option<Patient>> {
        self.store.enter(Procedure::GetPatient).await?;
        Ok(self.store.state.read().await.patients.get(id).cloned())
    }

    async fn create_appointment(&self, appointment: Appointment) -> Result<()> {
        self.store.enter(Procedure::CreateAppointment).await?;
        self.store.state.write().await.appointments.insert(appointment)
    }

    async fn update_appointment(&self, id: &str, appointment: Appointment) -> Result<()> {
        self.store.enter(Procedure::UpdateAppointment).await?;
        self.store.state.write().await.appointments.replace(id, appointment)
    }

    async fn delete_appointment(&self, id: &str) -> Result<()> {
        self.store.enter(Procedure::DeleteAppointment).await?;
        self.store.state.write().await.appointments.remove(id)
    }

    async fn get_all_appointments(&self) -> Result<Vec<Appointment>> {
        self.store.enter(Procedure::GetAllAppointments).await?;
        Ok(self.store.state.read().await.appointments.all())
    }

    async fn get_appointment(&self, id: &str) -> Result<Option<Appointment>> {
        self.store.enter(Procedure::GetAppointment).await?;
        Ok(self.store.state.read().await.appointments.get(id).cloned())
    }

    async fn get_appointments_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>> {
        self.store.enter(Procedure::GetAppointmentsByPatient).await?;
        let state = self.store.state.read().await;
        Ok(state
            .appointments
            .rows
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn create_consultation_session(&self, session: ConsultationSession) -> Result<()> {
        self.store.enter(Procedure::CreateConsultationSession).await?;
        self.store.state.write().await.sessions.insert(session)
    }

    async fn update_consultation_session(
        &self,
        id: &str,
        session: ConsultationSession,
    ) -> Result<()> {
        self.store.enter(Procedure::UpdateConsultationSession).await?;
        self.store.state.write().await.sessions.replace(id, session)
    }

    async fn delete_consultation_session(&self, id: &str) -> Result<()> {
        self.store.enter(Procedure::DeleteConsultationSession).await?;
        self.store.state.write().await.sessions.remove(id)
    }

    async fn get_consultation_session(&self, id: &str) -> Result<Option<ConsultationSession>> {
        self.store.enter(Procedure::GetConsultationSession).await?;
        Ok(self.store.state.read().await.sessions.get(id).cloned())
    }

    async fn get_consultations_by_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Vec<ConsultationSession>> {
        self.store.enter(Procedure::GetConsultationsByAppointment).await?;
        let state = self.store.state.read().await;
        Ok(state
            .sessions
            .rows
            .iter()
            .filter(|s| s.appointment_id == appointment_id)
            .cloned()
            .collect())
    }

    async fn get_all_consultation_sessions(&self) -> Result<Vec<ConsultationSession>> {
        self.store.enter(Procedure::GetAllConsultationSessions).await?;
        Ok(self.store.state.read().await.sessions.all())
    }
}
