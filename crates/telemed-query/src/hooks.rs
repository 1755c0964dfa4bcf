//! 查询与写操作入口
//!
//! 每个方法对应一个远程过程：读操作经由缓存，写操作成功后按固定列表失效相关查询。
//! 远程服务客户端尚未就绪时，读操作返回空默认值，写操作返回 `ActorUnavailable`。

use std::future::Future;
use std::sync::{Arc, RwLock};
use telemed_client::BackendService;
use telemed_core::{
    Appointment, ConsultationSession, Patient, Principal, Result, TelemedError, UserProfile,
    UserRole,
};
use tracing::info;

use crate::cache::QueryCache;
use crate::key::{Invalidation, QueryFamily, QueryKey};

/// 共享的远程服务客户端
pub type SharedBackend = Arc<dyn BackendService>;

const PROFILE_INVALIDATIONS: [Invalidation; 1] =
    [Invalidation::Family(QueryFamily::CurrentUserProfile)];

const ROLE_INVALIDATIONS: [Invalidation; 2] = [
    Invalidation::Family(QueryFamily::CallerRole),
    Invalidation::Family(QueryFamily::IsCallerAdmin),
];

const PATIENT_INVALIDATIONS: [Invalidation; 2] = [
    Invalidation::Family(QueryFamily::Patients),
    Invalidation::Family(QueryFamily::Patient),
];

const APPOINTMENT_INVALIDATIONS: [Invalidation; 3] = [
    Invalidation::Family(QueryFamily::Appointments),
    Invalidation::Family(QueryFamily::Appointment),
    Invalidation::Family(QueryFamily::AppointmentsByPatient),
];

const CONSULTATION_INVALIDATIONS: [Invalidation; 3] = [
    Invalidation::Family(QueryFamily::ConsultationSession),
    Invalidation::Family(QueryFamily::ConsultationsByAppointment),
    Invalidation::Family(QueryFamily::ConsultationSessions),
];

/// 远程服务客户端槽位，身份确立后装入，注销时取出
#[derive(Clone, Default)]
pub struct ActorSlot {
    inner: Arc<RwLock<Option<SharedBackend>>>,
}

impl ActorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, backend: SharedBackend) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(backend);
        }
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = None;
        }
    }

    pub fn current(&self) -> Option<SharedBackend> {
        self.inner.read().ok().and_then(|slot| slot.clone())
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_some()
    }
}

/// 调用者档案查询结果
///
/// 区分"客户端未就绪"与"服务端确认没有档案"；读取失败则以 `Err` 返回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLookup {
    Unavailable,
    Missing,
    Found(UserProfile),
}

/// 类型化的查询/写操作集合
#[derive(Clone)]
pub struct Queries {
    cache: QueryCache,
    actor: ActorSlot,
}

impl Queries {
    pub fn new(cache: QueryCache, actor: ActorSlot) -> Self {
        Self { cache, actor }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn actor(&self) -> &ActorSlot {
        &self.actor
    }

    /// 读取，客户端未就绪或查询被禁用时返回默认值
    async fn read_or_default<T, F, Fut>(&self, key: QueryKey, enabled: bool, fetch: F) -> Result<T>
    where
        T: Default + Clone + Send + Sync + 'static,
        F: FnOnce(SharedBackend) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let Some(actor) = self.actor.current() else {
            return Ok(T::default());
        };
        let value = self.cache.read(key, enabled, move || fetch(actor)).await?;
        Ok(value.unwrap_or_default())
    }

    async fn run_mutation<P, F, Fut>(
        &self,
        payload: P,
        mutate_fn: F,
        invalidations: &[Invalidation],
    ) -> Result<()>
    where
        F: FnOnce(SharedBackend, P) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let actor = self.actor.current().ok_or(TelemedError::ActorUnavailable)?;
        self.cache
            .mutate(payload, move |p| mutate_fn(actor, p), invalidations)
            .await
    }

    // ---- 用户档案与角色 ----

    pub async fn caller_profile(&self) -> Result<ProfileLookup> {
        let Some(actor) = self.actor.current() else {
            return Ok(ProfileLookup::Unavailable);
        };
        let profile = self
            .cache
            .read(QueryKey::of(QueryFamily::CurrentUserProfile), true, move || async move {
                actor.get_caller_user_profile().await
            })
            .await?
            .flatten();
        Ok(match profile {
            Some(profile) => ProfileLookup::Found(profile),
            None => ProfileLookup::Missing,
        })
    }

    pub async fn save_caller_profile(&self, profile: UserProfile) -> Result<()> {
        info!("Saving caller profile for {}", profile.name);
        self.run_mutation(
            profile,
            |actor, profile| async move { actor.save_caller_user_profile(profile).await },
            &PROFILE_INVALIDATIONS,
        )
        .await
    }

    pub async fn user_profile(&self, user: &Principal) -> Result<Option<UserProfile>> {
        let user = user.clone();
        let key = QueryKey::scoped(QueryFamily::UserProfile, user.as_str());
        self.read_or_default(key, true, move |actor| async move {
            actor.get_user_profile(&user).await
        })
        .await
    }

    /// 调用者角色，客户端未就绪时视为访客
    pub async fn caller_role(&self) -> Result<UserRole> {
        let Some(actor) = self.actor.current() else {
            return Ok(UserRole::Guest);
        };
        let role = self
            .cache
            .read(QueryKey::of(QueryFamily::CallerRole), true, move || async move {
                actor.get_caller_user_role().await
            })
            .await?;
        Ok(role.unwrap_or(UserRole::Guest))
    }

    pub async fn is_caller_admin(&self) -> Result<bool> {
        self.read_or_default(QueryKey::of(QueryFamily::IsCallerAdmin), true, |actor| async move {
            actor.is_caller_admin().await
        })
        .await
    }

    pub async fn assign_role(&self, user: Principal, role: UserRole) -> Result<()> {
        info!("Assigning role {} to {}", role, user);
        self.run_mutation(
            (user, role),
            |actor, (user, role)| async move { actor.assign_caller_user_role(&user, role).await },
            &ROLE_INVALIDATIONS,
        )
        .await
    }

    // ---- 患者 ----

    pub async fn all_patients(&self) -> Result<Vec<Patient>> {
        self.read_or_default(QueryKey::of(QueryFamily::Patients), true, |actor| async move {
            actor.get_all_patients().await
        })
        .await
    }

    pub async fn patient(&self, id: &str) -> Result<Option<Patient>> {
        let key = QueryKey::scoped(QueryFamily::Patient, id);
        let id = id.to_string();
        self.read_or_default(key, !id.is_empty(), move |actor| async move {
            actor.get_patient(&id).await
        })
        .await
    }

    pub async fn create_patient(&self, patient: Patient) -> Result<()> {
        info!("Creating patient {}", patient.id);
        self.run_mutation(
            patient,
            |actor, patient| async move { actor.create_patient(patient).await },
            &PATIENT_INVALIDATIONS,
        )
        .await
    }

    pub async fn update_patient(&self, id: &str, patient: Patient) -> Result<()> {
        info!("Updating patient {}", id);
        self.run_mutation(
            (id.to_string(), patient),
            |actor, (id, patient)| async move { actor.update_patient(&id, patient).await },
            &PATIENT_INVALIDATIONS,
        )
        .await
    }

    pub async fn delete_patient(&self, id: &str) -> Result<()> {
        info!("Deleting patient {}", id);
        self.run_mutation(
            id.to_string(),
            |actor, id| async move { actor.delete_patient(&id).await },
            &PATIENT_INVALIDATIONS,
        )
        .await
    }

    // ---- 预约 ----

    pub async fn all_appointments(&self) -> Result<Vec<Appointment>> {
        self.read_or_default(QueryKey::of(QueryFamily::Appointments), true, |actor| async move {
            actor.get_all_appointments().await
        })
        .await
    }

    pub async fn appointment(&self, id: &str) -> Result<Option<Appointment>> {
        let key = QueryKey::scoped(QueryFamily::Appointment, id);
        let id = id.to_string();
        self.read_or_default(key, !id.is_empty(), move |actor| async move {
            actor.get_appointment(&id).await
        })
        .await
    }

    pub async fn appointments_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>> {
        let key = QueryKey::scoped(QueryFamily::AppointmentsByPatient, patient_id);
        let patient_id = patient_id.to_string();
        self.read_or_default(key, !patient_id.is_empty(), move |actor| async move {
            actor.get_appointments_by_patient(&patient_id).await
        })
        .await
    }

    pub async fn create_appointment(&self, appointment: Appointment) -> Result<()> {
        info!("Creating appointment {}", appointment.id);
        self.run_mutation(
            appointment,
            |actor, appointment| async move { actor.create_appointment(appointment).await },
            &APPOINTMENT_INVALIDATIONS,
        )
        .await
    }

    pub async fn update_appointment(&self, id: &str, appointment: Appointment) -> Result<()> {
        info!("Updating appointment {}", id);
        self.run_mutation(
            (id.to_string(), appointment),
            |actor, (id, appointment)| async move {
                actor.update_appointment(&id, appointment).await
            },
            &APPOINTMENT_INVALIDATIONS,
        )
        .await
    }

    pub async fn delete_appointment(&self, id: &str) -> Result<()> {
        info!("Deleting appointment {}", id);
        self.run_mutation(
            id.to_string(),
            |actor, id| async move { actor.delete_appointment(&id).await },
            &APPOINTMENT_INVALIDATIONS,
        )
        .await
    }

    // ---- 问诊会话 ----

    pub async fn consultation_session(&self, id: &str) -> Result<Option<ConsultationSession>> {
        let key = QueryKey::scoped(QueryFamily::ConsultationSession, id);
        let id = id.to_string();
        self.read_or_default(key, !id.is_empty(), move |actor| async move {
            actor.get_consultation_session(&id).await
        })
        .await
    }

    pub async fn consultations_by_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Vec<ConsultationSession>> {
        let key = QueryKey::scoped(QueryFamily::ConsultationsByAppointment, appointment_id);
        let appointment_id = appointment_id.to_string();
        self.read_or_default(key, !appointment_id.is_empty(), move |actor| async move {
            actor.get_consultations_by_appointment(&appointment_id).await
        })
        .await
    }

    pub async fn all_consultation_sessions(&self) -> Result<Vec<ConsultationSession>> {
        self.read_or_default(
            QueryKey::of(QueryFamily::ConsultationSessions),
            true,
            |actor| async move { actor.get_all_consultation_sessions().await },
        )
        .await
    }

    pub async fn create_consultation(&self, session: ConsultationSession) -> Result<()> {
        info!(
            "Starting consultation {} for appointment {}",
            session.id, session.appointment_id
        );
        self.run_mutation(
            session,
            |actor, session| async move { actor.create_consultation_session(session).await },
            &CONSULTATION_INVALIDATIONS,
        )
        .await
    }

    pub async fn update_consultation(&self, id: &str, session: ConsultationSession) -> Result<()> {
        info!("Updating consultation {}", id);
        self.run_mutation(
            (id.to_string(), session),
            |actor, (id, session)| async move {
                actor.update_consultation_session(&id, session).await
            },
            &CONSULTATION_INVALIDATIONS,
        )
        .await
    }

    pub async fn delete_consultation(&self, id: &str) -> Result<()> {
        info!("Deleting consultation {}", id);
        self.run_mutation(
            id.to_string(),
            |actor, id| async move { actor.delete_consultation_session(&id).await },
            &CONSULTATION_INVALIDATIONS,
        )
        .await
    }
}
