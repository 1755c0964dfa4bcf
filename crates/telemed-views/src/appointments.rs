//! 预约页面
//!
//! 按当前时间分为"即将进行"和"已过去"两组，支持新建、取消和发起问诊。

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use telemed_core::{
    generate_id, Appointment, ConsultationSession, IdKind, Patient, Principal, Result,
    TelemedError, Timestamp,
};
use telemed_query::{MutationTracker, Queries};
use tracing::info;

use crate::format::UNKNOWN_PATIENT;

/// 本地日期时间输入格式
const LOCAL_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// 按时间划分的预约
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentPartition {
    /// `time > now`，时间升序
    pub upcoming: Vec<Appointment>,
    /// `time <= now`，时间降序
    pub past: Vec<Appointment>,
}

/// 划分预约：恰好等于 `now` 的归入已过去
pub fn partition_appointments(list: Vec<Appointment>, now: Timestamp) -> AppointmentPartition {
    let (mut upcoming, mut past): (Vec<_>, Vec<_>) =
        list.into_iter().partition(|apt| apt.time > now);

    upcoming.sort_by(|a, b| a.time.cmp(&b.time));
    past.sort_by(|a, b| b.time.cmp(&a.time));

    AppointmentPartition { upcoming, past }
}

/// 在患者列表中查找预约对应的患者名
pub fn resolve_patient_name(patients: &[Patient], patient_id: &str) -> String {
    patients
        .iter()
        .find(|p| p.id == patient_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| UNKNOWN_PATIENT.to_string())
}

/// 预约卡片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentCard {
    pub appointment: Appointment,
    pub patient_name: String,
    pub is_past: bool,
}

impl AppointmentCard {
    pub fn new(appointment: Appointment, patients: &[Patient], is_past: bool) -> Self {
        let patient_name = resolve_patient_name(patients, &appointment.patient_id);
        Self {
            appointment,
            patient_name,
            is_past,
        }
    }

    /// 只有未来的预约可以发起问诊或取消
    pub fn has_actions(&self) -> bool {
        !self.is_past
    }
}

/// 新建预约表单
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointmentForm {
    pub patient_id: String,
    /// 本地日期时间，例如 `2024-03-15T09:30`
    pub time: String,
    pub reason: String,
}

impl NewAppointmentForm {
    /// 校验并生成预约，医生为当前调用者
    pub fn into_appointment<Tz: TimeZone>(self, doctor: Principal, tz: &Tz) -> Result<Appointment> {
        let patient_id = self.patient_id.trim();
        let reason = self.reason.trim();
        if patient_id.is_empty() {
            return Err(TelemedError::Validation("请选择患者".to_string()));
        }
        if self.time.trim().is_empty() {
            return Err(TelemedError::Validation("请选择预约时间".to_string()));
        }
        if reason.is_empty() {
            return Err(TelemedError::Validation("请输入就诊原因".to_string()));
        }

        let time = parse_local_datetime(self.time.trim(), tz)?;
        Ok(Appointment {
            id: generate_id(IdKind::Appointment),
            doctor_id: doctor,
            patient_id: patient_id.to_string(),
            time,
            reason: reason.to_string(),
        })
    }
}

/// 解析本地日期时间并换算为时间戳
pub fn parse_local_datetime<Tz: TimeZone>(text: &str, tz: &Tz) -> Result<Timestamp> {
    let naive = LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| TelemedError::Validation(format!("无法解析时间: {}", text)))?;

    // 夏令时重叠取较早者
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| TelemedError::Validation(format!("本地时间不存在: {}", text)))?;
    Ok(Timestamp::from_datetime(local.with_timezone(&Utc)))
}

/// 预约页面数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentsView {
    pub upcoming: Vec<AppointmentCard>,
    pub past: Vec<AppointmentCard>,
}

impl AppointmentsView {
    pub fn build(appointments: Vec<Appointment>, patients: &[Patient], now: Timestamp) -> Self {
        let partition = partition_appointments(appointments, now);
        Self {
            upcoming: partition
                .upcoming
                .into_iter()
                .map(|apt| AppointmentCard::new(apt, patients, false))
                .collect(),
            past: partition
                .past
                .into_iter()
                .map(|apt| AppointmentCard::new(apt, patients, true))
                .collect(),
        }
    }

    pub async fn load(queries: &Queries, now: Timestamp) -> Result<Self> {
        let appointments = queries.all_appointments().await?;
        let patients = queries.all_patients().await?;
        Ok(Self::build(appointments, &patients, now))
    }
}

/// 新建预约
pub async fn schedule<Tz: TimeZone>(
    queries: &Queries,
    tracker: &MutationTracker,
    form: NewAppointmentForm,
    doctor: Principal,
    tz: &Tz,
) -> Result<Appointment> {
    let appointment = form.into_appointment(doctor, tz)?;
    tracker
        .track(queries.create_appointment(appointment.clone()))
        .await?;
    Ok(appointment)
}

/// 取消预约
pub async fn cancel(
    queries: &Queries,
    tracker: &MutationTracker,
    appointment_id: &str,
) -> Result<()> {
    tracker.track(queries.delete_appointment(appointment_id)).await
}

/// 为预约创建空白问诊会话，返回会话 ID 供跳转
pub async fn start_consultation(
    queries: &Queries,
    tracker: &MutationTracker,
    appointment_id: &str,
) -> Result<String> {
    if appointment_id.is_empty() {
        return Err(TelemedError::Validation("缺少预约 ID".to_string()));
    }
    let session = ConsultationSession::blank(generate_id(IdKind::Session), appointment_id);
    let session_id = session.id.clone();
    tracker.track(queries.create_consultation(session)).await?;
    info!("Consultation {} ready for appointment {}", session_id, appointment_id);
    Ok(session_id)
}
