//! 仪表盘

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use telemed_core::{Appointment, Patient, Result, Timestamp};
use telemed_query::Queries;

use crate::appointments::{partition_appointments, AppointmentCard};

/// 仪表盘显示的即将进行预约数
pub const UPCOMING_LIMIT: usize = 5;

/// 仪表盘显示的患者数
pub const RECENT_PATIENTS_LIMIT: usize = 4;

/// 统计卡片
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_patients: usize,
    pub total_appointments: usize,
    /// 暂无会话追踪，恒为 0
    pub active_sessions: usize,
    /// 与 `now` 同年同月（UTC）的预约数
    pub this_month: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardView {
    pub stats: DashboardStats,
    pub upcoming: Vec<AppointmentCard>,
    pub recent_patients: Vec<Patient>,
}

impl DashboardView {
    pub fn build(patients: Vec<Patient>, appointments: Vec<Appointment>, now: Timestamp) -> Self {
        let stats = DashboardStats {
            total_patients: patients.len(),
            total_appointments: appointments.len(),
            active_sessions: 0,
            this_month: count_in_month(&appointments, now),
        };

        let upcoming = partition_appointments(appointments, now)
            .upcoming
            .into_iter()
            .take(UPCOMING_LIMIT)
            .map(|apt| AppointmentCard::new(apt, &patients, false))
            .collect();

        let recent_patients = patients.into_iter().take(RECENT_PATIENTS_LIMIT).collect();

        Self {
            stats,
            upcoming,
            recent_patients,
        }
    }

    pub async fn load(queries: &Queries, now: Timestamp) -> Result<Self> {
        let patients = queries.all_patients().await?;
        let appointments = queries.all_appointments().await?;
        Ok(Self::build(patients, appointments, now))
    }
}

fn count_in_month(appointments: &[Appointment], now: Timestamp) -> usize {
    let Some(now) = now.to_datetime() else {
        return 0;
    };
    appointments
        .iter()
        .filter_map(|apt| apt.time.to_datetime())
        .filter(|dt| dt.year() == now.year() && dt.month() == now.month())
        .count()
}
