//! # Telemed 页面模型
//!
//! 仪表盘、患者、预约和问诊页面的数据组装与表单校验，
//! 读写全部经由 `telemed_query::Queries`。

pub mod appointments;
pub mod consultation;
pub mod dashboard;
pub mod format;
pub mod patients;

pub use appointments::{
    partition_appointments, resolve_patient_name, AppointmentCard, AppointmentPartition,
    AppointmentsView, NewAppointmentForm,
};
pub use consultation::{CallControls, ConsultationNotesForm, ConsultationView};
pub use dashboard::{DashboardStats, DashboardView};
pub use patients::{filter_patients, NewPatientForm, PatientsView};
