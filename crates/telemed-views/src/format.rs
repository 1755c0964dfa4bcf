//! 显示格式化

use chrono::TimeZone;
use std::fmt::Display;
use telemed_core::{Patient, Timestamp};

/// 患者没有病史时显示的文字
pub const HISTORY_FALLBACK: &str = "No medical history recorded";

/// 预约关联的患者不存在时显示的名字
pub const UNKNOWN_PATIENT: &str = "Unknown Patient";

/// 卡片上显示的 ID 前缀长度
const SHORT_ID_LEN: usize = 12;

/// 日期，例如 `2024-03-15`
pub fn format_date<Tz>(ts: Timestamp, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match ts.to_datetime() {
        Some(dt) => dt.with_timezone(tz).format("%Y-%m-%d").to_string(),
        None => ts.to_string(),
    }
}

/// 时刻，例如 `09:30`
pub fn format_time<Tz>(ts: Timestamp, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match ts.to_datetime() {
        Some(dt) => dt.with_timezone(tz).format("%H:%M").to_string(),
        None => String::new(),
    }
}

/// 紧凑卡片上的年龄行
pub fn age_line(patient: &Patient) -> String {
    format!("{} years old", patient.age)
}

/// 详情卡片上的年龄行
pub fn age_detail(patient: &Patient) -> String {
    format!("Age: {} years", patient.age)
}

pub fn history_text(patient: &Patient) -> &str {
    if patient.medical_history.is_empty() {
        HISTORY_FALLBACK
    } else {
        &patient.medical_history
    }
}

/// 截断的 ID，用于卡片标题
pub fn short_id(id: &str) -> String {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => format!("{}...", &id[..end]),
        None => id.to_string(),
    }
}
