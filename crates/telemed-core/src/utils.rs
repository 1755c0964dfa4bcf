//! 通用工具函数

use chrono::Utc;
use uuid::Uuid;

/// 客户端生成标识符的记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Patient,
    Appointment,
    Session,
}

impl IdKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            IdKind::Patient => "patient",
            IdKind::Appointment => "appointment",
            IdKind::Session => "session",
        }
    }
}

/// 生成记录标识符：`<前缀>-<毫秒时间戳>-<8位十六进制>`
pub fn generate_id(kind: IdKind) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", kind.prefix(), Utc::now().timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id(IdKind::Patient);
        let mut parts = id.splitn(3, '-');
        assert_eq!(parts.next(), Some("patient"));
        assert!(parts.next().is_some_and(|millis| millis.parse::<i64>().is_ok()));
        assert!(parts
            .next()
            .is_some_and(|suffix| suffix.len() == 8 && suffix.chars().all(|c| c.is_ascii_hexdigit())));
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let a = generate_id(IdKind::Session);
        let b = generate_id(IdKind::Session);
        assert_ne!(a, b);
    }
}
