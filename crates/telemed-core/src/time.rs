//! 时间戳处理
//!
//! 远程服务以自 Unix 纪元起的纳秒整数表示时间，客户端负责与挂钟时间互相转换。

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 每毫秒的纳秒数
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// 纳秒精度时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    /// 毫秒转换为纳秒时间戳
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    /// 截断到毫秒
    pub fn as_millis(&self) -> i64 {
        self.0.div_euclid(NANOS_PER_MILLI)
    }

    /// 当前时间
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// 保留纳秒精度；超出 i64 纳秒范围（约 1677 至 2262 年之外）时退回毫秒换算
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        match dt.timestamp_nanos_opt() {
            Some(nanos) => Self(nanos),
            None => Self::from_millis(dt.timestamp_millis()),
        }
    }

    /// 转换为挂钟时间
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_nanos(self.0))
    }

    /// 某日 UTC 零点
    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_datetime(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        self.to_datetime().map(|dt| dt.date_naive())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ns", self.0),
        }
    }
}
