//! 时间工具函数 — 业务时区转换
//!
//! 所有时间戳统一为 `i64` Unix millis；日期格式化在业务时区完成。
//! Order numbers embed the calendar date in the store's business timezone,
//! not UTC, so a late-night order gets the local date.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Current time as Unix millis
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a timestamp as the `YYYYMMDD` date prefix in the business timezone
pub fn business_date_str(now_millis: i64, tz: Tz) -> String {
    DateTime::<Utc>::from_timestamp_millis(now_millis)
        .unwrap_or_else(Utc::now)
        .with_timezone(&tz)
        .format("%Y%m%d")
        .to_string()
}
