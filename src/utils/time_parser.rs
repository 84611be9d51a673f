//! 过期时间解析
//!
//! 接受 RFC3339（带偏移）或不带偏移的 ISO-8601 本地时间，
//! 后者按 UTC 解释。

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::LinkletError;

/// 解析请求中的 expiresAt 字符串
pub fn parse_expires_at(input: &str) -> Result<DateTime<Utc>, LinkletError> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    // 无偏移的 ISO-8601 本地时间（存储统一按 UTC）
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(LinkletError::validation(format!(
        "Invalid expiresAt datetime: '{}'",
        input
    )))
}
