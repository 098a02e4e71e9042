//! 相对时间格式化

use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// 把 epoch 秒格式化为相对时间文本
///
/// 取最大的适用单位，N=1 时使用单数；未来时间按 "just now" 处理。
pub fn format_relative_time(epoch_seconds: i64, now: DateTime<Utc>) -> String {
    let diff = now.timestamp().saturating_sub(epoch_seconds);

    if diff < MINUTE {
        return "just now".to_string();
    }

    let (n, unit) = if diff < HOUR {
        (diff / MINUTE, "minute")
    } else if diff < DAY {
        (diff / HOUR, "hour")
    } else if diff < WEEK {
        (diff / DAY, "day")
    } else {
        (diff / WEEK, "week")
    };

    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
