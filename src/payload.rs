//! Payload 规范化 - 校验远程消息的扁平字符串 payload
//!
//! 必填字段：`channel_id`、`title`、`message`、`count`、`notId`。
//! 可选字段：`category`、`image`、`timestamp`。
//!
//! 缺少 `channel_id` 的消息视为旧格式直接丢弃，避免新旧两种 payload
//! 同时到达时重复显示。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::notification::Category;

pub const KEY_CHANNEL_ID: &str = "channel_id";
pub const KEY_TITLE: &str = "title";
pub const KEY_MESSAGE: &str = "message";
pub const KEY_COUNT: &str = "count";
pub const KEY_NOT_ID: &str = "notId";
pub const KEY_CATEGORY: &str = "category";
pub const KEY_IMAGE: &str = "image";
pub const KEY_TIMESTAMP: &str = "timestamp";

/// 推送服务附带的展示块（transport 层的 notification 字段）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteNotification {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub click_action: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// 入站远程消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// 推送服务分配的消息 ID
    #[serde(default)]
    pub message_id: Option<String>,
    /// 扁平 payload
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub notification: Option<RemoteNotification>,
}

impl InboundMessage {
    pub fn new(message_id: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            data,
            notification: None,
        }
    }

    pub fn with_notification(mut self, notification: RemoteNotification) -> Self {
        self.notification = Some(notification);
        self
    }
}

/// 规范化后的通知字段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedNotification {
    pub title: String,
    pub body: String,
    /// 0 表示清空全部通知
    pub badge_count: u32,
    /// 既是系统通知 id，也是重放 key
    pub notification_id: i32,
    pub channel_id: String,
    pub category: Option<Category>,
    /// 仅 http(s) 地址
    pub image_url: Option<String>,
    pub epoch_seconds: Option<i64>,
    /// 原始 payload（随 action intent 一起携带）
    pub data: BTreeMap<String, String>,
}

/// Payload 被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectedPayload {
    #[error("payload is empty")]
    Empty,
    #[error("legacy payload without channel_id")]
    LegacyPayload,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("title is empty")]
    EmptyTitle,
    #[error("field {field} is not an integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },
    #[error("count is negative: {0}")]
    NegativeCount(i64),
}

/// 校验并提取 payload
///
/// 任一必填字段缺失或解析失败都会整体拒绝，不会产生部分构造的结果。
pub fn normalize(raw: &BTreeMap<String, String>) -> Result<NormalizedNotification, RejectedPayload> {
    if raw.is_empty() {
        return Err(RejectedPayload::Empty);
    }

    let channel_id = match raw.get(KEY_CHANNEL_ID) {
        Some(id) if !id.is_empty() => id.clone(),
        _ => {
            debug!("Ignoring legacy notification without channel_id");
            return Err(RejectedPayload::LegacyPayload);
        }
    };

    let title = required(raw, KEY_TITLE)?;
    let body = required(raw, KEY_MESSAGE)?;
    let count = required(raw, KEY_COUNT)?;
    let not_id = required(raw, KEY_NOT_ID)?;

    let count: i64 = parse_int(KEY_COUNT, count)?;
    let badge_count = u32::try_from(count).map_err(|_| RejectedPayload::NegativeCount(count))?;

    // count=0 是清空哨兵，不显示内容，标题可以为空
    if title.is_empty() && badge_count > 0 {
        return Err(RejectedPayload::EmptyTitle);
    }

    let notification_id: i32 = parse_int(KEY_NOT_ID, not_id)?;

    let category = raw
        .get(KEY_CATEGORY)
        .filter(|c| !c.is_empty())
        .map(|c| Category::parse(c));

    let image_url = raw.get(KEY_IMAGE).filter(|url| is_fetchable(url)).cloned();

    let epoch_seconds = raw
        .get(KEY_TIMESTAMP)
        .filter(|ts| !ts.is_empty())
        .and_then(|ts| match ts.trim().parse::<i64>() {
            Ok(secs) => Some(secs),
            Err(_) => {
                warn!(timestamp = %ts, "Invalid timestamp, dropping");
                None
            }
        });

    Ok(NormalizedNotification {
        title: title.to_string(),
        body: body.to_string(),
        badge_count,
        notification_id,
        channel_id,
        category,
        image_url,
        epoch_seconds,
        data: raw.clone(),
    })
}

fn required<'a>(raw: &'a BTreeMap<String, String>, key: &'static str) -> Result<&'a str, RejectedPayload> {
    raw.get(key)
        .map(String::as_str)
        .ok_or(RejectedPayload::MissingField(key))
}

fn parse_int<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, RejectedPayload> {
    value.trim().parse().map_err(|_| RejectedPayload::InvalidInteger {
        field,
        value: value.to_string(),
    })
}

/// 图片地址是否可下载（只接受 http/https）
pub fn is_fetchable(url: &str) -> bool {
    static HTTP_URL: OnceLock<Regex> = OnceLock::new();
    HTTP_URL
        .get_or_init(|| Regex::new(r"(?i)^https?://\S+$").expect("static regex"))
        .is_match(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn valid() -> BTreeMap<String, String> {
        payload(&[
            ("channel_id", "c1"),
            ("title", "Hi"),
            ("message", "Hello"),
            ("count", "1"),
            ("notId", "42"),
        ])
    }

    #[test]
    fn test_normalize_minimal_payload() {
        let n = normalize(&valid()).unwrap();
        assert_eq!(n.title, "Hi");
        assert_eq!(n.body, "Hello");
        assert_eq!(n.badge_count, 1);
        assert_eq!(n.notification_id, 42);
        assert_eq!(n.channel_id, "c1");
        assert!(n.category.is_none());
        assert!(n.image_url.is_none());
        assert!(n.epoch_seconds.is_none());
        assert_eq!(n.data.len(), 5);
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert_eq!(normalize(&BTreeMap::new()), Err(RejectedPayload::Empty));
    }

    #[test]
    fn test_legacy_payload_rejected() {
        let mut raw = valid();
        raw.remove("channel_id");
        assert_eq!(normalize(&raw), Err(RejectedPayload::LegacyPayload));

        raw.insert("channel_id".into(), String::new());
        assert_eq!(normalize(&raw), Err(RejectedPayload::LegacyPayload));
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        for key in ["title", "message", "count", "notId"] {
            let mut raw = valid();
            raw.remove(key);
            assert_eq!(
                normalize(&raw),
                Err(RejectedPayload::MissingField(key)),
                "removing {} should reject",
                key
            );
        }
    }

    #[test]
    fn test_unparseable_integers_reject_whole_payload() {
        let mut raw = valid();
        raw.insert("count".into(), "many".into());
        assert!(matches!(
            normalize(&raw),
            Err(RejectedPayload::InvalidInteger { field: "count", .. })
        ));

        let mut raw = valid();
        raw.insert("notId".into(), "4x2".into());
        assert!(matches!(
            normalize(&raw),
            Err(RejectedPayload::InvalidInteger { field: "notId", .. })
        ));
    }

    #[test]
    fn test_negative_count_rejected() {
        let mut raw = valid();
        raw.insert("count".into(), "-1".into());
        assert_eq!(normalize(&raw), Err(RejectedPayload::NegativeCount(-1)));
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut raw = valid();
        raw.insert("title".into(), String::new());
        assert_eq!(normalize(&raw), Err(RejectedPayload::EmptyTitle));
    }

    #[test]
    fn test_clear_sentinel_accepts_empty_title() {
        let raw = payload(&[
            ("channel_id", "c1"),
            ("title", ""),
            ("message", ""),
            ("count", "0"),
            ("notId", "1"),
        ]);
        let n = normalize(&raw).unwrap();
        assert_eq!(n.badge_count, 0);
        assert!(n.title.is_empty());
    }

    #[test]
    fn test_optional_fields() {
        let mut raw = valid();
        raw.insert("category".into(), "CHAT_MESSAGE".into());
        raw.insert("image".into(), "https://example.org/a.png".into());
        raw.insert("timestamp".into(), "1700000000".into());

        let n = normalize(&raw).unwrap();
        assert_eq!(n.category, Some(Category::ChatMessage));
        assert_eq!(n.image_url.as_deref(), Some("https://example.org/a.png"));
        assert_eq!(n.epoch_seconds, Some(1_700_000_000));
    }

    #[test]
    fn test_invalid_timestamp_silently_dropped() {
        let mut raw = valid();
        raw.insert("timestamp".into(), "yesterday".into());
        let n = normalize(&raw).unwrap();
        assert!(n.epoch_seconds.is_none());
    }

    #[test]
    fn test_non_http_image_not_fetchable() {
        let mut raw = valid();
        raw.insert("image".into(), "file:///sdcard/a.png".into());
        assert!(normalize(&raw).unwrap().image_url.is_none());

        assert!(is_fetchable("http://example.org/x.jpg"));
        assert!(is_fetchable("HTTPS://example.org/x.jpg"));
        assert!(!is_fetchable("httpx://example.org"));
        assert!(!is_fetchable("ftp://example.org/x.jpg"));
        assert!(!is_fetchable(""));
    }

    #[test]
    fn test_unknown_category_kept_as_other() {
        let mut raw = valid();
        raw.insert("category".into(), "NEW_THING".into());
        let n = normalize(&raw).unwrap();
        assert_eq!(n.category, Some(Category::Other("NEW_THING".into())));
    }
}
