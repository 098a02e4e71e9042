//! 平台无关的通知描述

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Serialize, Serializer};

/// 聊天消息分类（带回复和已读按钮）
pub const CATEGORY_CHAT_MESSAGE: &str = "CHAT_MESSAGE";

/// 动作广播名
pub const ACTION_REPLY: &str = "push_bridge.ACTION_REPLY";
pub const ACTION_MARK_READ: &str = "push_bridge.ACTION_MARK_READ";

/// 回复输入框的结果 key
pub const KEY_TEXT_REPLY: &str = "key_text_reply";

/// 包元数据里没有配置小图标时使用
pub const DEFAULT_SMALL_ICON: &str = "ic_dialog_info";

/// 默认强调色（ARGB 绿色）
pub const COLOR_GREEN: u32 = 0xFF00_FF00;

/// 通知分类
///
/// 开放枚举：未识别的分类落入 `Other`，照常显示但不带动作按钮。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    ChatMessage,
    Other(String),
}

impl Category {
    pub fn parse(s: &str) -> Self {
        match s {
            CATEGORY_CHAT_MESSAGE => Category::ChatMessage,
            other => Category::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Category::ChatMessage => CATEGORY_CHAT_MESSAGE,
            Category::Other(s) => s,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Default,
    High,
}

/// 点击通知时打开的界面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIntent {
    /// 目标 activity（主界面）
    pub activity: String,
    /// 清除目标之上的 activity 栈
    pub clear_top: bool,
    pub request_code: i32,
}

/// 动作按钮种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Reply,
    MarkRead,
}

impl ActionKind {
    pub fn title(&self) -> &'static str {
        match self {
            ActionKind::Reply => "Reply",
            ActionKind::MarkRead => "Mark Read",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ActionKind::Reply => "ic_menu_send",
            ActionKind::MarkRead => "ic_menu_view",
        }
    }

    pub fn broadcast_action(&self) -> &'static str {
        match self {
            ActionKind::Reply => ACTION_REPLY,
            ActionKind::MarkRead => ACTION_MARK_READ,
        }
    }

    /// 同一通知的各动作需要不同的 request code
    fn request_code(&self, notification_id: i32) -> i32 {
        let offset = match self {
            ActionKind::Reply => 1,
            ActionKind::MarkRead => 2,
        };
        notification_id.wrapping_mul(10).wrapping_add(offset)
    }
}

/// 文本输入框
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInput {
    pub result_key: String,
    pub label: String,
}

/// 动作按钮触发时送回的 intent
///
/// 携带完整 payload 和通知 id，动作处理时无需二次查询。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionIntent {
    pub action: String,
    pub notification_id: i32,
    pub data: BTreeMap<String, String>,
    pub request_code: i32,
    /// 回复动作需要可变 intent 以写入输入内容
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub kind: ActionKind,
    pub title: String,
    pub icon: String,
    pub remote_input: Option<RemoteInput>,
    pub intent: ActionIntent,
}

impl NotificationAction {
    pub fn new(kind: ActionKind, notification_id: i32, data: &BTreeMap<String, String>) -> Self {
        let remote_input = match kind {
            ActionKind::Reply => Some(RemoteInput {
                result_key: KEY_TEXT_REPLY.to_string(),
                label: "Reply".to_string(),
            }),
            ActionKind::MarkRead => None,
        };

        Self {
            kind,
            title: kind.title().to_string(),
            icon: kind.icon().to_string(),
            remote_input,
            intent: ActionIntent {
                action: kind.broadcast_action().to_string(),
                notification_id,
                data: data.clone(),
                request_code: kind.request_code(notification_id),
                mutable: kind == ActionKind::Reply,
            },
        }
    }

    /// 按分类生成动作按钮；未识别或缺失的分类没有按钮
    pub fn for_category(
        category: Option<&Category>,
        notification_id: i32,
        data: &BTreeMap<String, String>,
    ) -> Vec<NotificationAction> {
        match category {
            Some(Category::ChatMessage) => vec![
                Self::new(ActionKind::Reply, notification_id, data),
                Self::new(ActionKind::MarkRead, notification_id, data),
            ],
            Some(Category::Other(_)) | None => Vec::new(),
        }
    }
}

/// 大图标来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    Downloaded(String),
    AppIcon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LargeIcon {
    pub source: IconSource,
    pub bitmap: RgbaImage,
}

/// 待显示的系统通知
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: i32,
    pub channel_id: String,
    pub title: String,
    pub body: String,
    pub small_icon: String,
    pub priority: Priority,
    /// 点击后自动消失
    pub auto_cancel: bool,
    /// ARGB 强调色
    pub color: u32,
    pub content_intent: ContentIntent,
    pub when: Option<DateTime<Utc>>,
    pub show_when: bool,
    /// 相对时间文本
    pub sub_text: Option<String>,
    pub large_icon: Option<LargeIcon>,
    pub actions: Vec<NotificationAction>,
    pub extras: BTreeMap<String, String>,
}
