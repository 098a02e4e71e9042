//! 发往 Web 层的结构化事件

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::notification::model::{ACTION_MARK_READ, ACTION_REPLY};
use crate::payload::InboundMessage;
use crate::platform::Consumer;

pub const EVENT_NOTIFICATION_RECEIVED: &str = "pushNotificationReceived";
pub const EVENT_ACTION_PERFORMED: &str = "pushNotificationActionPerformed";
pub const EVENT_REGISTRATION: &str = "registration";
pub const EVENT_REGISTRATION_ERROR: &str = "registrationError";

/// `pushNotificationReceived` 事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationReceived {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 原始 payload 加上 `foreground` 标记
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl NotificationReceived {
    /// `foreground` 为 true 表示 consumer 在线时实时送达，重放时为 false
    pub fn from_message(message: &InboundMessage, foreground: bool) -> Self {
        let mut data: Map<String, Value> = message
            .data
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        data.insert("foreground".to_string(), Value::Bool(foreground));

        let notification = message.notification.as_ref();
        Self {
            id: message.message_id.clone(),
            data,
            title: notification.and_then(|n| n.title.clone()),
            body: notification.and_then(|n| n.body.clone()),
            click_action: notification.and_then(|n| n.click_action.clone()),
            link: notification.and_then(|n| n.link.clone()),
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// 动作 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionId {
    Tap,
    Reply,
    MarkRead,
}

impl ActionId {
    /// 同时接受短 ID 和动作广播名；未知动作返回 None
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "tap" => Some(ActionId::Tap),
            "reply" | ACTION_REPLY => Some(ActionId::Reply),
            "mark_read" | ACTION_MARK_READ => Some(ActionId::MarkRead),
            _ => None,
        }
    }
}

/// 动作事件中的通知信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub data: BTreeMap<String, String>,
}

/// `pushNotificationActionPerformed` 事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPerformed {
    pub action_id: ActionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_value: Option<String>,
    pub notification: ActionNotification,
}

impl ActionPerformed {
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

pub(crate) fn emit_received(consumer: &dyn Consumer, message: &InboundMessage, foreground: bool) -> bool {
    let event = NotificationReceived::from_message(message, foreground);
    debug!(id = ?event.id, foreground, "Forwarding pushNotificationReceived");
    emit_serialized(consumer, EVENT_NOTIFICATION_RECEIVED, &event)
}

pub(crate) fn emit_action(consumer: &dyn Consumer, action: &ActionPerformed) -> bool {
    debug!(action_id = ?action.action_id, "Forwarding pushNotificationActionPerformed");
    emit_serialized(consumer, EVENT_ACTION_PERFORMED, action)
}

/// 序列化失败时不发送事件，只记录错误
fn emit_serialized<T: Serialize>(consumer: &dyn Consumer, event: &str, payload: &T) -> bool {
    match serde_json::to_value(payload) {
        Ok(data) => {
            consumer.notify_listeners(event, data, true);
            true
        }
        Err(e) => {
            error!(event, error = %e, "Failed to serialize event, not forwarded");
            false
        }
    }
}
