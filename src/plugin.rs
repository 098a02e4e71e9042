//! 插件门面 - Web 层可调用的方法
//!
//! 负责 consumer 连接/重放、token 注册、已显示通知管理、通知渠道和权限。

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::bridge::events::{emit_action, emit_received, EVENT_REGISTRATION, EVENT_REGISTRATION_ERROR};
use crate::bridge::{
    ActionId, ActionNotification, ActionOutcome, ActionPerformed, ActionReconciler, BridgeState, DeliveryRouter,
    ReceivedAction,
};
use crate::payload::InboundMessage;
use crate::platform::{ChannelSpec, Consumer, NotificationManager, PermissionProvider, PermissionState, TokenProvider};

/// 推送服务放在 intent extras 里的消息 ID
pub const EXTRA_MESSAGE_ID: &str = "google.message_id";

/// 推送通知插件
pub struct PushNotificationsPlugin {
    state: Arc<BridgeState>,
    router: DeliveryRouter,
    reconciler: ActionReconciler,
    manager: Arc<dyn NotificationManager>,
    tokens: Arc<dyn TokenProvider>,
    permissions: Arc<dyn PermissionProvider>,
}

impl PushNotificationsPlugin {
    pub(crate) fn new(
        state: Arc<BridgeState>,
        router: DeliveryRouter,
        reconciler: ActionReconciler,
        manager: Arc<dyn NotificationManager>,
        tokens: Arc<dyn TokenProvider>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        Self {
            state,
            router,
            reconciler,
            manager,
            tokens,
            permissions,
        }
    }

    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    /// 连接 consumer 并重放待处理的消息和动作，返回重放的事件数
    pub fn load(&self, consumer: &Arc<dyn Consumer>) -> usize {
        let drained = self.state.attach(consumer);
        let mut replayed = 0;

        if let Some(message) = drained.message {
            emit_received(consumer.as_ref(), &message, false);
            replayed += 1;
        }

        if let Some(action) = drained.action {
            emit_action(consumer.as_ref(), &action);
            replayed += 1;
        }

        if replayed > 0 {
            info!(replayed, "Replayed pending events to consumer");
        }
        replayed
    }

    pub fn detach(&self) {
        self.state.detach();
    }

    /// 入站消息，返回 consumer 是否在线
    pub async fn on_message(&self, message: InboundMessage) -> bool {
        self.router.on_message(message).await
    }

    pub fn on_action(&self, received: ReceivedAction) -> ActionOutcome {
        self.reconciler.on_action(received)
    }

    /// 点击通知打开应用时的 intent
    ///
    /// 只处理带推送消息 ID 的 intent，其余 extras 作为 data。
    pub fn handle_new_intent(&self, extras: &BTreeMap<String, String>) -> ActionOutcome {
        let Some(message_id) = extras.get(EXTRA_MESSAGE_ID) else {
            return ActionOutcome::Ignored;
        };

        let data = extras
            .iter()
            .filter(|(k, _)| k.as_str() != EXTRA_MESSAGE_ID)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.reconciler.dispatch(ActionPerformed {
            action_id: ActionId::Tap,
            input_value: None,
            notification: ActionNotification {
                id: Some(message_id.clone()),
                data,
            },
        })
    }

    /// 启用自动初始化并获取 token
    pub fn register(&self) {
        self.tokens.set_auto_init_enabled(true);
        match self.tokens.fetch_token() {
            Ok(token) => {
                self.send_token(&token);
            }
            Err(e) => {
                warn!(error = %e, "Token fetch failed");
                self.send_error(&e.to_string());
            }
        }
    }

    pub fn unregister(&self) -> Result<()> {
        self.tokens.set_auto_init_enabled(false);
        self.tokens.delete_token()
    }

    /// token 刷新，返回是否已送达 consumer
    pub fn on_new_token(&self, token: &str) -> bool {
        self.send_token(token)
    }

    fn send_token(&self, token: &str) -> bool {
        self.emit(EVENT_REGISTRATION, json!({ "value": token }))
    }

    fn send_error(&self, error: &str) -> bool {
        self.emit(EVENT_REGISTRATION_ERROR, json!({ "error": error }))
    }

    fn emit(&self, event: &str, data: Value) -> bool {
        match self.state.active_consumer() {
            Some(consumer) => {
                consumer.notify_listeners(event, data, true);
                true
            }
            None => {
                debug!(event, "No active consumer, dropping event");
                false
            }
        }
    }

    pub fn get_delivered_notifications(&self) -> Value {
        json!({ "notifications": self.manager.active_notifications() })
    }

    /// 取消列表中的通知；每项需要整数 `id`，可选 `tag`
    pub fn remove_delivered_notifications(&self, notifications: &Value) -> Result<()> {
        let Some(list) = notifications.as_array() else {
            bail!("Expected notifications to be a list of notification objects");
        };

        let mut targets = Vec::with_capacity(list.len());
        for entry in list {
            let Some(obj) = entry.as_object() else {
                bail!("Expected notifications to be a list of notification objects");
            };
            let Some(id) = obj.get("id").and_then(Value::as_i64).and_then(|id| i32::try_from(id).ok()) else {
                bail!("Notification entry is missing an integer id");
            };
            let tag = obj.get("tag").and_then(Value::as_str).map(str::to_string);
            targets.push((tag, id));
        }

        for (tag, id) in targets {
            match tag {
                Some(tag) => self.manager.cancel_tagged(&tag, id),
                None => self.manager.cancel(id),
            }
        }
        Ok(())
    }

    pub fn remove_all_delivered_notifications(&self) {
        self.manager.cancel_all();
    }

    pub fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
        if channel.id.is_empty() {
            bail!("Channel missing identifier");
        }
        if channel.name.is_empty() {
            bail!("Channel missing name");
        }
        if !(1..=5).contains(&channel.importance) {
            bail!("Channel importance must be between 1 and 5");
        }
        self.manager.create_channel(channel)?;
        info!(channel = %channel.id, "Notification channel created");
        Ok(())
    }

    pub fn delete_channel(&self, channel_id: &str) -> Result<()> {
        if channel_id.is_empty() {
            bail!("Channel missing identifier");
        }
        self.manager.delete_channel(channel_id)
    }

    pub fn list_channels(&self) -> Value {
        json!({ "channels": self.manager.list_channels() })
    }

    pub fn check_permissions(&self) -> Value {
        let state = if self.permissions.requires_runtime_permission() {
            self.permissions.state()
        } else {
            PermissionState::Granted
        };
        json!({ "receive": state })
    }

    pub fn request_permissions(&self) -> Value {
        let state = if !self.permissions.requires_runtime_permission()
            || self.permissions.state() == PermissionState::Granted
        {
            PermissionState::Granted
        } else {
            self.permissions.request()
        };
        json!({ "receive": state })
    }
}
