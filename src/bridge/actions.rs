//! 动作处理 - 通知点击、回复、标记已读
//!
//! 收到动作后先取消对应通知（已取消时无副作用），再转发给 consumer；
//! consumer 不在线时保存为唯一的待重放动作。未知动作直接忽略。

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::events::{emit_action, ActionId, ActionNotification, ActionPerformed};
use super::state::{BridgeState, PendingState};
use crate::platform::NotificationManager;

/// 动作按钮送回的内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceivedAction {
    /// 短 ID（tap/reply/mark_read）或动作广播名
    pub action: String,
    pub notification_id: i32,
    /// 通知渲染时携带的完整 payload
    pub data: BTreeMap<String, String>,
    /// 回复输入框内容
    pub reply_text: Option<String>,
}

/// 动作处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// 未知动作
    Ignored,
    Forwarded,
    /// consumer 不在线，已保存待重放
    Buffered,
}

/// 动作处理器
pub struct ActionReconciler {
    state: Arc<BridgeState>,
    manager: Arc<dyn NotificationManager>,
}

impl ActionReconciler {
    pub fn new(state: Arc<BridgeState>, manager: Arc<dyn NotificationManager>) -> Self {
        Self { state, manager }
    }

    pub fn on_action(&self, received: ReceivedAction) -> ActionOutcome {
        let Some(action_id) = ActionId::parse(&received.action) else {
            debug!(action = %received.action, "Ignoring unknown notification action");
            return ActionOutcome::Ignored;
        };

        self.manager.cancel(received.notification_id);

        let input_value = match action_id {
            ActionId::Reply => Some(received.reply_text.unwrap_or_default()),
            ActionId::Tap | ActionId::MarkRead => None,
        };

        info!(
            action_id = ?action_id,
            notification_id = received.notification_id,
            "Notification action received"
        );

        self.dispatch(ActionPerformed {
            action_id,
            input_value,
            notification: ActionNotification {
                id: None,
                data: received.data,
            },
        })
    }

    /// 转发已构建的动作事件，consumer 不在线时覆盖待重放动作
    pub fn dispatch(&self, action: ActionPerformed) -> ActionOutcome {
        match self.state.forward_or_buffer(action, PendingState::set_action) {
            Some((consumer, action)) => {
                emit_action(consumer.as_ref(), &action);
                ActionOutcome::Forwarded
            }
            None => {
                info!("Consumer not available, storing action for later");
                ActionOutcome::Buffered
            }
        }
    }
}
