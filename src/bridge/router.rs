//! 消息路由 - 每条入站消息渲染一次，并转发给 consumer 或缓存待重放
//!
//! 推送回调与应用生命周期无关，因此渲染与 consumer 是否在线互相独立。

use std::sync::Arc;

use tracing::{debug, info};

use super::events::emit_received;
use super::state::{BridgeState, PendingState};
use crate::config::RenderPolicy;
use crate::notification::NotificationRenderer;
use crate::payload::{normalize, InboundMessage};

/// 消息路由器
pub struct DeliveryRouter {
    state: Arc<BridgeState>,
    renderer: Arc<NotificationRenderer>,
    policy: RenderPolicy,
}

impl DeliveryRouter {
    pub fn new(state: Arc<BridgeState>, renderer: Arc<NotificationRenderer>, policy: RenderPolicy) -> Self {
        Self { state, renderer, policy }
    }

    /// 处理入站消息，返回 consumer 是否在线
    pub async fn on_message(&self, message: InboundMessage) -> bool {
        let consumer_present = self.state.active_consumer().is_some();

        if self.policy.should_render(consumer_present) {
            self.render(&message).await;
        } else {
            debug!(id = ?message.message_id, "Consumer attached, leaving display to the web layer");
        }

        match self.state.forward_or_buffer(message, PendingState::set_message) {
            Some((consumer, message)) => {
                emit_received(consumer.as_ref(), &message, true);
                true
            }
            None => {
                info!("No active consumer, message stored for replay");
                false
            }
        }
    }

    /// 规范化并渲染；被拒绝的 payload 只记录日志
    async fn render(&self, message: &InboundMessage) -> bool {
        match normalize(&message.data) {
            Ok(n) => self.renderer.render(&n).await,
            Err(reason) => {
                info!(id = ?message.message_id, reason = %reason, "Payload rejected, no notification shown");
                false
            }
        }
    }
}
