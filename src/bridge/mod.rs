//! 投递状态协调
//!
//! - `router`: 入站消息 → 渲染 + 转发/缓存
//! - `actions`: 通知动作 → 取消 + 转发/缓存
//! - `state`: consumer 弱引用与待重放槽位
//! - `events`: 发往 Web 层的事件结构

pub mod actions;
pub mod events;
pub mod router;
pub mod state;

pub use actions::{ActionOutcome, ActionReconciler, ReceivedAction};
pub use events::{
    ActionId, ActionNotification, ActionPerformed, NotificationReceived, EVENT_ACTION_PERFORMED,
    EVENT_NOTIFICATION_RECEIVED, EVENT_REGISTRATION, EVENT_REGISTRATION_ERROR,
};
pub use router::DeliveryRouter;
pub use state::{BridgeState, Drained, PendingState};
