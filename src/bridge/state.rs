//! 进程级共享状态 - 当前 consumer 和待重放槽位
//!
//! 两个槽位各最多保存一条：新到达的覆盖旧的（后写者胜，不排队）。
//! consumer 只以弱引用持有，consumer 被销毁后等同于未连接。
//!
//! consumer 的切换和槽位读写在同一把锁下完成，保证"无 consumer 时写入槽位"
//! 与"连接时清空槽位"不会交错丢失更新。

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, Weak};

use tracing::{debug, info};

use super::events::ActionPerformed;
use crate::payload::InboundMessage;
use crate::platform::Consumer;

/// 待重放槽位
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingState {
    pub last_unconsumed_message: Option<InboundMessage>,
    pub last_unconsumed_action: Option<ActionPerformed>,
}

impl PendingState {
    pub fn set_message(&mut self, message: InboundMessage) {
        if self.last_unconsumed_message.is_some() {
            debug!("Overwriting previous pending message");
        }
        self.last_unconsumed_message = Some(message);
    }

    pub fn set_action(&mut self, action: ActionPerformed) {
        if self.last_unconsumed_action.is_some() {
            debug!("Overwriting previous pending action");
        }
        self.last_unconsumed_action = Some(action);
    }

    fn take(&mut self) -> Drained {
        Drained {
            message: self.last_unconsumed_message.take(),
            action: self.last_unconsumed_action.take(),
        }
    }
}

/// 一次 drain 取出的内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drained {
    pub message: Option<InboundMessage>,
    pub action: Option<ActionPerformed>,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.action.is_none()
    }
}

/// 共享状态
#[derive(Default)]
pub struct BridgeState {
    consumer: RwLock<Option<Weak<dyn Consumer>>>,
    pending: Mutex<PendingState>,
}

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级实例（宿主胶水代码使用，测试应自行构造）
    pub fn global() -> Arc<BridgeState> {
        static GLOBAL: OnceLock<Arc<BridgeState>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(BridgeState::new())).clone()
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingState> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 当前在线的 consumer
    pub fn active_consumer(&self) -> Option<Arc<dyn Consumer>> {
        self.consumer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// 连接 consumer 并取出待重放内容
    pub fn attach(&self, consumer: &Arc<dyn Consumer>) -> Drained {
        let mut pending = self.lock_pending();
        *self.consumer.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(consumer));
        let drained = pending.take();
        info!(
            pending_message = drained.message.is_some(),
            pending_action = drained.action.is_some(),
            "Consumer attached"
        );
        drained
    }

    pub fn detach(&self) {
        let _pending = self.lock_pending();
        *self.consumer.write().unwrap_or_else(PoisonError::into_inner) = None;
        info!("Consumer detached");
    }

    /// 清空两个槽位并返回原内容
    pub fn drain(&self) -> Drained {
        self.lock_pending().take()
    }

    pub fn set_pending_message(&self, message: InboundMessage) {
        self.lock_pending().set_message(message);
    }

    pub fn set_pending_action(&self, action: ActionPerformed) {
        self.lock_pending().set_action(action);
    }

    pub fn pending(&self) -> PendingState {
        self.lock_pending().clone()
    }

    /// 有 consumer 时交还 item 供转发，否则在锁内写入槽位
    pub(crate) fn forward_or_buffer<T>(
        &self,
        item: T,
        buffer: impl FnOnce(&mut PendingState, T),
    ) -> Option<(Arc<dyn Consumer>, T)> {
        let mut pending = self.lock_pending();
        match self.active_consumer() {
            Some(consumer) => Some((consumer, item)),
            None => {
                buffer(&mut pending, item);
                None
            }
        }
    }
}
