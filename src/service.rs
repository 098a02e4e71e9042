//! 系统回调入口 - 推送服务回调和开机广播

use std::sync::Arc;

use tracing::{info, warn};

use crate::boot_log::{BootLog, BootRecord};
use crate::payload::InboundMessage;
use crate::platform::TokenProvider;
use crate::plugin::PushNotificationsPlugin;

/// 推送服务回调
///
/// 回调可能在应用界面未启动时到达，渲染和缓存都由插件内的路由器完成。
pub struct MessagingService {
    plugin: Arc<PushNotificationsPlugin>,
}

impl MessagingService {
    pub fn new(plugin: Arc<PushNotificationsPlugin>) -> Self {
        Self { plugin }
    }

    pub async fn on_message_received(&self, message: InboundMessage) -> bool {
        info!(id = ?message.message_id, keys = message.data.len(), "Push message received");
        self.plugin.on_message(message).await
    }

    pub fn on_new_token(&self, token: &str) -> bool {
        info!("Push token refreshed");
        self.plugin.on_new_token(token)
    }
}

/// 开机广播接收器
pub struct BootReceiver {
    tokens: Arc<dyn TokenProvider>,
    log: BootLog,
}

impl BootReceiver {
    pub fn new(tokens: Arc<dyn TokenProvider>, log: BootLog) -> Self {
        Self { tokens, log }
    }

    /// 记录开机并重新获取 token，返回获取到的 token
    pub fn on_boot_completed(&self) -> Option<String> {
        if let Err(e) = self.log.append(&BootRecord::now("boot_completed", None)) {
            warn!(error = %e, path = %self.log.path().display(), "Failed to write boot log");
        }

        self.tokens.set_auto_init_enabled(true);
        match self.tokens.fetch_token() {
            Ok(token) => {
                info!("Token available after boot");
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "Token fetch after boot failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::StaticTokenProvider;
    use tempfile::TempDir;

    #[test]
    fn test_boot_logs_and_fetches_token() {
        let dir = TempDir::new().unwrap();
        let log = BootLog::new(dir.path().join("boot_log.jsonl"));
        let tokens = Arc::new(StaticTokenProvider::new(Some("tok-1")));
        let receiver = BootReceiver::new(tokens.clone(), log.clone());

        assert_eq!(receiver.on_boot_completed().as_deref(), Some("tok-1"));
        assert!(tokens.auto_init_enabled());
        assert_eq!(receiver.on_boot_completed().as_deref(), Some("tok-1"));
        assert_eq!(log.read_all().len(), 2);
    }

    #[test]
    fn test_boot_log_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        // 父路径是普通文件，无法创建目录
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let log = BootLog::new(blocker.join("boot_log.jsonl"));

        let receiver = BootReceiver::new(Arc::new(StaticTokenProvider::new(None)), log);
        assert!(receiver.on_boot_completed().is_none());
    }
}
