//! 通知渲染器 - 把规范化 payload 变成系统通知
//!
//! `badge_count == 0` 是清空哨兵：取消本应用全部通知，不构建通知对象。
//! 渲染过程中的任何失败都在这里被捕获并记录，只返回 false，不向调用方传播。

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::large_icon::{resolve_large_icon, IconFetcher};
use super::model::{ContentIntent, Notification, NotificationAction, Priority, DEFAULT_SMALL_ICON};
use super::relative_time::format_relative_time;
use crate::config::BridgeConfig;
use crate::payload::NormalizedNotification;
use crate::platform::{HostPackage, NotificationManager, PackageMetadata};

/// 通知渲染器
pub struct NotificationRenderer {
    manager: Arc<dyn NotificationManager>,
    host: Arc<dyn HostPackage>,
    fetcher: IconFetcher,
    accent_color: u32,
    main_activity: String,
}

impl NotificationRenderer {
    pub fn new(
        manager: Arc<dyn NotificationManager>,
        host: Arc<dyn HostPackage>,
        config: &BridgeConfig,
    ) -> Result<Self> {
        let fetcher = IconFetcher::new(config.image_connect_timeout(), config.image_deadline())?;
        Ok(Self {
            manager,
            host,
            fetcher,
            accent_color: config.accent_color,
            main_activity: config.main_activity.clone(),
        })
    }

    /// 渲染通知，返回是否成功
    ///
    /// 图片下载会等待截止时间，调用方不应在 UI 线程上 await。
    pub async fn render(&self, n: &NormalizedNotification) -> bool {
        if n.badge_count == 0 {
            self.manager.cancel_all();
            info!(notification_id = n.notification_id, "Badge count is zero, cleared all notifications");
            return true;
        }

        match self.show(n).await {
            Ok(notification) => {
                info!(
                    notification_id = notification.id,
                    channel = %notification.channel_id,
                    actions = notification.actions.len(),
                    large_icon = notification.large_icon.is_some(),
                    "Notification displayed"
                );
                true
            }
            Err(e) => {
                error!(notification_id = n.notification_id, error = %e, "Error creating notification");
                false
            }
        }
    }

    async fn show(&self, n: &NormalizedNotification) -> Result<Notification> {
        let notification = self.build(n).await;
        self.manager.notify(&notification)?;
        Ok(notification)
    }

    /// 构建通知描述（不显示）
    pub async fn build(&self, n: &NormalizedNotification) -> Notification {
        let metadata = self.package_metadata();

        let small_icon = metadata
            .as_ref()
            .and_then(|m| m.default_notification_icon.clone())
            .unwrap_or_else(|| DEFAULT_SMALL_ICON.to_string());

        let when = n
            .epoch_seconds
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        let sub_text = when.map(|w| format_relative_time(w.timestamp(), Utc::now()));

        let large_icon = resolve_large_icon(
            &self.fetcher,
            n.image_url.as_deref(),
            metadata.as_ref().and_then(|m| m.app_icon.as_ref()),
        )
        .await;

        let actions = NotificationAction::for_category(n.category.as_ref(), n.notification_id, &n.data);
        if !actions.is_empty() {
            debug!(
                notification_id = n.notification_id,
                category = ?n.category.as_ref().map(|c| c.as_str()),
                "Added notification actions"
            );
        }

        Notification {
            id: n.notification_id,
            channel_id: n.channel_id.clone(),
            title: n.title.clone(),
            body: n.body.clone(),
            small_icon,
            priority: Priority::Default,
            auto_cancel: true,
            color: self.accent_color,
            content_intent: ContentIntent {
                activity: self.main_activity.clone(),
                clear_top: true,
                request_code: n.notification_id,
            },
            show_when: when.is_some(),
            when,
            sub_text,
            large_icon,
            actions,
            extras: n.data.clone(),
        }
    }

    /// 包信息缺失不致命，回退到默认图标
    fn package_metadata(&self) -> Option<PackageMetadata> {
        match self.host.metadata() {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(error = %e, "Package metadata unavailable, using default icon");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::model::{ActionKind, Category, IconSource};
    use crate::payload::normalize;
    use crate::platform::memory::{InMemoryNotificationManager, StaticHostPackage};
    use std::collections::BTreeMap;

    fn payload(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        let mut raw: BTreeMap<String, String> = [
            ("channel_id", "c1"),
            ("title", "Hi"),
            ("message", "Hello"),
            ("count", "1"),
            ("notId", "42"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            raw.insert(k.to_string(), v.to_string());
        }
        raw
    }

    fn renderer(
        manager: Arc<InMemoryNotificationManager>,
        host: StaticHostPackage,
    ) -> NotificationRenderer {
        let config = BridgeConfig {
            image_connect_timeout_ms: 200,
            image_read_timeout_ms: 200,
            ..Default::default()
        };
        NotificationRenderer::new(manager, Arc::new(host), &config).unwrap()
    }

    #[tokio::test]
    async fn test_render_basic_notification() {
        let manager = Arc::new(InMemoryNotificationManager::new());
        let r = renderer(manager.clone(), StaticHostPackage::new("org.example.app"));

        let n = normalize(&payload(&[])).unwrap();
        assert!(r.render(&n).await);

        let shown = manager.shown(42).unwrap();
        assert_eq!(shown.title, "Hi");
        assert_eq!(shown.body, "Hello");
        assert_eq!(shown.channel_id, "c1");
        assert_eq!(shown.priority, Priority::Default);
        assert!(shown.auto_cancel);
        assert_eq!(shown.color, 0xFF00FF00);
        assert!(shown.content_intent.clear_top);
        assert_eq!(shown.content_intent.request_code, 42);
        assert!(shown.actions.is_empty());
        assert!(!shown.show_when);
        assert!(shown.sub_text.is_none());
        assert_eq!(shown.small_icon, DEFAULT_SMALL_ICON);
    }

    #[tokio::test]
    async fn test_zero_count_clears_all_without_building() {
        let manager = Arc::new(InMemoryNotificationManager::new());
        let r = renderer(manager.clone(), StaticHostPackage::new("org.example.app"));

        let n = normalize(&payload(&[("count", "0"), ("category", "CHAT_MESSAGE")])).unwrap();
        assert!(r.render(&n).await);
        assert_eq!(manager.cancel_all_calls(), 1);
        assert!(manager.shown_ids().is_empty());
    }

    #[tokio::test]
    async fn test_chat_message_has_two_actions() {
        let manager = Arc::new(InMemoryNotificationManager::new());
        let r = renderer(manager.clone(), StaticHostPackage::new("org.example.app"));

        let n = normalize(&payload(&[("category", "CHAT_MESSAGE"), ("chatid", "9")])).unwrap();
        assert_eq!(n.category, Some(Category::ChatMessage));
        assert!(r.render(&n).await);

        let shown = manager.shown(42).unwrap();
        let kinds: Vec<ActionKind> = shown.actions.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Reply, ActionKind::MarkRead]);
        assert_eq!(shown.actions[0].intent.data.get("chatid").map(String::as_str), Some("9"));
    }

    #[tokio::test]
    async fn test_unknown_category_still_shown() {
        let manager = Arc::new(InMemoryNotificationManager::new());
        let r = renderer(manager.clone(), StaticHostPackage::new("org.example.app"));

        let n = normalize(&payload(&[("category", "FUTURE_KIND")])).unwrap();
        assert!(r.render(&n).await);
        assert!(manager.shown(42).unwrap().actions.is_empty());
    }

    #[tokio::test]
    async fn test_timestamp_sets_when_and_relative_text() {
        let manager = Arc::new(InMemoryNotificationManager::new());
        let r = renderer(manager.clone(), StaticHostPackage::new("org.example.app"));

        let two_hours_ago = (Utc::now().timestamp() - 7200).to_string();
        let n = normalize(&payload(&[("timestamp", two_hours_ago.as_str())])).unwrap();
        assert!(r.render(&n).await);

        let shown = manager.shown(42).unwrap();
        assert!(shown.show_when);
        assert!(shown.when.is_some());
        assert_eq!(shown.sub_text.as_deref(), Some("2 hours ago"));
    }

    #[tokio::test]
    async fn test_missing_package_is_not_fatal() {
        let manager = Arc::new(InMemoryNotificationManager::new());
        let r = renderer(manager.clone(), StaticHostPackage::missing("org.example.app"));

        let n = normalize(&payload(&[])).unwrap();
        assert!(r.render(&n).await);

        let shown = manager.shown(42).unwrap();
        assert_eq!(shown.small_icon, DEFAULT_SMALL_ICON);
        assert!(shown.large_icon.is_none());
    }

    #[tokio::test]
    async fn test_metadata_icons_used() {
        let manager = Arc::new(InMemoryNotificationManager::new());
        let host = StaticHostPackage::new("org.example.app")
            .with_small_icon("ic_stat_push")
            .with_app_icon(StaticHostPackage::solid_icon(32, 32).unwrap());
        let r = renderer(manager.clone(), host);

        // 不可达地址：下载失败后回退到应用图标
        let n = normalize(&payload(&[("image", "http://127.0.0.1:1/a.png")])).unwrap();
        assert!(r.render(&n).await);

        let shown = manager.shown(42).unwrap();
        assert_eq!(shown.small_icon, "ic_stat_push");
        let icon = shown.large_icon.unwrap();
        assert_eq!(icon.source, IconSource::AppIcon);
        assert_eq!(icon.bitmap.dimensions(), (32, 32));
    }

    #[tokio::test]
    async fn test_notify_failure_returns_false() {
        let manager = Arc::new(InMemoryNotificationManager::new());
        manager.set_fail_notify(true);
        let r = renderer(manager.clone(), StaticHostPackage::new("org.example.app"));

        let n = normalize(&payload(&[])).unwrap();
        assert!(!r.render(&n).await);
        assert!(manager.shown_ids().is_empty());
    }
}
