//! 内存中的平台实现
//!
//! 供 `pushctl simulate` 和测试使用：记录所有调用，不接触真实系统服务。

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageError, ImageFormat, Rgba, RgbaImage};
use serde_json::Value;

use super::{
    ChannelSpec, Consumer, DeliveredNotification, HostError, HostPackage, IconResource, NotificationManager,
    PackageMetadata, PermissionProvider, PermissionState, TokenProvider,
};
use crate::notification::Notification;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 内存通知管理器
#[derive(Default)]
pub struct InMemoryNotificationManager {
    shown: Mutex<BTreeMap<i32, Notification>>,
    cancelled: Mutex<Vec<i32>>,
    notify_calls: AtomicUsize,
    cancel_all_calls: AtomicUsize,
    channels: Mutex<BTreeMap<String, ChannelSpec>>,
    fail_notify: AtomicBool,
}

impl InMemoryNotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让后续 notify 调用失败
    pub fn set_fail_notify(&self, fail: bool) {
        self.fail_notify.store(fail, Ordering::SeqCst);
    }

    pub fn shown(&self, id: i32) -> Option<Notification> {
        lock(&self.shown).get(&id).cloned()
    }

    pub fn shown_ids(&self) -> Vec<i32> {
        lock(&self.shown).keys().copied().collect()
    }

    /// 成功 notify 的次数（含替换）
    pub fn notify_calls(&self) -> usize {
        self.notify_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_all_calls(&self) -> usize {
        self.cancel_all_calls.load(Ordering::SeqCst)
    }

    pub fn cancelled_ids(&self) -> Vec<i32> {
        lock(&self.cancelled).clone()
    }
}

impl NotificationManager for InMemoryNotificationManager {
    fn notify(&self, notification: &Notification) -> Result<()> {
        if self.fail_notify.load(Ordering::SeqCst) {
            return Err(anyhow!("notification manager unavailable"));
        }
        self.notify_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.shown).insert(notification.id, notification.clone());
        Ok(())
    }

    fn cancel(&self, id: i32) {
        lock(&self.shown).remove(&id);
        lock(&self.cancelled).push(id);
    }

    fn cancel_tagged(&self, _tag: &str, id: i32) {
        self.cancel(id);
    }

    fn cancel_all(&self) {
        self.cancel_all_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.shown).clear();
    }

    fn active_notifications(&self) -> Vec<DeliveredNotification> {
        lock(&self.shown)
            .values()
            .map(|n| DeliveredNotification {
                id: n.id,
                tag: None,
                title: Some(n.title.clone()),
                body: Some(n.body.clone()),
                group: None,
                group_summary: false,
                extras: n.extras.clone(),
            })
            .collect()
    }

    fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
        lock(&self.channels).insert(channel.id.clone(), channel.clone());
        Ok(())
    }

    fn delete_channel(&self, channel_id: &str) -> Result<()> {
        lock(&self.channels).remove(channel_id);
        Ok(())
    }

    fn list_channels(&self) -> Vec<ChannelSpec> {
        lock(&self.channels).values().cloned().collect()
    }
}

/// 固定的宿主包信息
pub struct StaticHostPackage {
    package_name: String,
    metadata: Option<PackageMetadata>,
}

impl StaticHostPackage {
    pub fn new(package_name: impl Into<String>) -> Self {
        let package_name = package_name.into();
        Self {
            metadata: Some(PackageMetadata {
                package_name: package_name.clone(),
                default_notification_icon: None,
                app_icon: None,
            }),
            package_name,
        }
    }

    /// 查询时返回 `NameNotFound`
    pub fn missing(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            metadata: None,
        }
    }

    pub fn with_small_icon(mut self, icon: impl Into<String>) -> Self {
        if let Some(m) = self.metadata.as_mut() {
            m.default_notification_icon = Some(icon.into());
        }
        self
    }

    pub fn with_app_icon(mut self, icon: IconResource) -> Self {
        if let Some(m) = self.metadata.as_mut() {
            m.app_icon = Some(icon);
        }
        self
    }

    /// 纯色 PNG 图标
    pub fn solid_icon(width: u32, height: u32) -> Result<IconResource, ImageError> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 160, 80, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(IconResource {
            bytes,
            intrinsic_width: width,
            intrinsic_height: height,
        })
    }
}

impl HostPackage for StaticHostPackage {
    fn metadata(&self) -> Result<PackageMetadata, HostError> {
        self.metadata
            .clone()
            .ok_or_else(|| HostError::NameNotFound(self.package_name.clone()))
    }
}

/// 记录所有事件的 consumer
#[derive(Default)]
pub struct RecordingConsumer {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        lock(&self.events).clone()
    }

    pub fn events_named(&self, name: &str) -> Vec<Value> {
        lock(&self.events)
            .iter()
            .filter(|(event, _)| event == name)
            .map(|(_, data)| data.clone())
            .collect()
    }
}

impl Consumer for RecordingConsumer {
    fn notify_listeners(&self, event: &str, data: Value, _retain: bool) {
        lock(&self.events).push((event.to_string(), data));
    }
}

/// 固定 token 的签发器；`token` 为 None 时获取失败
pub struct StaticTokenProvider {
    token: Option<String>,
    auto_init: AtomicBool,
    deleted: AtomicBool,
}

impl StaticTokenProvider {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: token.map(str::to_string),
            auto_init: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn auto_init_enabled(&self) -> bool {
        self.auto_init.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }
}

impl TokenProvider for StaticTokenProvider {
    fn set_auto_init_enabled(&self, enabled: bool) {
        self.auto_init.store(enabled, Ordering::SeqCst);
    }

    fn fetch_token(&self) -> Result<String> {
        self.token
            .clone()
            .ok_or_else(|| anyhow!("SERVICE_NOT_AVAILABLE"))
    }

    fn delete_token(&self) -> Result<()> {
        self.deleted.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 固定权限状态；请求时按 `grant_on_request` 决定结果
pub struct FixedPermissions {
    runtime: bool,
    state: Mutex<PermissionState>,
    grant_on_request: bool,
}

impl FixedPermissions {
    pub fn new(runtime: bool, state: PermissionState, grant_on_request: bool) -> Self {
        Self {
            runtime,
            state: Mutex::new(state),
            grant_on_request,
        }
    }

    /// 无需运行时授权的平台
    pub fn legacy() -> Self {
        Self::new(false, PermissionState::Granted, true)
    }
}

impl PermissionProvider for FixedPermissions {
    fn requires_runtime_permission(&self) -> bool {
        self.runtime
    }

    fn state(&self) -> PermissionState {
        *lock(&self.state)
    }

    fn request(&self) -> PermissionState {
        let mut state = lock(&self.state);
        *state = if self.grant_on_request {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        *state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_icon_decodes_to_intrinsic_size() {
        let icon = StaticHostPackage::solid_icon(24, 16).unwrap();
        let decoded = image::load_from_memory(&icon.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
        assert_eq!((icon.intrinsic_width, icon.intrinsic_height), (24, 16));
    }

    #[test]
    fn test_missing_host_package() {
        let host = StaticHostPackage::missing("org.example.gone");
        assert!(matches!(host.metadata(), Err(HostError::NameNotFound(name)) if name == "org.example.gone"));
    }
}
