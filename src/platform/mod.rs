//! 平台协作者 trait 定义
//!
//! 通知管理器、宿主包信息、推送 token、权限和 Web 层 consumer 都由宿主实现，
//! 核心逻辑只通过这些 trait 调用平台。

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::Notification;

/// 通知栏中当前显示的通知
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredNotification {
    pub id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub group_summary: bool,
    /// 通知携带的附加数据
    #[serde(rename = "data")]
    pub extras: BTreeMap<String, String>,
}

/// 通知渠道定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 重要程度 1-5
    #[serde(default = "default_importance")]
    pub importance: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default)]
    pub vibration: bool,
    #[serde(default)]
    pub lights: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_color: Option<String>,
}

fn default_importance() -> u8 {
    3
}

/// 系统通知管理器
pub trait NotificationManager: Send + Sync {
    /// 显示（或替换同 id 的）通知
    fn notify(&self, notification: &Notification) -> Result<()>;

    /// 取消指定 id 的通知；id 不存在时无副作用
    fn cancel(&self, id: i32);

    /// 取消带 tag 的通知
    fn cancel_tagged(&self, tag: &str, id: i32);

    /// 取消本应用的全部通知
    fn cancel_all(&self);

    /// 当前显示中的通知
    fn active_notifications(&self) -> Vec<DeliveredNotification>;

    fn create_channel(&self, channel: &ChannelSpec) -> Result<()>;

    fn delete_channel(&self, channel_id: &str) -> Result<()>;

    fn list_channels(&self) -> Vec<ChannelSpec>;
}

/// 宿主包信息查询错误
#[derive(Debug, Error)]
pub enum HostError {
    #[error("package not found: {0}")]
    NameNotFound(String),
}

/// 应用图标资源（编码后的图片 + 固有尺寸）
#[derive(Debug, Clone)]
pub struct IconResource {
    pub bytes: Vec<u8>,
    pub intrinsic_width: u32,
    pub intrinsic_height: u32,
}

/// 宿主包元数据
#[derive(Debug, Clone, Default)]
pub struct PackageMetadata {
    pub package_name: String,
    /// manifest 中配置的默认小图标
    pub default_notification_icon: Option<String>,
    pub app_icon: Option<IconResource>,
}

/// 宿主包信息
pub trait HostPackage: Send + Sync {
    fn metadata(&self) -> Result<PackageMetadata, HostError>;
}

/// 推送 token 签发
pub trait TokenProvider: Send + Sync {
    fn set_auto_init_enabled(&self, enabled: bool);

    /// 获取当前 token（必要时向推送服务申请）
    fn fetch_token(&self) -> Result<String>;

    fn delete_token(&self) -> Result<()>;
}

/// 通知权限状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

/// 通知权限查询
pub trait PermissionProvider: Send + Sync {
    /// 平台是否需要运行时授权（旧系统版本默认授予）
    fn requires_runtime_permission(&self) -> bool;

    fn state(&self) -> PermissionState;

    /// 弹出授权请求并返回结果
    fn request(&self) -> PermissionState;
}

/// Web 层 consumer（插件桥实例）
pub trait Consumer: Send + Sync {
    /// 向 JS 监听者发送事件；`retain` 为 true 时无监听者也会保留到注册
    fn notify_listeners(&self, event: &str, data: serde_json::Value, retain: bool);
}
