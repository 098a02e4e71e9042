//! Push Bridge - 远程推送消息到 Web 层的桥接
//!
//! 接收远程推送（无论应用处于前台、后台还是已被杀死），规范化 payload，
//! 渲染系统通知，并把结构化事件转发给 Web 层；Web 层尚未就绪时缓存待重放。

pub mod boot_log;
pub mod bridge;
pub mod builder;
pub mod config;
pub mod notification;
pub mod payload;
pub mod platform;
pub mod plugin;
pub mod service;

pub use boot_log::{BootLog, BootRecord};
pub use bridge::{
    ActionId, ActionOutcome, ActionPerformed, ActionReconciler, BridgeState, DeliveryRouter, Drained,
    NotificationReceived, PendingState, ReceivedAction,
};
pub use builder::BridgeBuilder;
pub use config::{BridgeConfig, RenderPolicy};
pub use notification::{format_relative_time, Category, Notification, NotificationAction, NotificationRenderer};
pub use payload::{normalize, InboundMessage, NormalizedNotification, RejectedPayload, RemoteNotification};
pub use platform::{
    ChannelSpec, Consumer, DeliveredNotification, HostError, HostPackage, IconResource, NotificationManager,
    PackageMetadata, PermissionProvider, PermissionState, TokenProvider,
};
pub use plugin::PushNotificationsPlugin;
pub use service::{BootReceiver, MessagingService};
