//! 通知构建与渲染
//!
//! - `model`: 平台无关的通知描述（标题、图标、点击行为、动作按钮）
//! - `relative_time`: "3 minutes ago" 风格的相对时间
//! - `large_icon`: 大图标解析（远程图片 → 应用图标 → 无）
//! - `renderer`: 把规范化 payload 变成系统通知

pub mod large_icon;
pub mod model;
pub mod relative_time;
pub mod renderer;

pub use large_icon::{FetchError, IconFetcher};
pub use model::{
    ActionIntent, ActionKind, Category, ContentIntent, IconSource, LargeIcon, Notification, NotificationAction,
    Priority, RemoteInput,
};
pub use relative_time::format_relative_time;
pub use renderer::NotificationRenderer;
