//! 桥接配置
//!
//! 读取优先级：
//! 1. 环境变量 `PUSH_BRIDGE_IMAGE_TIMEOUT_MS`（同时设置连接和读取超时）、`PUSH_BRIDGE_RENDER_POLICY`
//! 2. 配置文件 `~/.config/push-bridge/config.json`
//! 3. 默认值

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::notification::model::COLOR_GREEN;

/// 默认图片连接/读取超时（毫秒）
pub const DEFAULT_IMAGE_TIMEOUT_MS: u64 = 5000;

/// 渲染策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPolicy {
    /// 每条消息都渲染一次，与 consumer 是否在线无关
    #[default]
    Always,
    /// 只在没有 consumer 时渲染（由 Web 层自行展示）
    WhenDetached,
}

impl RenderPolicy {
    pub fn should_render(&self, consumer_present: bool) -> bool {
        match self {
            RenderPolicy::Always => true,
            RenderPolicy::WhenDetached => !consumer_present,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "always" => Some(RenderPolicy::Always),
            "when_detached" => Some(RenderPolicy::WhenDetached),
            _ => None,
        }
    }
}

/// 桥接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 图片下载连接超时（毫秒）
    pub image_connect_timeout_ms: u64,
    /// 图片下载读取超时（毫秒）
    pub image_read_timeout_ms: u64,
    /// 通知强调色（ARGB）
    pub accent_color: u32,
    pub render_policy: RenderPolicy,
    /// 点击通知打开的主界面
    pub main_activity: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            image_connect_timeout_ms: DEFAULT_IMAGE_TIMEOUT_MS,
            image_read_timeout_ms: DEFAULT_IMAGE_TIMEOUT_MS,
            accent_color: COLOR_GREEN,
            render_policy: RenderPolicy::Always,
            main_activity: "MainActivity".to_string(),
        }
    }
}

impl BridgeConfig {
    /// 默认配置文件路径
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("push-bridge")
            .join("config.json")
    }

    /// 从默认路径加载并应用环境变量
    pub fn auto_load() -> Result<Self> {
        let mut config = Self::load_from(&Self::path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 从文件加载；文件不存在时返回默认配置
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("PUSH_BRIDGE_IMAGE_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => {
                    self.image_connect_timeout_ms = ms;
                    self.image_read_timeout_ms = ms;
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid PUSH_BRIDGE_IMAGE_TIMEOUT_MS"),
            }
        }

        if let Some(raw) = lookup("PUSH_BRIDGE_RENDER_POLICY") {
            match RenderPolicy::parse(&raw) {
                Some(policy) => self.render_policy = policy,
                None => warn!(value = %raw, "Ignoring invalid PUSH_BRIDGE_RENDER_POLICY"),
            }
        }
    }

    pub fn image_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.image_connect_timeout_ms)
    }

    /// 图片下载的整体截止时间（连接 + 读取）
    pub fn image_deadline(&self) -> Duration {
        Duration::from_millis(self.image_connect_timeout_ms.saturating_add(self.image_read_timeout_ms))
    }
}
