//! 插件构建器 - 组装平台协作者、配置和共享状态

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::bridge::{ActionReconciler, BridgeState, DeliveryRouter};
use crate::config::BridgeConfig;
use crate::notification::NotificationRenderer;
use crate::platform::{HostPackage, NotificationManager, PermissionProvider, TokenProvider};
use crate::plugin::PushNotificationsPlugin;

/// 插件构建器
#[derive(Default)]
pub struct BridgeBuilder {
    config: BridgeConfig,
    state: Option<Arc<BridgeState>>,
    manager: Option<Arc<dyn NotificationManager>>,
    host: Option<Arc<dyn HostPackage>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    permissions: Option<Arc<dyn PermissionProvider>>,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// 共享状态，未设置时使用进程级实例
    pub fn state(mut self, state: Arc<BridgeState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn notification_manager(mut self, manager: Arc<dyn NotificationManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn host_package(mut self, host: Arc<dyn HostPackage>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn permissions(mut self, permissions: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn build(self) -> Result<PushNotificationsPlugin> {
        let manager = self.manager.ok_or_else(|| anyhow!("notification manager not configured"))?;
        let host = self.host.ok_or_else(|| anyhow!("host package not configured"))?;
        let tokens = self.tokens.ok_or_else(|| anyhow!("token provider not configured"))?;
        let permissions = self.permissions.ok_or_else(|| anyhow!("permission provider not configured"))?;
        let state = self.state.unwrap_or_else(BridgeState::global);

        let renderer = NotificationRenderer::new(manager.clone(), host, &self.config)?;
        let router = DeliveryRouter::new(state.clone(), Arc::new(renderer), self.config.render_policy);
        let reconciler = ActionReconciler::new(state.clone(), manager.clone());

        info!(render_policy = ?self.config.render_policy, "Push bridge initialized");

        Ok(PushNotificationsPlugin::new(
            state,
            router,
            reconciler,
            manager,
            tokens,
            permissions,
        ))
    }
}
