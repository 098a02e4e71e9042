//! pushctl - Push Bridge 调试工具
//!
//! 用内存平台实现回放推送/动作/连接序列，查看规范化结果和相对时间文本。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use push_bridge::platform::memory::{
    FixedPermissions, InMemoryNotificationManager, StaticHostPackage, StaticTokenProvider,
};
use push_bridge::{
    format_relative_time, normalize, BootLog, BootReceiver, BridgeBuilder, BridgeConfig, BridgeState, Consumer,
    InboundMessage, MessagingService, ReceivedAction, RemoteNotification,
};

#[derive(Parser)]
#[command(name = "pushctl")]
#[command(about = "Push Bridge - 推送通知桥接调试工具")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 回放脚本中的推送、动作和连接序列，输出事件 JSON 行
    Simulate {
        /// 脚本文件 (JSON)
        script: PathBuf,
        /// 配置文件路径 (默认: ~/.config/push-bridge/config.json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// 开机日志路径 (默认: ~/.config/push-bridge/boot_log.jsonl)
        #[arg(long)]
        boot_log: Option<PathBuf>,
    },
    /// 规范化 payload 并输出结果
    Normalize {
        /// payload 文件 (扁平 JSON 对象)
        payload: PathBuf,
    },
    /// 输出 epoch 秒对应的相对时间文本
    RelativeTime {
        /// epoch 秒
        #[arg(allow_hyphen_values = true)]
        epoch: i64,
    },
}

/// 模拟脚本
#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default = "default_package")]
    package: String,
    /// 签发的 token，缺省时获取失败
    #[serde(default)]
    token: Option<String>,
    steps: Vec<Step>,
}

fn default_package() -> String {
    "org.example.app".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Step {
    Message {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        data: BTreeMap<String, String>,
        #[serde(default)]
        notification: Option<RemoteNotification>,
    },
    Attach,
    Detach,
    Action {
        action: String,
        notification_id: i32,
        #[serde(default)]
        data: BTreeMap<String, String>,
        #[serde(default)]
        reply_text: Option<String>,
    },
    Intent {
        extras: BTreeMap<String, String>,
    },
    Register,
    Token {
        value: String,
    },
    Boot,
    Delivered,
}

/// 把事件打印为 JSON 行的 consumer
struct StdoutConsumer;

impl Consumer for StdoutConsumer {
    fn notify_listeners(&self, event: &str, data: Value, _retain: bool) {
        println!("{}", json!({ "event": event, "data": data }));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("push_bridge=info,pushctl=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            script,
            config,
            boot_log,
        } => {
            let config = match config {
                Some(path) => {
                    let mut config = BridgeConfig::load_from(&path)?;
                    config.apply_env_overrides(|key| std::env::var(key).ok());
                    config
                }
                None => BridgeConfig::auto_load()?,
            };
            let boot_log = boot_log.map(BootLog::new).unwrap_or_default();
            simulate(&script, config, boot_log).await?;
        }
        Commands::Normalize { payload } => {
            let raw: BTreeMap<String, String> = read_json(&payload)?;
            match normalize(&raw) {
                Ok(n) => println!("{}", serde_json::to_string_pretty(&n)?),
                Err(reason) => println!("{}", json!({ "rejected": reason.to_string() })),
            }
        }
        Commands::RelativeTime { epoch } => {
            println!("{}", format_relative_time(epoch, chrono::Utc::now()));
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn simulate(path: &Path, config: BridgeConfig, boot_log: BootLog) -> Result<()> {
    let script: Script = read_json(path)?;
    info!(steps = script.steps.len(), package = %script.package, "Running simulation");

    let manager = Arc::new(InMemoryNotificationManager::new());
    let tokens = Arc::new(StaticTokenProvider::new(script.token.as_deref()));
    let plugin = Arc::new(
        BridgeBuilder::new()
            .config(config)
            .state(Arc::new(BridgeState::new()))
            .notification_manager(manager.clone())
            .host_package(Arc::new(StaticHostPackage::new(script.package.clone())))
            .token_provider(tokens.clone())
            .permissions(Arc::new(FixedPermissions::legacy()))
            .build()?,
    );
    let service = MessagingService::new(plugin.clone());
    let boot = BootReceiver::new(tokens, boot_log);
    let consumer: Arc<dyn Consumer> = Arc::new(StdoutConsumer);

    for (index, step) in script.steps.into_iter().enumerate() {
        debug!(index, step = ?step, "Simulation step");
        match step {
            Step::Message { id, data, notification } => {
                let message = InboundMessage {
                    message_id: id,
                    data,
                    notification,
                };
                service.on_message_received(message).await;
            }
            Step::Attach => {
                plugin.load(&consumer);
            }
            Step::Detach => plugin.detach(),
            Step::Action {
                action,
                notification_id,
                data,
                reply_text,
            } => {
                let outcome = plugin.on_action(ReceivedAction {
                    action,
                    notification_id,
                    data,
                    reply_text,
                });
                debug!(outcome = ?outcome, "Action handled");
            }
            Step::Intent { extras } => {
                plugin.handle_new_intent(&extras);
            }
            Step::Register => plugin.register(),
            Step::Token { value } => {
                service.on_new_token(&value);
            }
            Step::Boot => {
                boot.on_boot_completed();
            }
            Step::Delivered => {
                println!("{}", json!({ "delivered": plugin.get_delivered_notifications() }));
            }
        }
    }

    info!(shown = ?manager.shown_ids(), "Simulation finished");
    Ok(())
}
