//! 开机日志 - 每次开机回调追加一行 JSONL
//!
//! 仅用于排查开机后 token 刷新问题，写入失败不影响主流程。

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// 开机日志记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootRecord {
    pub ts: DateTime<Utc>,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BootRecord {
    pub fn now(event: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            ts: Utc::now(),
            event: event.into(),
            detail,
        }
    }
}

/// 开机日志文件
#[derive(Debug, Clone)]
pub struct BootLog {
    path: PathBuf,
}

impl BootLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 默认路径 `~/.config/push-bridge/boot_log.jsonl`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("push-bridge")
            .join("boot_log.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加记录（带文件锁）
    pub fn append(&self, record: &BootRecord) -> Result<()> {
        use fs2::FileExt;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        file.lock_exclusive()?;
        let mut file = file;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        file.unlock()?;

        Ok(())
    }

    /// 读取全部记录，跳过无法解析的行
    pub fn read_all(&self) -> Vec<BootRecord> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect()
    }
}

impl Default for BootLog {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}
