//! アプリケーション設定管理モジュール
//!
//! XDGディレクトリ上のTOMLファイルで設定を永続化します。
//! APIキーは環境変数 `YOUTUBE_API_KEY`（`.env` も可）で上書きできます。

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::youtube::{ApiKey, YoutubeClient};
use crate::chat::{PollerConfig, DEFAULT_MESSAGE_WINDOW};
use crate::error::{SolchatError, SolchatResult};

pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    pub log_dir: Option<PathBuf>,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            enable_file_logging: false,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// YouTube Data API キー
    pub youtube_api_key: Option<String>,
    /// ポーリング間隔（秒）
    pub poll_interval_secs: u64,
    /// 保持するメッセージ数
    pub message_window: usize,
    /// HTTPリクエストのタイムアウト（秒）
    pub request_timeout_secs: u64,
    /// 参加者リストの書き出し先
    pub export_file: Option<PathBuf>,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            poll_interval_secs: 5,
            message_window: DEFAULT_MESSAGE_WINDOW,
            request_timeout_secs: 15,
            export_file: None,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 環境変数による上書きを適用する
    pub fn apply_env(&mut self) {
        self.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
    }

    fn apply_api_key_override(&mut self, value: Option<String>) {
        if let Some(key) = value.map(|v| v.trim().to_string()) {
            if !key.is_empty() {
                debug!("🔑 Using API key from {}", API_KEY_ENV);
                self.youtube_api_key = Some(key);
            }
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            message_window: self.message_window.max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// 設定済みのAPIキーとタイムアウトでクライアントを作る
    pub fn youtube_client(&self) -> SolchatResult<YoutubeClient> {
        let key = self.youtube_api_key.as_deref().ok_or_else(|| {
            SolchatError::Configuration(format!(
                "YouTube API key is not set (use {} or youtube_api_key in the config file)",
                API_KEY_ENV
            ))
        })?;
        Ok(YoutubeClient::with_timeout(ApiKey::new(key), self.request_timeout())?)
    }
}

/// 設定管理マネージャー
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// 新しい設定マネージャーを作成
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        Ok(Self { config_path })
    }

    /// 任意のパスを使う（テストや `--config` 指定用）
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        let project_dirs =
            project_dirs().context("Failed to get project directories")?;
        let config_file = project_dirs.config_dir().join("config.toml");

        debug!("Config file path: {}", config_file.display());

        Ok(config_file)
    }

    /// 設定を読み込み
    pub fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let config: AppConfig = toml::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse config file: {}",
                self.config_path.display()
            )
        })?;

        info!(
            "✅ Configuration loaded from: {}",
            self.config_path.display()
        );

        Ok(config)
    }

    /// `.env` と環境変数を反映した設定を読み込み
    pub fn load_effective_config(&self) -> Result<AppConfig> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        let mut config = self.load_config()?;
        config.apply_env();
        Ok(config)
    }

    /// 設定を保存
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        let config_content =
            toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(&self.config_path, config_content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;

        info!("💾 Configuration saved to: {}", self.config_path.display());

        Ok(())
    }

    pub fn get_config_file_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }
}

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "solchat", "solchat")
}
