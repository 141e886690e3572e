// ログ初期化などの共通ユーティリティ

use anyhow::Context;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{project_dirs, LogConfig};

const LOG_FILE_PREFIX: &str = "solchat.log";

/// ログ出力先ディレクトリを決める
pub fn resolve_log_dir(config: &LogConfig) -> PathBuf {
    if let Some(dir) = &config.log_dir {
        return dir.clone();
    }
    project_dirs()
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// ログ初期化
///
/// `RUST_LOG` が設定されていればそれを優先し、なければ設定のログレベルを使う。
/// ファイル出力が有効な場合は日次ローテーションのファイルにも書き出す。
/// 戻り値のガードはプロセス終了まで保持すること。
pub fn init_logging(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("Invalid log level: {}", config.log_level))?;

    let (file_layer, guard) = if config.enable_file_logging {
        let log_dir = resolve_log_dir(config);
        std::fs::create_dir_all(&log_dir).with_context(|| {
            format!("Failed to create log directory: {}", log_dir.display())
        })?;

        let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_log_dir_prefers_config() {
        let config = LogConfig {
            log_dir: Some(PathBuf::from("/tmp/solchat-logs")),
            ..LogConfig::default()
        };
        assert_eq!(resolve_log_dir(&config), PathBuf::from("/tmp/solchat-logs"));
    }

    #[test]
    fn test_resolve_log_dir_default_is_logs_dir() {
        let dir = resolve_log_dir(&LogConfig::default());
        assert!(dir.ends_with("logs"));
    }
}
