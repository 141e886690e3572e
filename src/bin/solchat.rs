use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use solchat::{
    api::youtube::VideoId,
    chat::{ChatPoller, Participant, PollerStatus, PollerUpdate, WinnerSelector},
    config::{AppConfig, ConfigManager},
    giveaway::{format_lamports, PayoutPlan},
    io::{read_participants, write_participants},
    AddressExtractor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// YouTubeライブチャットからSolanaアドレスを集めて抽選するCLI
#[derive(Parser, Debug)]
#[command(name = "solchat", version, about = "Solana giveaways from YouTube live chat")]
struct Cli {
    /// 設定ファイルのパス（省略時はXDG設定ディレクトリ）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// ログレベル（設定ファイルより優先）
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// テキストから送金先アドレスを抽出
    Extract { text: String },

    /// 動画の概要欄から配信者のアドレスを取得
    Creator { video: String },

    /// ライブチャットを監視して参加者を集める（Ctrl+Cで終了）
    Watch {
        /// 動画IDまたはURL
        video: String,

        /// ポーリング間隔（秒）
        #[arg(long)]
        interval: Option<u64>,

        /// 参加者リストの書き出し先（NDJSON）
        #[arg(long)]
        export: Option<PathBuf>,

        /// 終了時に抽選する人数
        #[arg(long)]
        draw: Option<usize>,

        /// 抽選のシード
        #[arg(long)]
        seed: Option<u64>,
    },

    /// 書き出した参加者リストから抽選
    Draw {
        file: PathBuf,

        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// 当選者への送金額を計算
    Plan {
        /// 合計額（SOL）
        #[arg(long)]
        amount: String,

        #[arg(required = true)]
        addresses: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = config_manager.load_effective_config()?;
    if let Some(level) = &cli.log_level {
        config.log.log_level = level.clone();
    }

    // tokio-consoleの初期化（プロファイリング用）
    #[cfg(feature = "debug-tokio")]
    console_subscriber::init();

    #[cfg(not(feature = "debug-tokio"))]
    let _log_guard = solchat::utils::init_logging(&config.log)?;

    tracing::debug!(command = ?cli.command, "🎬 Starting solchat");

    let extractor = AddressExtractor::default();

    match cli.command {
        Command::Extract { text } => match extractor.extract(&text) {
            Some(address) => println!("{}", address),
            None => bail!("No Solana address found"),
        },
        Command::Creator { video } => {
            let video_id = VideoId::parse(&video)?;
            let client = config.youtube_client()?;
            match client
                .creator_address_for_video(&video_id.0, &extractor)
                .await?
            {
                Some(address) => println!("{}", address),
                None => bail!("No Solana address in the description of {}", video_id),
            }
        }
        Command::Watch {
            video,
            interval,
            export,
            draw,
            seed,
        } => {
            if let Some(interval) = interval {
                config.poll_interval_secs = interval;
            }
            let export = export.or_else(|| config.export_file.clone());
            let participants = watch(&config, &video, export.as_deref(), extractor).await?;

            if let Some(count) = draw {
                print_winners(&draw_winners(&participants, count, seed));
            }
        }
        Command::Draw { file, count, seed } => {
            let participants = read_participants(&file)
                .with_context(|| format!("Failed to read participants: {}", file.display()))?;
            tracing::info!("📂 Loaded {} participants", participants.len());
            print_winners(&draw_winners(&participants, count, seed));
        }
        Command::Plan { amount, addresses } => {
            let plan = PayoutPlan::from_input(
                &amount,
                addresses.iter().map(String::as_str),
                &extractor,
            )?;
            for payout in &plan.payouts {
                println!("{}\t{} SOL", payout.recipient, format_lamports(payout.lamports));
            }
            if plan.remainder_lamports > 0 {
                println!(
                    "remainder\t{} SOL",
                    format_lamports(plan.remainder_lamports)
                );
            }
        }
    }

    Ok(())
}

async fn watch(
    config: &AppConfig,
    video: &str,
    export: Option<&Path>,
    extractor: AddressExtractor,
) -> anyhow::Result<Vec<Participant>> {
    let video_id = VideoId::parse(video)?;
    let client = Arc::new(config.youtube_client()?);

    let mut poller = ChatPoller::new(client, extractor, config.poller_config());
    let (tx, mut rx) = mpsc::unbounded_channel::<PollerUpdate>();
    poller.start(video_id.to_string(), tx);

    tracing::info!("👀 Watching live chat of {} (Ctrl+C to stop)", video_id);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                tracing::info!("🛑 Ctrl+C received");
                break;
            }
            update = rx.recv() => {
                let Some(update) = update else { break };
                match update {
                    PollerUpdate::Participants(participants) => {
                        if let Some(last) = participants.last() {
                            tracing::info!("🙋 {} participants, latest: {}", participants.len(), last);
                        }
                        if let Some(path) = export {
                            export_participants(path, &participants);
                        }
                    }
                    PollerUpdate::Status(PollerStatus::NoActiveChat(message)) => {
                        tracing::warn!("📴 {}", message);
                        break;
                    }
                    PollerUpdate::Status(PollerStatus::TransientError(message)) => {
                        tracing::warn!("⚠️ {}", message);
                    }
                    PollerUpdate::Status(PollerStatus::Updated(outcome)) => {
                        tracing::trace!(?outcome, "tick");
                    }
                }
            }
        }
    }

    poller.stop();
    let participants = poller.participants();
    // 誰も集まらなかったセッションで既存のエクスポートを空にしない
    match export {
        Some(path) if !participants.is_empty() => export_participants(path, &participants),
        Some(path) => tracing::info!("📭 No participants collected, {} left untouched", path.display()),
        None => {}
    }
    tracing::info!("👋 Collected {} participants", participants.len());

    Ok(participants)
}

fn export_participants(path: &Path, participants: &[Participant]) {
    if let Err(e) = write_participants(path, participants) {
        tracing::error!("❌ Failed to export participants to {}: {}", path.display(), e);
    }
}

fn draw_winners(participants: &[Participant], count: usize, seed: Option<u64>) -> Vec<Participant> {
    match seed {
        Some(seed) => WinnerSelector::seeded(seed).select_winners(participants, count),
        None => {
            let mut selector: WinnerSelector = WinnerSelector::default();
            selector.select_winners(participants, count)
        }
    }
}

fn print_winners(winners: &[Participant]) {
    if winners.is_empty() {
        println!("No participants to draw from");
        return;
    }
    for (rank, winner) in winners.iter().enumerate() {
        println!("#{}\t{}\t{}", rank + 1, winner.address, winner.author_name);
    }
}
