//! ライブチャットのポーリング
//!
//! 1セッションにつき1つのtokioタスクが一定間隔でチャットを取得し、
//! [`ChatSession`] に反映した結果を購読者へ通知する。
//! フェッチはタスク内で順番に待つのでティックが重なることはない。

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::models::Participant;
use super::registry::{BatchOutcome, ChatSession, DEFAULT_MESSAGE_WINDOW};
use super::source::ChatSource;
use super::winner::{RandomSource, WinnerSelector};
use crate::address::AddressExtractor;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// 連続エラーがこの回数に達したら警告を強める
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// ポーラー設定
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub message_window: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            message_window: DEFAULT_MESSAGE_WINDOW,
        }
    }
}

/// ポーラーの状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling { source_id: String },
    /// チャットが存在しない。新しいソースIDで再開するまで継続
    Error { source_id: String, message: String },
}

impl PollerState {
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling { .. })
    }
}

/// 1ティックごとの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerStatus {
    Updated(BatchOutcome),
    /// 取得失敗（次のティックで再試行）
    TransientError(String),
    /// アクティブなチャットなし（ポーリング停止）
    NoActiveChat(String),
}

/// 参加者の変更通知を受け取るインタフェース
///
/// 通知はティックを適用した順に届く。
pub trait ParticipantsObserver: Send + 'static {
    fn on_participants_changed(&mut self, participants: &[Participant]);

    fn on_status(&mut self, _status: &PollerStatus) {}
}

/// チャネル経由の通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerUpdate {
    Participants(Vec<Participant>),
    Status(PollerStatus),
}

impl ParticipantsObserver for mpsc::UnboundedSender<PollerUpdate> {
    fn on_participants_changed(&mut self, participants: &[Participant]) {
        let _ = self.send(PollerUpdate::Participants(participants.to_vec()));
    }

    fn on_status(&mut self, status: &PollerStatus) {
        let _ = self.send(PollerUpdate::Status(status.clone()));
    }
}

/// 通知を必要としない場合の購読者
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ParticipantsObserver for NoopObserver {
    fn on_participants_changed(&mut self, _participants: &[Participant]) {}
}

/// 稼働中セッションへのハンドル
struct PollHandle {
    active: Arc<Mutex<bool>>,
    shutdown_sender: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

/// ライブチャットポーラー
///
/// 参加者レジストリはポーリングタスクだけが更新し、
/// 呼び出し側はスナップショットのコピーを受け取る。
pub struct ChatPoller {
    source: Arc<dyn ChatSource>,
    extractor: AddressExtractor,
    config: PollerConfig,
    state_tx: Arc<watch::Sender<PollerState>>,
    participants_tx: Arc<watch::Sender<Vec<Participant>>>,
    handle: Option<PollHandle>,
}

impl std::fmt::Debug for ChatPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPoller")
            .field("config", &self.config)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl ChatPoller {
    pub fn new(source: Arc<dyn ChatSource>, extractor: AddressExtractor, config: PollerConfig) -> Self {
        let (state_tx, _) = watch::channel(PollerState::Idle);
        let (participants_tx, _) = watch::channel(Vec::new());
        Self {
            source,
            extractor,
            config,
            state_tx: Arc::new(state_tx),
            participants_tx: Arc::new(participants_tx),
            handle: None,
        }
    }

    /// ポーリングを開始する
    ///
    /// 既に稼働中なら停止してから新しいセッションとして開始し、参加者はクリアされる。
    /// tokioランタイム上で呼ぶこと。
    pub fn start(&mut self, source_id: impl Into<String>, observer: impl ParticipantsObserver) {
        let source_id = source_id.into();
        self.stop();

        // 同じ取得元で再開しても前回の取得位置を引き継がない
        self.source.reset();
        self.participants_tx.send_replace(Vec::new());
        self.state_tx.send_replace(PollerState::Polling {
            source_id: source_id.clone(),
        });

        let active = Arc::new(Mutex::new(true));
        let (shutdown_sender, shutdown_receiver) = mpsc::unbounded_channel();

        let task = PollTask {
            source_id: source_id.clone(),
            source: Arc::clone(&self.source),
            session: ChatSession::new(self.extractor.clone(), self.config.message_window),
            interval: self.config.interval,
            active: Arc::clone(&active),
            state_tx: Arc::clone(&self.state_tx),
            participants_tx: Arc::clone(&self.participants_tx),
            observer: Box::new(observer),
        };

        tracing::info!(
            source_id = %source_id,
            interval_ms = self.config.interval.as_millis() as u64,
            "▶️ Starting live chat polling"
        );

        let task = tokio::spawn(task.run(shutdown_receiver));
        self.handle = Some(PollHandle {
            active,
            shutdown_sender,
            task,
        });
    }

    /// ポーリングを停止する
    ///
    /// 以降のティックは発火しない。実行中のフェッチは完了するがその結果は捨てられる。
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        // ゲートを閉じてから状態を戻す（タスク側の書き込みと競合させない）
        *handle.active.lock() = false;
        let _ = handle.shutdown_sender.send(());
        self.state_tx.send_replace(PollerState::Idle);

        tracing::info!("⏹️ Live chat polling stopped");
    }

    /// ポーリングタスクがまだ動いているか
    ///
    /// `NoActiveChat` で止まった後は `state()` がエラーのままfalseになる。
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    pub fn state(&self) -> PollerState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PollerState> {
        self.state_tx.subscribe()
    }

    /// 現在の参加者のコピー
    pub fn participants(&self) -> Vec<Participant> {
        self.participants_tx.borrow().clone()
    }

    pub fn subscribe_participants(&self) -> watch::Receiver<Vec<Participant>> {
        self.participants_tx.subscribe()
    }

    /// 現在のスナップショットから当選者を選ぶ
    pub fn select_winner<S: RandomSource>(
        &self,
        selector: &mut WinnerSelector<S>,
    ) -> Option<Participant> {
        selector.select_winner(&self.participants())
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }
}

impl Drop for ChatPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            *handle.active.lock() = false;
            let _ = handle.shutdown_sender.send(());
        }
    }
}

/// ポーリングタスク本体
struct PollTask {
    source_id: String,
    source: Arc<dyn ChatSource>,
    session: ChatSession,
    interval: Duration,
    active: Arc<Mutex<bool>>,
    state_tx: Arc<watch::Sender<PollerState>>,
    participants_tx: Arc<watch::Sender<Vec<Participant>>>,
    observer: Box<dyn ParticipantsObserver>,
}

impl PollTask {
    async fn run(mut self, mut shutdown_receiver: mpsc::UnboundedReceiver<()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut request_count: u64 = 0;
        let mut consecutive_errors: u32 = 0;

        tracing::debug!(source_id = %self.source_id, "🚀 Poll task started");

        loop {
            tokio::select! {
                _ = shutdown_receiver.recv() => {
                    tracing::info!("🛑 Shutdown signal received, stopping poll task");
                    break;
                }
                _ = interval.tick() => {
                    request_count += 1;
                    let request_start = Instant::now();
                    let result = self.source.fetch_live_chat_messages(&self.source_id).await;
                    let elapsed = request_start.elapsed();

                    // 停止後に戻ってきた結果は反映しない
                    let active = self.active.lock();
                    if !*active {
                        tracing::debug!(
                            "🗑️ [POLLER] Discarding result of request #{} after stop",
                            request_count
                        );
                        break;
                    }

                    match result {
                        Ok(batch) => {
                            consecutive_errors = 0;
                            let outcome = self.session.apply_batch(batch);

                            tracing::debug!(
                                "✅ [POLLER] Request #{}: {} fetched, {} accepted, {} new participants (took {:?})",
                                request_count,
                                outcome.fetched,
                                outcome.accepted,
                                outcome.new_participants,
                                elapsed
                            );

                            if outcome.participants_changed() {
                                let snapshot = self.session.participants();
                                tracing::info!(
                                    "👥 [POLLER] Participants: {} (+{})",
                                    snapshot.len(),
                                    outcome.new_participants
                                );
                                self.participants_tx.send_replace(snapshot.clone());
                                self.observer.on_participants_changed(&snapshot);
                            }
                            self.observer.on_status(&PollerStatus::Updated(outcome));
                        }
                        Err(e) if e.is_terminal() => {
                            let message = e.to_string();
                            tracing::error!("❌ [POLLER] {} - polling halted", message);
                            self.state_tx.send_replace(PollerState::Error {
                                source_id: self.source_id.clone(),
                                message: message.clone(),
                            });
                            self.observer.on_status(&PollerStatus::NoActiveChat(message));
                            break;
                        }
                        Err(e) => {
                            consecutive_errors += 1;
                            tracing::warn!(
                                "⚠️ [POLLER] Request #{} failed (consecutive: {}, took {:?}): {}",
                                request_count,
                                consecutive_errors,
                                elapsed,
                                e
                            );
                            if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                                tracing::error!(
                                    "🚨 [POLLER] Too many consecutive errors ({}), still retrying",
                                    consecutive_errors
                                );
                            }
                            let message = format!("Failed to fetch live chat messages: {}", e);
                            self.observer.on_status(&PollerStatus::TransientError(message));
                        }
                    }
                }
            }
        }

        tracing::debug!(
            source_id = %self.source_id,
            requests = request_count,
            "🏁 Poll task finished"
        );
    }
}
