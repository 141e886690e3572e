use async_trait::async_trait;

use super::models::FetchedMessage;
use crate::api::youtube::FetchError;

/// ライブチャットの取得元
///
/// `FetchError::NoActiveChat` はセッション終了として扱われ、
/// それ以外のエラーは一時的な失敗として次のティックで再試行される。
#[async_trait]
pub trait ChatSource: Send + Sync {
    async fn fetch_live_chat_messages(
        &self,
        source_id: &str,
    ) -> Result<Vec<FetchedMessage>, FetchError>;

    /// 新しいセッション開始時に呼ばれる。取得位置などの内部状態を破棄する
    fn reset(&self) {}
}
