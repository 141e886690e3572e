//! YouTube Data API v3 クライアント
//!
//! `videos` でアクティブなライブチャットIDを解決し、`liveChat/messages` を
//! `nextPageToken` 付きで読み進める。

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

use crate::address::{AddressExtractor, PayoutAddress};
use crate::chat::models::FetchedMessage;
use crate::chat::source::ChatSource;
use crate::error::{SolchatError, SolchatResult};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// チャット終了・未検出を示すAPIエラー理由
const NO_ACTIVE_CHAT_REASONS: &[&str] = &[
    "liveChatEnded",
    "liveChatNotFound",
    "liveChatDisabled",
    "videoNotFound",
];

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("No active live chat found for video {video_id}")]
    NoActiveChat { video_id: String },
    #[error("YouTube API error ({status}): {message}")]
    Api {
        status: u16,
        reason: Option<String>,
        message: String,
    },
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Video not found: {video_id}")]
    VideoNotFound { video_id: String },
}

impl FetchError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            reason: None,
            message: message.into(),
        }
    }

    pub fn no_active_chat(video_id: impl Into<String>) -> Self {
        Self::NoActiveChat {
            video_id: video_id.into(),
        }
    }

    /// このエラーでポーリングを打ち切るべきか
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NoActiveChat { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub struct VideoId(pub String);

impl VideoId {
    /// URLまたはID文字列を検証して取り込む
    pub fn parse(input: &str) -> SolchatResult<Self> {
        extract_video_id(input).ok_or_else(|| {
            SolchatError::InvalidInput(format!("'{}' is not a YouTube video URL or ID", input.trim()))
        })
    }
}

#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

fn video_id_in_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:[?&]v=|youtu\.be/|/live/|/shorts/|/embed/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)")
            .expect("video id url pattern is valid")
    })
}

fn bare_video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("bare video id pattern is valid")
    })
}

/// URLまたはIDそのものからビデオIDを取り出す
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    let input = input.trim();
    if bare_video_id_pattern().is_match(input) {
        return Some(VideoId(input.to_string()));
    }
    video_id_in_url_pattern()
        .captures(input)
        .and_then(|cap| cap.get(1))
        .map(|m| VideoId(m.as_str().to_string()))
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    live_streaming_details: Option<LiveStreamingDetails>,
    snippet: Option<VideoSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    active_live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessagesResponse {
    next_page_token: Option<String>,
    polling_interval_millis: Option<u64>,
    #[serde(default)]
    items: Vec<LiveChatMessageItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessageItem {
    id: String,
    #[serde(default)]
    snippet: LiveChatSnippet,
    #[serde(default)]
    author_details: AuthorDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatSnippet {
    display_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorDetails {
    #[serde(default)]
    display_name: String,
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

/// `liveChat/messages` の1ページ分
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagesPage {
    pub messages: Vec<FetchedMessage>,
    pub next_page_token: Option<String>,
    pub polling_interval: Option<Duration>,
}

/// 動画の基本情報
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDetails {
    pub title: String,
    pub description: String,
}

/// `videos?part=liveStreamingDetails` のレスポンスからチャットIDを取り出す
pub fn parse_active_live_chat_id(body: &str) -> Result<Option<String>, FetchError> {
    let response: ListResponse<VideoItem> = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .next()
        .and_then(|item| item.live_streaming_details)
        .and_then(|details| details.active_live_chat_id)
        .filter(|id| !id.is_empty()))
}

/// `videos?part=snippet` のレスポンスから概要欄を取り出す
pub fn parse_video_details(body: &str) -> Result<Option<VideoDetails>, FetchError> {
    let response: ListResponse<VideoItem> = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .next()
        .and_then(|item| item.snippet)
        .map(|snippet| VideoDetails {
            title: snippet.title,
            description: snippet.description,
        }))
}

/// `liveChat/messages` のレスポンスを変換する
///
/// 本文を持たないイベント（メンバー加入など）は空文字のメッセージになる。
pub fn parse_live_chat_messages(body: &str) -> Result<MessagesPage, FetchError> {
    let response: LiveChatMessagesResponse = serde_json::from_str(body)?;
    let messages = response
        .items
        .into_iter()
        .map(|item| FetchedMessage {
            id: item.id,
            text: item.snippet.display_message.unwrap_or_default(),
            author_name: item.author_details.display_name,
            author_avatar_url: item.author_details.profile_image_url,
        })
        .collect();

    Ok(MessagesPage {
        messages,
        next_page_token: response.next_page_token,
        polling_interval: response.polling_interval_millis.map(Duration::from_millis),
    })
}

/// 非2xxレスポンスをエラーに分類する
pub fn classify_api_error(status: u16, body: &str, video_id: &str) -> FetchError {
    let (message, reason) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope
                .error
                .errors
                .into_iter()
                .find_map(|detail| detail.reason);
            (envelope.error.message, reason)
        }
        Err(_) => (body.chars().take(200).collect(), None),
    };

    match reason.as_deref() {
        Some(r) if NO_ACTIVE_CHAT_REASONS.contains(&r) => FetchError::no_active_chat(video_id),
        _ => FetchError::Api {
            status,
            reason,
            message,
        },
    }
}

#[derive(Debug, Clone)]
struct ChatCursor {
    video_id: String,
    live_chat_id: String,
    page_token: Option<String>,
}

/// YouTube Data API クライアント
#[derive(Debug)]
pub struct YoutubeClient {
    http: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    cursor: parking_lot::Mutex<Option<ChatCursor>>,
}

impl YoutubeClient {
    pub fn new(api_key: ApiKey) -> Result<Self, FetchError> {
        Self::with_timeout(api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(api_key: ApiKey, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_API_BASE.to_string(),
            cursor: parking_lot::Mutex::new(None),
        })
    }

    /// APIのベースURLを差し替える（ローカル検証用）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get(&self, path: &str, query: &[(&str, &str)], video_id: &str) -> Result<String, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(url = %url, "📡 API request sent");

        let response = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_api_error(status.as_u16(), &body, video_id));
        }
        Ok(body)
    }

    pub async fn fetch_live_chat_id(&self, video_id: &str) -> Result<String, FetchError> {
        let body = self
            .get(
                "videos",
                &[("part", "liveStreamingDetails"), ("id", video_id)],
                video_id,
            )
            .await?;

        parse_active_live_chat_id(&body)?.ok_or_else(|| FetchError::no_active_chat(video_id))
    }

    pub async fn fetch_messages_page(
        &self,
        video_id: &str,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> Result<MessagesPage, FetchError> {
        let mut query = vec![
            ("liveChatId", live_chat_id),
            ("part", "snippet,authorDetails"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let body = self.get("liveChat/messages", &query, video_id).await?;
        parse_live_chat_messages(&body)
    }

    pub async fn fetch_video_details(&self, video_id: &str) -> Result<VideoDetails, FetchError> {
        let body = self
            .get("videos", &[("part", "snippet"), ("id", video_id)], video_id)
            .await?;

        parse_video_details(&body)?.ok_or_else(|| FetchError::VideoNotFound {
            video_id: video_id.to_string(),
        })
    }

    /// 概要欄から配信者の送金先アドレスを取得
    pub async fn creator_address_for_video(
        &self,
        video_id: &str,
        extractor: &AddressExtractor,
    ) -> Result<Option<PayoutAddress>, FetchError> {
        let details = self.fetch_video_details(video_id).await?;
        let address = extractor.extract(&details.description);

        match &address {
            Some(address) => {
                tracing::info!(video_id = video_id, address = %address, "💰 Creator address found")
            }
            None => tracing::warn!(
                video_id = video_id,
                title = %details.title,
                "⚠️ No payout address in video description"
            ),
        }

        Ok(address)
    }

    /// 保持しているページ位置を破棄
    pub fn reset_cursor(&self) {
        *self.cursor.lock() = None;
    }

    fn current_cursor(&self, video_id: &str) -> Option<ChatCursor> {
        self.cursor
            .lock()
            .as_ref()
            .filter(|cursor| cursor.video_id == video_id)
            .cloned()
    }
}

#[async_trait]
impl ChatSource for YoutubeClient {
    async fn fetch_live_chat_messages(
        &self,
        source_id: &str,
    ) -> Result<Vec<FetchedMessage>, FetchError> {
        let cursor = match self.current_cursor(source_id) {
            Some(cursor) => cursor,
            None => {
                let live_chat_id = self.fetch_live_chat_id(source_id).await?;
                tracing::info!(
                    video_id = source_id,
                    live_chat_id = %live_chat_id,
                    "🔗 Live chat resolved"
                );
                ChatCursor {
                    video_id: source_id.to_string(),
                    live_chat_id,
                    page_token: None,
                }
            }
        };

        let page = self
            .fetch_messages_page(
                source_id,
                &cursor.live_chat_id,
                cursor.page_token.as_deref(),
            )
            .await?;

        tracing::debug!(
            message_count = page.messages.len(),
            has_next_page = page.next_page_token.is_some(),
            "📨 API response received"
        );

        let page_token = page.next_page_token.clone().or(cursor.page_token);
        *self.cursor.lock() = Some(ChatCursor {
            video_id: cursor.video_id,
            live_chat_id: cursor.live_chat_id,
            page_token,
        });

        Ok(page.messages)
    }

    fn reset(&self) {
        tracing::debug!("🔄 Live chat cursor cleared");
        self.reset_cursor();
    }
}
