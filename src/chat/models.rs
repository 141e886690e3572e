use serde::{Deserialize, Serialize};

use crate::address::PayoutAddress;

/// チャットソースから取得したままのメッセージ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FetchedMessage {
    pub id: String,
    pub text: String,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
}

impl FetchedMessage {
    pub fn new(id: impl Into<String>, text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author_name: author.into(),
            author_avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.author_avatar_url = Some(url.into());
        self
    }
}

/// 受理済みチャットメッセージ（受信後は不変）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    /// 取得バッチの通し番号（単調増加）
    pub batch: u64,
}

impl ChatMessage {
    pub fn from_fetched(message: FetchedMessage, batch: u64) -> Self {
        Self {
            id: message.id,
            text: message.text,
            author_name: message.author_name,
            author_avatar_url: message.author_avatar_url,
            batch,
        }
    }
}

/// 抽選参加者
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Participant {
    pub address: PayoutAddress,
    pub author_name: String,
}

impl Participant {
    pub fn new(address: PayoutAddress, author_name: impl Into<String>) -> Self {
        Self {
            address,
            author_name: author_name.into(),
        }
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.author_name, self.address)
    }
}
