//! 送金先アドレス抽出モジュール
//!
//! 動画の概要欄やチャット本文からSolanaのアドレスを探し出す。
//! `solana:` プレフィックス付きのトークンを優先し、見つからなければ
//! 単独の英数字列（32〜44文字）を左から順に候補として扱う。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// アドレス候補の最小文字数
pub const MIN_ADDRESS_LEN: usize = 32;
/// アドレス候補の最大文字数
pub const MAX_ADDRESS_LEN: usize = 44;

/// 検証済みの送金先アドレス
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PayoutAddress(pub String);

impl PayoutAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PayoutAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// アドレス検証の抽象インタフェース
///
/// ウォレットSDKの公開鍵パース相当の判定を差し替えられるようにする。
pub trait AddressValidator: Send + Sync {
    fn is_valid_address(&self, candidate: &str) -> bool;
}

impl<F> AddressValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_valid_address(&self, candidate: &str) -> bool {
        self(candidate)
    }
}

/// Base58デコードして32バイトになるものを公開鍵として受け入れる
#[derive(Debug, Clone, Copy, Default)]
pub struct Base58PubkeyValidator;

impl AddressValidator for Base58PubkeyValidator {
    fn is_valid_address(&self, candidate: &str) -> bool {
        matches!(bs58::decode(candidate).into_vec(), Ok(bytes) if bytes.len() == 32)
    }
}

fn prefixed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i:\bsolana):([0-9A-Za-z]+)").expect("prefixed address pattern is valid")
    })
}

fn alnum_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9A-Za-z]+").expect("alnum run pattern is valid"))
}

fn has_address_length(token: &str) -> bool {
    (MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&token.len())
}

/// `solana:<token>` 形式の候補を出現順に列挙
///
/// トークンは英数字の最長一致なので、45文字以上の連続はここで弾かれる。
pub fn prefixed_candidates(text: &str) -> impl Iterator<Item = &str> {
    prefixed_pattern()
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|token| has_address_length(token))
}

/// 単独の英数字列（32〜44文字）を出現順に列挙
pub fn bare_candidates(text: &str) -> impl Iterator<Item = &str> {
    alnum_run_pattern()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|token| has_address_length(token))
}

/// アドレス抽出器
#[derive(Clone)]
pub struct AddressExtractor {
    validator: Arc<dyn AddressValidator>,
}

impl std::fmt::Debug for AddressExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressExtractor").finish_non_exhaustive()
    }
}

impl Default for AddressExtractor {
    fn default() -> Self {
        Self::new(Base58PubkeyValidator)
    }
}

impl AddressExtractor {
    pub fn new(validator: impl AddressValidator + 'static) -> Self {
        Self {
            validator: Arc::new(validator),
        }
    }

    pub fn with_validator(validator: Arc<dyn AddressValidator>) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &Arc<dyn AddressValidator> {
        &self.validator
    }

    /// テキストから送金先アドレスを抽出する
    ///
    /// プレフィックス付き候補と単独候補はそれぞれ個別に検証され、
    /// 検証に失敗した候補は「一致なし」として次の候補へ進む。
    pub fn extract(&self, text: &str) -> Option<PayoutAddress> {
        if text.is_empty() {
            return None;
        }

        let found = prefixed_candidates(text)
            .find(|candidate| self.validator.is_valid_address(candidate))
            .or_else(|| {
                bare_candidates(text).find(|candidate| self.validator.is_valid_address(candidate))
            });

        if let Some(address) = found {
            tracing::trace!(address = %address, "🔎 Address extracted");
        }

        found.map(|address| PayoutAddress(address.to_string()))
    }

    /// 単一の候補を検証する
    pub fn validate(&self, candidate: &str) -> Option<PayoutAddress> {
        let candidate = candidate.trim();
        self.validator
            .is_valid_address(candidate)
            .then(|| PayoutAddress(candidate.to_string()))
    }
}
