//! 参加者レジストリとポーリングセッション状態
//!
//! 1つの配信セッションにつき1つの [`ChatSession`] がポーリングタスクに所有され、
//! 取得バッチの重複排除・直近メッセージ窓・アドレス単位の参加者登録を担当する。

use std::collections::{HashMap, HashSet, VecDeque};

use super::models::{ChatMessage, FetchedMessage, Participant};
use crate::address::{AddressExtractor, PayoutAddress};

/// 直近メッセージ窓のデフォルト上限
pub const DEFAULT_MESSAGE_WINDOW: usize = 50;

/// アドレスをキーにした参加者レジストリ（登録順を保持）
#[derive(Debug, Clone, Default)]
pub struct ParticipantRegistry {
    entries: Vec<Participant>,
    index: HashMap<PayoutAddress, usize>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未登録のアドレスなら追加してtrueを返す
    ///
    /// 既存アドレスは何もしない（最初の投稿者名を保持）。
    pub fn upsert(&mut self, participant: Participant) -> bool {
        if self.index.contains_key(&participant.address) {
            return false;
        }
        self.index
            .insert(participant.address.clone(), self.entries.len());
        self.entries.push(participant);
        true
    }

    pub fn get(&self, address: &PayoutAddress) -> Option<&Participant> {
        self.index.get(address).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, address: &PayoutAddress) -> bool {
        self.index.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.entries.iter()
    }

    /// 呼び出し側に渡すためのコピー
    pub fn snapshot(&self) -> Vec<Participant> {
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl FromIterator<Participant> for ParticipantRegistry {
    fn from_iter<I: IntoIterator<Item = Participant>>(iter: I) -> Self {
        let mut registry = Self::new();
        for participant in iter {
            registry.upsert(participant);
        }
        registry
    }
}

/// 1バッチ適用の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch: u64,
    pub fetched: usize,
    pub accepted: usize,
    pub new_participants: usize,
    pub skipped_seen: usize,
    pub skipped_no_address: usize,
}

impl BatchOutcome {
    pub fn participants_changed(&self) -> bool {
        self.new_participants > 0
    }
}

/// 配信セッションの状態
#[derive(Debug)]
pub struct ChatSession {
    extractor: AddressExtractor,
    window: VecDeque<ChatMessage>,
    window_capacity: usize,
    seen_ids: HashSet<String>,
    registry: ParticipantRegistry,
    batch_seq: u64,
}

impl ChatSession {
    pub fn new(extractor: AddressExtractor, window_capacity: usize) -> Self {
        Self {
            extractor,
            window: VecDeque::with_capacity(window_capacity),
            window_capacity,
            seen_ids: HashSet::new(),
            registry: ParticipantRegistry::new(),
            batch_seq: 0,
        }
    }

    /// 取得バッチを適用する
    ///
    /// 既出IDとアドレスを含まないメッセージは捨て、残りを窓とレジストリへ反映する。
    pub fn apply_batch(&mut self, batch: Vec<FetchedMessage>) -> BatchOutcome {
        self.batch_seq += 1;
        let mut outcome = BatchOutcome {
            batch: self.batch_seq,
            fetched: batch.len(),
            ..BatchOutcome::default()
        };

        for fetched in batch {
            if !self.seen_ids.insert(fetched.id.clone()) {
                outcome.skipped_seen += 1;
                continue;
            }

            let Some(address) = self.extractor.extract(&fetched.text) else {
                outcome.skipped_no_address += 1;
                continue;
            };

            let message = ChatMessage::from_fetched(fetched, self.batch_seq);
            if self
                .registry
                .upsert(Participant::new(address, message.author_name.clone()))
            {
                outcome.new_participants += 1;
            }
            self.push_message(message);
            outcome.accepted += 1;
        }

        outcome
    }

    fn push_message(&mut self, message: ChatMessage) {
        if self.window_capacity == 0 {
            return;
        }
        while self.window.len() >= self.window_capacity {
            self.window.pop_front();
        }
        self.window.push_back(message);
    }

    /// 直近の受理済みメッセージ（古い順）
    pub fn messages(&self) -> &VecDeque<ChatMessage> {
        &self.window
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.registry.snapshot()
    }

    pub fn batches_applied(&self) -> u64 {
        self.batch_seq
    }

    /// 新しい配信セッション用に全状態を破棄
    pub fn clear(&mut self) {
        self.window.clear();
        self.seen_ids.clear();
        self.registry.clear();
        self.batch_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR_A: &str = "3N2ZsQYxkLX8fa7Aaa6pvJxNpwvqLdXWvWY8bMeQzXbS";
    const ADDR_B: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn session() -> ChatSession {
        ChatSession::new(AddressExtractor::default(), DEFAULT_MESSAGE_WINDOW)
    }

    #[test]
    fn test_same_address_different_ids_yields_one_participant() {
        let mut session = session();
        let outcome = session.apply_batch(vec![
            FetchedMessage::new("a", format!("send to {ADDR_A}"), "alice"),
            FetchedMessage::new("b", format!("send to {ADDR_A}"), "bob"),
        ]);

        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.new_participants, 1);
        assert_eq!(session.registry().len(), 1);
        // 最初の投稿者名が残る
        assert_eq!(session.participants()[0].author_name, "alice");
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_repeated_message_id_is_noop() {
        let mut session = session();
        let message = FetchedMessage::new("x1", ADDR_A, "alice");

        let first = session.apply_batch(vec![message.clone()]);
        let second = session.apply_batch(vec![message]);

        assert!(first.participants_changed());
        assert!(!second.participants_changed());
        assert_eq!(second.skipped_seen, 1);
        assert_eq!(second.accepted, 0);
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_duplicate_id_within_batch() {
        let mut session = session();
        let outcome = session.apply_batch(vec![
            FetchedMessage::new("dup", ADDR_A, "alice"),
            FetchedMessage::new("dup", ADDR_B, "mallory"),
        ]);

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.skipped_seen, 1);
        assert_eq!(session.registry().len(), 1);
    }

    #[test]
    fn test_messages_without_address_are_dropped() {
        let mut session = session();
        let outcome = session.apply_batch(vec![
            FetchedMessage::new("1", "gm everyone", "carol"),
            FetchedMessage::new("2", "", "dave"),
        ]);

        assert_eq!(outcome.skipped_no_address, 2);
        assert!(session.messages().is_empty());
        assert!(session.registry().is_empty());
    }

    #[test]
    fn test_window_evicts_oldest_first() {
        let mut session = ChatSession::new(AddressExtractor::new(|_: &str| true), 3);
        let batch = (0..5)
            .map(|i| FetchedMessage::new(format!("m{i}"), format!("{:a>32}", i), "someone"))
            .collect();
        session.apply_batch(batch);

        let ids: Vec<&str> = session.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);
        assert_eq!(session.registry().len(), 5);
    }

    #[test]
    fn test_default_window_keeps_latest_fifty() {
        let mut session = ChatSession::new(AddressExtractor::new(|_: &str| true), DEFAULT_MESSAGE_WINDOW);
        let first = (0..DEFAULT_MESSAGE_WINDOW)
            .map(|i| FetchedMessage::new(format!("m{i}"), format!("{:a>32}", i), "someone"))
            .collect();
        session.apply_batch(first);
        assert_eq!(session.messages().len(), 50);
        assert_eq!(session.messages().front().unwrap().id, "m0");

        // 51件目で最古の1件だけが押し出される
        session.apply_batch(vec![FetchedMessage::new("m50", format!("{:a>32}", 50), "someone")]);
        assert_eq!(session.messages().len(), 50);
        assert_eq!(session.messages().front().unwrap().id, "m1");
        assert_eq!(session.messages().back().unwrap().id, "m50");
    }

    #[test]
    fn test_batch_numbers_are_monotonic() {
        let mut session = session();
        session.apply_batch(vec![FetchedMessage::new("1", ADDR_A, "alice")]);
        session.apply_batch(vec![]);
        session.apply_batch(vec![FetchedMessage::new("2", ADDR_B, "bob")]);

        let batches: Vec<u64> = session.messages().iter().map(|m| m.batch).collect();
        assert_eq!(batches, vec![1, 3]);
        assert_eq!(session.batches_applied(), 3);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut session = session();
        session.apply_batch(vec![FetchedMessage::new("1", ADDR_A, "alice")]);
        let snapshot = session.participants();
        session.apply_batch(vec![FetchedMessage::new("2", ADDR_B, "bob")]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(session.participants().len(), 2);
    }

    #[test]
    fn test_clear_resets_session() {
        let mut session = session();
        session.apply_batch(vec![FetchedMessage::new("1", ADDR_A, "alice")]);
        session.clear();

        assert!(session.registry().is_empty());
        assert!(session.messages().is_empty());
        // クリア後は同じIDも新規扱い
        let outcome = session.apply_batch(vec![FetchedMessage::new("1", ADDR_A, "alice")]);
        assert_eq!(outcome.new_participants, 1);
    }

    #[test]
    fn test_registry_from_iter_dedups() {
        let a = PayoutAddress(ADDR_A.to_string());
        let registry: ParticipantRegistry = vec![
            Participant::new(a.clone(), "alice"),
            Participant::new(a.clone(), "bob"),
        ]
        .into_iter()
        .collect();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&a).unwrap().author_name, "alice");
    }
}
