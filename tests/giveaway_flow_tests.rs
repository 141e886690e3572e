//! 抽選フロー全体の統合テスト
//!
//! チャット取り込み → 参加者書き出し → 読み込み → 抽選 → 配分計算

use solchat::{
    address::AddressExtractor,
    chat::{ChatSession, FetchedMessage, Participant, WinnerSelector, DEFAULT_MESSAGE_WINDOW},
    giveaway::{parse_sol_amount, PayoutError, PayoutPlan, LAMPORTS_PER_SOL},
    io::{read_participants, write_participants},
    PayoutAddress,
};
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};

const ADDRESSES: [&str; 4] = [
    "3N2ZsQYxkLX8fa7Aaa6pvJxNpwvqLdXWvWY8bMeQzXbS",
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
    "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
    "7xKXtg2CW87d1PDyAxXSr8a6JvHP4D2VqbVQJPvG5dDt",
];

fn chat_batch() -> Vec<FetchedMessage> {
    vec![
        FetchedMessage::new("1", format!("solana:{}", ADDRESSES[0]), "alice"),
        FetchedMessage::new("2", "what's the giveaway?", "bob"),
        FetchedMessage::new("3", format!("here {} thx", ADDRESSES[1]), "carol"),
        FetchedMessage::new("4", format!("SOLANA:{}", ADDRESSES[2]), "dave"),
        FetchedMessage::new("5", ADDRESSES[3], "erin"),
        FetchedMessage::new("6", format!("again {}", ADDRESSES[0]), "alice"),
    ]
}

#[test]
fn test_collect_export_and_draw() {
    let mut session = ChatSession::new(AddressExtractor::default(), DEFAULT_MESSAGE_WINDOW);
    let outcome = session.apply_batch(chat_batch());
    assert_eq!(outcome.new_participants, 4);
    assert_eq!(outcome.skipped_no_address, 1);

    let participants = session.participants();
    let names: Vec<_> = participants.iter().map(|p| p.author_name.as_str()).collect();
    assert_eq!(names, ["alice", "carol", "dave", "erin"]);

    let dir = tempdir().unwrap();
    let path = dir.path().join("participants.ndjson");
    assert_err!(read_participants(&path));
    assert_eq!(assert_ok!(write_participants(&path, &participants)), 4);
    let loaded = assert_ok!(read_participants(&path));
    assert_eq!(loaded, participants);

    // 同じシードなら同じ当選者
    let first = WinnerSelector::seeded(2024).select_winners(&loaded, 2);
    let second = WinnerSelector::seeded(2024).select_winners(&loaded, 2);
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_ne!(first[0].address, first[1].address);

    let winners: Vec<&str> = first.iter().map(|w| w.address.as_str()).collect();
    let plan = assert_ok!(PayoutPlan::from_input(
        "1.5",
        winners,
        &AddressExtractor::default()
    ));
    assert_eq!(plan.total_lamports, 1_500_000_000);
    assert!(plan.payouts.iter().all(|p| p.lamports == 750_000_000));
    assert_eq!(plan.remainder_lamports, 0);
}

#[test]
fn test_empty_export_draws_nobody() {
    let session = ChatSession::new(AddressExtractor::default(), DEFAULT_MESSAGE_WINDOW);
    let dir = tempdir().unwrap();
    let path = dir.path().join("nobody.ndjson");

    assert_eq!(assert_ok!(write_participants(&path, &session.participants())), 0);
    let loaded = assert_ok!(read_participants(&path));
    assert!(loaded.is_empty());
    assert!(WinnerSelector::seeded(1).select_winners(&loaded, 3).is_empty());
}

#[test]
fn test_draw_more_than_pool() {
    let participants: Vec<Participant> = ADDRESSES[..2]
        .iter()
        .enumerate()
        .map(|(i, address)| Participant::new(PayoutAddress(address.to_string()), format!("p{i}")))
        .collect();

    let winners = WinnerSelector::seeded(1).select_winners(&participants, 10);
    assert_eq!(winners.len(), 2);
    assert!(WinnerSelector::seeded(1).select_winners(&[], 3).is_empty());
}

#[test]
fn test_custom_validator_is_honored() {
    // 特定のアドレスだけを許可する検証器
    let allowed = ADDRESSES[1].to_string();
    let extractor = AddressExtractor::new(move |candidate: &str| candidate == allowed);

    let text = format!("{} or {}", ADDRESSES[0], ADDRESSES[1]);
    assert_eq!(
        extractor.extract(&text).map(|a| a.to_string()),
        Some(ADDRESSES[1].to_string())
    );
    assert!(extractor.extract(ADDRESSES[0]).is_none());
}

#[test]
fn test_plan_rejects_bad_input() {
    let extractor = AddressExtractor::default();
    assert_eq!(
        PayoutPlan::from_input("0", [ADDRESSES[0]], &extractor),
        Err(PayoutError::ZeroAmount)
    );
    assert_eq!(
        PayoutPlan::from_input("1", Vec::<&str>::new(), &extractor),
        Err(PayoutError::NoWinners)
    );
    assert_eq!(parse_sol_amount("2.000000000"), Ok(2 * LAMPORTS_PER_SOL));
}
