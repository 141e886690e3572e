//! 当選者抽選

use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};

use super::models::Participant;

/// `[0, n)` の一様乱数を返す乱数源
pub trait RandomSource {
    /// `n` は常に1以上で呼ばれる
    fn next_index(&mut self, n: usize) -> usize;
}

/// 任意の `rand::Rng` をラップする乱数源
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_index(&mut self, n: usize) -> usize {
        self.0.gen_range(0..n)
    }
}

/// 当選者セレクタ
///
/// 参加者リストは読むだけで変更しない。毎回の抽選は独立（復元抽出）。
#[derive(Debug, Clone)]
pub struct WinnerSelector<S = RngSource<ThreadRng>> {
    source: S,
}

impl Default for WinnerSelector {
    fn default() -> Self {
        Self::new(RngSource(rand::thread_rng()))
    }
}

impl WinnerSelector<RngSource<StdRng>> {
    /// シード固定の抽選（再現用）
    pub fn seeded(seed: u64) -> Self {
        Self::new(RngSource(StdRng::seed_from_u64(seed)))
    }
}

impl<S: RandomSource> WinnerSelector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn select_winner(&mut self, participants: &[Participant]) -> Option<Participant> {
        if participants.is_empty() {
            return None;
        }
        let index = self.source.next_index(participants.len());
        let winner = participants.get(index).cloned();
        if let Some(winner) = &winner {
            tracing::info!(
                index = index,
                pool_size = participants.len(),
                winner = %winner,
                "🎁 Winner selected"
            );
        }
        winner
    }

    /// 重複なしで最大 `count` 人を抽選
    pub fn select_winners(&mut self, participants: &[Participant], count: usize) -> Vec<Participant> {
        let count = count.min(participants.len());
        let mut indices: Vec<usize> = (0..participants.len()).collect();

        // 部分Fisher-Yates
        for i in 0..count {
            let j = i + self.source.next_index(indices.len() - i);
            indices.swap(i, j);
        }

        indices[..count]
            .iter()
            .map(|&i| participants[i].clone())
            .collect()
    }
}
