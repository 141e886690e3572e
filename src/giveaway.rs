//! ギブアウェイの配分計算
//!
//! 合計額を当選者で均等に割り、各送金額をlamports単位で求める。
//! 送金トランザクションの作成と署名はウォレット側の責務でここでは扱わない。

use serde::{Deserialize, Serialize};

use crate::address::{AddressExtractor, PayoutAddress};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
const SOL_DECIMALS: usize = 9;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PayoutError {
    #[error("Invalid SOL amount: '{0}'")]
    InvalidAmount(String),
    #[error("Amount must be greater than zero")]
    ZeroAmount,
    #[error("No winners to pay out")]
    NoWinners,
    #[error("Invalid winner address: '{0}'")]
    InvalidAddress(String),
    #[error("Amount of {lamports} lamports is too small to split among {winners} winners")]
    AmountTooSmall { lamports: u64, winners: usize },
}

/// "1.25" のようなSOL表記をlamportsに変換する（浮動小数点は使わない）
pub fn parse_sol_amount(input: &str) -> Result<u64, PayoutError> {
    let invalid = || PayoutError::InvalidAmount(input.to_string());
    let trimmed = input.trim();

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
        || fraction.len() > SOL_DECIMALS
    {
        return Err(invalid());
    }

    let whole_lamports = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .ok()
            .and_then(|sol| sol.checked_mul(LAMPORTS_PER_SOL))
            .ok_or_else(invalid)?
    };

    let fraction_lamports = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = SOL_DECIMALS);
        padded.parse::<u64>().map_err(|_| invalid())?
    };

    whole_lamports
        .checked_add(fraction_lamports)
        .ok_or_else(invalid)
}

/// lamportsをSOL表記に戻す（末尾の0は省く）
pub fn format_lamports(lamports: u64) -> String {
    let whole = lamports / LAMPORTS_PER_SOL;
    let fraction = lamports % LAMPORTS_PER_SOL;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction, width = SOL_DECIMALS);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub recipient: PayoutAddress,
    pub lamports: u64,
}

/// 当選者ごとの送金計画
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPlan {
    pub total_lamports: u64,
    pub payouts: Vec<Payout>,
    /// 割り切れず送金されずに残る分
    pub remainder_lamports: u64,
}

impl PayoutPlan {
    pub fn split_evenly(total_lamports: u64, winners: &[PayoutAddress]) -> Result<Self, PayoutError> {
        if total_lamports == 0 {
            return Err(PayoutError::ZeroAmount);
        }
        if winners.is_empty() {
            return Err(PayoutError::NoWinners);
        }

        let count = winners.len() as u64;
        let share = total_lamports / count;
        if share == 0 {
            return Err(PayoutError::AmountTooSmall {
                lamports: total_lamports,
                winners: winners.len(),
            });
        }

        let payouts = winners
            .iter()
            .map(|recipient| Payout {
                recipient: recipient.clone(),
                lamports: share,
            })
            .collect();

        Ok(Self {
            total_lamports,
            payouts,
            remainder_lamports: total_lamports % count,
        })
    }

    /// 金額文字列と1行1アドレスの当選者リストから計画を作る
    ///
    /// 空行は無視する。不正なアドレスが1つでもあればエラー。
    pub fn from_input<'a>(
        amount: &str,
        winner_lines: impl IntoIterator<Item = &'a str>,
        extractor: &AddressExtractor,
    ) -> Result<Self, PayoutError> {
        let total_lamports = parse_sol_amount(amount)?;

        let winners = winner_lines
            .into_iter()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                extractor
                    .validate(line)
                    .ok_or_else(|| PayoutError::InvalidAddress(line.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let plan = Self::split_evenly(total_lamports, &winners)?;
        tracing::info!(
            total = %format_lamports(plan.total_lamports),
            winners = plan.payouts.len(),
            remainder_lamports = plan.remainder_lamports,
            "🧮 Payout plan created"
        );
        Ok(plan)
    }

    pub fn distributed_lamports(&self) -> u64 {
        self.payouts.iter().map(|payout| payout.lamports).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR_A: &str = "3N2ZsQYxkLX8fa7Aaa6pvJxNpwvqLdXWvWY8bMeQzXbS";
    const ADDR_B: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    const ADDR_C: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    #[test]
    fn test_parse_sol_amount() {
        assert_eq!(parse_sol_amount("1"), Ok(LAMPORTS_PER_SOL));
        assert_eq!(parse_sol_amount("1.5"), Ok(1_500_000_000));
        assert_eq!(parse_sol_amount(" 0.000000001 "), Ok(1));
        assert_eq!(parse_sol_amount(".25"), Ok(250_000_000));
        assert_eq!(parse_sol_amount("2."), Ok(2 * LAMPORTS_PER_SOL));
    }

    #[test]
    fn test_parse_sol_amount_rejects_garbage() {
        for input in ["", ".", "-1", "1.2.3", "abc", "1e9", "0.0000000001", "99999999999999999999"] {
            assert!(
                matches!(parse_sol_amount(input), Err(PayoutError::InvalidAmount(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_format_lamports() {
        assert_eq!(format_lamports(0), "0");
        assert_eq!(format_lamports(LAMPORTS_PER_SOL), "1");
        assert_eq!(format_lamports(1_500_000_000), "1.5");
        assert_eq!(format_lamports(1), "0.000000001");
    }

    #[test]
    fn test_split_evenly_with_remainder() {
        let winners = vec![
            PayoutAddress(ADDR_A.to_string()),
            PayoutAddress(ADDR_B.to_string()),
            PayoutAddress(ADDR_C.to_string()),
        ];
        let plan = PayoutPlan::split_evenly(LAMPORTS_PER_SOL, &winners).unwrap();

        assert_eq!(plan.payouts.len(), 3);
        assert!(plan.payouts.iter().all(|p| p.lamports == 333_333_333));
        assert_eq!(plan.remainder_lamports, 1);
        assert_eq!(
            plan.distributed_lamports() + plan.remainder_lamports,
            plan.total_lamports
        );
    }

    #[test]
    fn test_split_errors() {
        let one = vec![PayoutAddress(ADDR_A.to_string())];
        assert_eq!(PayoutPlan::split_evenly(0, &one), Err(PayoutError::ZeroAmount));
        assert_eq!(PayoutPlan::split_evenly(10, &[]), Err(PayoutError::NoWinners));

        let two = vec![
            PayoutAddress(ADDR_A.to_string()),
            PayoutAddress(ADDR_B.to_string()),
        ];
        assert_eq!(
            PayoutPlan::split_evenly(1, &two),
            Err(PayoutError::AmountTooSmall {
                lamports: 1,
                winners: 2
            })
        );
    }

    #[test]
    fn test_from_input_skips_blank_lines() {
        let extractor = AddressExtractor::default();
        let input = format!("{ADDR_A}\n\n  {ADDR_B}  \n");
        let plan = PayoutPlan::from_input("0.2", input.lines(), &extractor).unwrap();

        assert_eq!(plan.payouts.len(), 2);
        assert_eq!(plan.payouts[1].recipient.as_str(), ADDR_B);
        assert_eq!(plan.payouts[0].lamports, 100_000_000);
    }

    #[test]
    fn test_from_input_rejects_invalid_address() {
        let extractor = AddressExtractor::default();
        let result = PayoutPlan::from_input("1", [ADDR_A, "not-a-wallet"], &extractor);
        assert_eq!(
            result,
            Err(PayoutError::InvalidAddress("not-a-wallet".to_string()))
        );
    }
}
