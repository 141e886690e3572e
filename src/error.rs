//! クレート全体のエラー型

use thiserror::Error;

use crate::api::youtube::FetchError;
use crate::giveaway::PayoutError;
use crate::io::ParticipantFileError;

#[derive(Error, Debug)]
pub enum SolchatError {
    #[error("YouTube API error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Participant file error: {0}")]
    Io(#[from] ParticipantFileError),

    #[error("Payout error: {0}")]
    Payout(#[from] PayoutError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type SolchatResult<T> = Result<T, SolchatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let error: SolchatError = PayoutError::NoWinners.into();
        assert!(matches!(error, SolchatError::Payout(PayoutError::NoWinners)));
        assert!(error.to_string().contains("No winners"));

        let error: SolchatError = ParticipantFileError::no_data("empty").into();
        assert!(error.to_string().starts_with("Participant file error"));

        let error: SolchatError = FetchError::no_active_chat("abcdefghijk").into();
        assert!(matches!(error, SolchatError::Fetch(ref e) if e.is_terminal()));
    }
}
