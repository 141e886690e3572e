pub mod address;
pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod giveaway;
pub mod io;
pub mod utils;

// Re-export the main error types for convenience
pub use api::youtube::FetchError;
pub use error::{SolchatError, SolchatResult};
pub use giveaway::PayoutError;
pub use io::ParticipantFileError;

// Re-export the core giveaway pipeline
pub use address::{AddressExtractor, AddressValidator, Base58PubkeyValidator, PayoutAddress};
pub use chat::{
    ChatPoller, ChatSource, FetchedMessage, Participant, ParticipantsObserver, PollerConfig,
    PollerState, PollerStatus, WinnerSelector,
};

// Re-export the YouTube Data API client
pub use api::youtube::{extract_video_id, ApiKey, VideoId, YoutubeClient};

// Re-export I/O utilities for convenience
pub use io::ndjson::{
    parse_ndjson_file_generic, parse_ndjson_file_timestamped, read_participants,
    write_participants, TimestampedEntry,
};
