pub mod models;
pub mod poller;
pub mod registry;
pub mod source;
pub mod winner;

pub use models::{ChatMessage, FetchedMessage, Participant};
pub use poller::{
    ChatPoller, NoopObserver, ParticipantsObserver, PollerConfig, PollerState, PollerStatus,
    PollerUpdate, DEFAULT_POLL_INTERVAL,
};
pub use registry::{BatchOutcome, ChatSession, ParticipantRegistry, DEFAULT_MESSAGE_WINDOW};
pub use source::ChatSource;
pub use winner::{RandomSource, RngSource, WinnerSelector};
