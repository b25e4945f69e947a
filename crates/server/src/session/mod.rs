//! Game sessions: lifecycle transitions, the move pipeline and clock accounting.
//! Every mutation of one session is serialized by that session's mutex.

pub mod clock;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod pipeline;

pub use error::SessionError;
pub use events::{EventSink, GameEvent, LogSink, SessionPublisher};
pub use lifecycle::SessionManager;
pub use model::{
    ColorChoice, GameResult, GameSession, GameStatus, GuestCredentials, Identity, MoveRecord,
    Occupant, PlayerInfo, Seat, SessionView, TimeControl, UserRef,
};
pub use pipeline::MoveOutcome;
