//! # Pairplay
//!
//! Room and controller pairing server for couch-multiplayer web games.
//!
//! A big screen (the *display*) creates a room and shows its 4-digit PIN.
//! Other displays join by PIN and each gets a seat with a 3-digit pairing
//! code; phones (the *controllers*) enter the PIN and a pairing code to
//! drive that seat. When every seat is ready the host starts a 3-second
//! countdown, after which the round begins.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pairplay::prelude::*;
//!
//! # async fn run() -> Result<(), PairplayError> {
//! let server = PairplayServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! Displays connect to `/game`, controllers to `/mobile`. Either may pass
//! an optional `?token=` whose payload supplies a display name.

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::PairplayError;
pub use server::{PairplayServer, PairplayServerBuilder};

/// Re-exports of commonly used types.
pub mod prelude {
    pub use crate::{PairplayError, PairplayServer, PairplayServerBuilder, ServerConfig};
    pub use pairplay_protocol::{
        Ack, AckData, ConnectionId, ControllerRequest, DisplayRequest, PairingCode, Pin,
        RoomId, RoomSnapshot, ServerEvent,
    };
    pub use pairplay_room::{
        CoordinatorHandle, CoordinatorStats, MatchRecorder, NoopRecorder, RepairPolicy,
        RoomConfig, RoomError, TracingRecorder,
    };
    pub use pairplay_session::{Identity, IdentityResolver, UnverifiedTokenHint};
}
