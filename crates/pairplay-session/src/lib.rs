//! Connection session management for Pairplay.
//!
//! This crate tracks every live socket between the transport and the room
//! layer:
//!
//! 1. **Classification**: which side of the game a socket is on
//!    ([`ConnectionClass`], picked from the upgrade path).
//! 2. **Identity hints**: a cosmetic display name pulled from the optional
//!    bearer token ([`IdentityResolver`] trait).
//! 3. **Fan-out**: channel membership and per-connection outbound queues
//!    ([`SessionManager`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← broadcasts room events through channels
//!     ↕
//! Session Layer (this crate)  ← who is connected, who listens where
//!     ↕
//! Protocol Layer (below) ← ConnectionId, ServerEvent
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod identity;
mod manager;
mod session;

pub use error::SessionError;
pub use identity::{Identity, IdentityResolver, UnverifiedTokenHint, decode_token_hint};
pub use manager::{Outbound, SessionManager};
pub use session::{ConnectionClass, Session};
