//! Assist Shared Types and Utilities
//!
//! Runtime-free building blocks of the assist relay: peer identity parsing,
//! reserved event names, the event envelope, session info and errors.

pub mod envelope;
pub mod error;
pub mod events;
pub mod peer;
pub mod types;

pub use envelope::{meta_tab_id, Envelope, Meta};
pub use error::*;
pub use peer::{AddressResolver, PeerAddress, ResolvedPeer};
pub use types::*;
