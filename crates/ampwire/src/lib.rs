//! Volume and input control for networked amplifiers.
//!
//! The amplifier speaks a small checksum-framed protocol over TCP port 1901.
//! This crate bundles the pieces needed to drive it.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire framing, checksum and payload classification
//! - [`session`]: device sessions, the connection pool and the volume
//!   controller (behind the default `session` feature)

/// Re-export frame types.
pub mod frame {
    pub use ampwire_frame::*;
}

/// Re-export session and controller types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use ampwire_session::*;
}
