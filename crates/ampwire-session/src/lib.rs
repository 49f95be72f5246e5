//! Device session management and volume control for networked amplifiers.
//!
//! Layers, bottom up:
//! - [`session`]: one TCP connection with a typed state machine and an
//!   inbound feedback reader
//! - [`pool`]: capacity-one pool that serializes command dispatch and
//!   reconnects lazily
//! - [`controller`]: volume/source intents, coalescing, and device state
//!   reconciliation
//!
//! Settings are carried by an explicit [`DeviceContext`].

pub mod controller;
pub mod error;
pub mod pool;
pub mod session;
pub mod settings;

pub use controller::{
    Ack, ControllerConfig, DeviceState, Dispatch, VolumeController, VolumeMode, VolumeScale,
    DEFAULT_STATUS,
};
pub use error::{ConfigError, ControlError, Result, SessionError};
pub use pool::{ConnectionPool, PoolConfig, PooledSession};
pub use session::{DeviceSession, FeedbackSender, SessionConfig, SessionState};
pub use settings::{DeviceContext, InputSource, Settings, DEFAULT_PORT};
