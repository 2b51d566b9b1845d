//! Callgrid core: multi-stream call session management.
//!
//! Tracks join/leave lifecycle for any number of independent media
//! engines (e.g. front and back camera feeds) bound to one UI session,
//! each behind the opaque [`EngineAdapter`] boundary. Pure Rust crate
//! with no platform dependencies; consumed by native shells through the
//! [`SessionObserver`] notification trait.

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod manager;
mod session;

pub use config::{
    CallConfig, CameraFacing, ChannelProfile, ClientRole, EngineOptions, OrientationMode,
    SessionConfig, VideoEncoderConfig,
};
pub use engine::{ChannelOptions, EngineAdapter, EngineConfig, EngineHandle, EngineInitError};
pub use errors::{CallError, SessionError};
pub use events::{
    CallEvent, ObserverHub, SessionNotification, SessionObserver, SessionState, UserLeftReason,
};
pub use manager::{BatchOutcome, SessionManager};
pub use session::RemoteUser;
