use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::{ChannelProfile, ClientRole, EngineOptions};
use crate::events::CallEvent;

/// Identity of one live engine instance.
///
/// Owned exclusively by the session that created it while the session is
/// non-idle; consumed by [`EngineAdapter::destroy`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineHandle {
    id: Uuid,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Setup-time failure: invalid credential, missing native resources.
/// Fatal to the owning session only.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineInitError(pub String);

/// Parameters for creating one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tag the engine stamps on every event it emits.
    pub session_id: String,
    pub app_credential: String,
    pub options: EngineOptions,
}

/// Channel membership parameters passed with a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    pub channel_profile: ChannelProfile,
    pub client_role: ClientRole,
}

/// Boundary to the opaque media transport engine.
///
/// Setup operations (`create_engine`, `destroy`) are synchronous and may
/// fail. `join` and `leave` never fail directly: implementations queue
/// the request and return without waiting on the network, and every
/// outcome arrives as a [`CallEvent`] on the sender given at creation,
/// stamped with the configured session id. Events from one engine are
/// delivered in order; nothing is guaranteed across engines. Engines may
/// still emit after teardown, so consumers drop events they cannot route.
///
/// Destroying an engine implicitly leaves any channel it is joined to.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Create an engine with the capabilities in `config.options`
    /// (video/audio enablement, encoder settings, camera selection).
    fn create_engine(
        &self,
        config: &EngineConfig,
        events: mpsc::UnboundedSender<CallEvent>,
    ) -> Result<EngineHandle, EngineInitError>;

    /// Bind the local capture surface and begin preview.
    fn start_preview(&self, handle: &EngineHandle);

    /// Stop preview and release the local surface binding.
    fn stop_preview(&self, handle: &EngineHandle);

    /// Request channel membership. `uid` 0 asks the engine to assign one.
    async fn join(&self, handle: &EngineHandle, channel: &str, uid: u32, options: ChannelOptions);

    /// Request leaving the current channel.
    async fn leave(&self, handle: &EngineHandle);

    /// Tear the engine down, releasing native resources.
    fn destroy(&self, handle: EngineHandle);
}
