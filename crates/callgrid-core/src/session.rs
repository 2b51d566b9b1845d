use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::SessionConfig;
use crate::engine::EngineHandle;
use crate::errors::SessionError;
use crate::events::SessionState;

/// A remote participant currently visible in a session's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub uid: u32,
    pub joined_at: DateTime<Utc>,
}

/// One engine's channel membership, tracked as a finite-state machine:
/// Idle → Joining → Joined → Leaving → Idle, with Failed reachable from
/// Joining/Joined and left only through an explicit reset.
///
/// All mutation goes through the manager's decision loop. Each method
/// applies exactly one transition and maintains the handle invariant:
/// the engine handle is present iff the session is neither Idle nor
/// cleaned up after a failure.
pub(crate) struct StreamSession {
    config: SessionConfig,
    state: SessionState,
    handle: Option<EngineHandle>,
    local_uid: u32,
    remote_users: HashMap<u32, RemoteUser>,
    error: Option<SessionError>,
    join_attempt: u64,
    stale_join: bool,
}

impl StreamSession {
    pub fn new(config: SessionConfig) -> Self {
        let local_uid = config.local_user_id;
        Self {
            config,
            state: SessionState::Idle,
            handle: None,
            local_uid,
            remote_users: HashMap::new(),
            error: None,
            join_attempt: 0,
            stale_join: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn handle(&self) -> Option<&EngineHandle> {
        self.handle.as_ref()
    }

    /// The local uid in effect: engine-assigned once joined, otherwise
    /// the configured value.
    pub fn local_uid(&self) -> u32 {
        self.local_uid
    }

    pub fn remote_users(&self) -> Vec<RemoteUser> {
        let mut users: Vec<RemoteUser> = self.remote_users.values().cloned().collect();
        users.sort_by_key(|u| u.uid);
        users
    }

    pub fn attempt(&self) -> u64 {
        self.join_attempt
    }

    /// True while an `end` issued during Joining waits for the in-flight
    /// join to resolve.
    pub fn stale_join_pending(&self) -> bool {
        self.state == SessionState::Leaving && self.stale_join
    }

    /// Idle → Joining. Takes ownership of a freshly created engine and
    /// returns the attempt counter used to match the join deadline.
    pub fn begin_join(&mut self, handle: EngineHandle) -> u64 {
        debug_assert_eq!(self.state, SessionState::Idle);
        self.handle = Some(handle);
        self.state = SessionState::Joining;
        self.error = None;
        self.stale_join = false;
        self.join_attempt += 1;
        self.join_attempt
    }

    /// Joining → Joined. A non-zero uid from the engine overrides the
    /// configured one (uid 0 means engine-assigned).
    pub fn confirm_join(&mut self, uid: u32) {
        debug_assert_eq!(self.state, SessionState::Joining);
        if uid != 0 {
            self.local_uid = uid;
        }
        self.state = SessionState::Joined;
    }

    /// Joining|Joined → Failed. The handle is kept; partial engine
    /// resources are released on reset.
    pub fn fail(&mut self, error: SessionError) {
        self.error = Some(error);
        self.state = SessionState::Failed;
    }

    /// Joined|Joining → Leaving. An end during Joining marks the
    /// in-flight join stale so its eventual confirmation cannot settle
    /// the session into Joined.
    pub fn begin_leave(&mut self) {
        debug_assert!(matches!(
            self.state,
            SessionState::Joined | SessionState::Joining
        ));
        if self.state == SessionState::Joining {
            self.stale_join = true;
        }
        self.state = SessionState::Leaving;
    }

    /// Leaving → Idle. Clears remote users and yields the handle for
    /// destruction.
    pub fn finish_leave(&mut self) -> Option<EngineHandle> {
        debug_assert_eq!(self.state, SessionState::Leaving);
        self.clear_to_idle()
    }

    /// Failed → Idle. Clears the recorded error and yields whatever
    /// partial engine resources are still held.
    pub fn reset(&mut self) -> Option<EngineHandle> {
        debug_assert_eq!(self.state, SessionState::Failed);
        self.clear_to_idle()
    }

    /// Yield the handle without a state transition; shutdown teardown.
    pub fn take_handle(&mut self) -> Option<EngineHandle> {
        self.handle.take()
    }

    fn clear_to_idle(&mut self) -> Option<EngineHandle> {
        self.state = SessionState::Idle;
        self.remote_users.clear();
        self.error = None;
        self.stale_join = false;
        self.local_uid = self.config.local_user_id;
        self.handle.take()
    }

    /// Record a remote user. Returns false for a duplicate.
    pub fn user_joined(&mut self, uid: u32, joined_at: DateTime<Utc>) -> bool {
        if self.remote_users.contains_key(&uid) {
            return false;
        }
        self.remote_users.insert(uid, RemoteUser { uid, joined_at });
        true
    }

    /// Drop a remote user. Returns false when the uid was absent, which
    /// happens when joined/left events arrive out of order.
    pub fn user_left(&mut self, uid: u32) -> bool {
        self.remote_users.remove(&uid).is_some()
    }
}
