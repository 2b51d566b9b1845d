use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};

use crate::config::{CallConfig, SessionConfig};
use crate::engine::{ChannelOptions, EngineAdapter, EngineConfig};
use crate::errors::{CallError, SessionError};
use crate::events::{
    CallEvent, ObserverHub, SessionNotification, SessionObserver, SessionState,
};
use crate::session::{RemoteUser, StreamSession};

/// Per-session results of a best-effort batch command, in the order the
/// ids were given. One session's failure never aborts the remainder.
#[derive(Debug)]
pub struct BatchOutcome {
    pub outcomes: Vec<(String, Result<(), CallError>)>,
}

impl BatchOutcome {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|(_, result)| result.is_ok())
    }

    pub fn result_for(&self, id: &str) -> Option<&Result<(), CallError>> {
        self.outcomes
            .iter()
            .find(|(session_id, _)| session_id == id)
            .map(|(_, result)| result)
    }
}

enum Command {
    Register {
        config: SessionConfig,
        reply: oneshot::Sender<Result<String, CallError>>,
    },
    Start {
        id: String,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    StartAll {
        ids: Vec<String>,
        reply: oneshot::Sender<BatchOutcome>,
    },
    End {
        id: String,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    EndAll {
        ids: Vec<String>,
        reply: oneshot::Sender<BatchOutcome>,
    },
    Reset {
        id: String,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    State {
        id: String,
        reply: oneshot::Sender<Result<SessionState, CallError>>,
    },
    RemoteUsers {
        id: String,
        reply: oneshot::Sender<Result<Vec<RemoteUser>, CallError>>,
    },
    LocalUid {
        id: String,
        reply: oneshot::Sender<Result<u32, CallError>>,
    },
    SessionIds {
        reply: oneshot::Sender<Vec<String>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct JoinDeadline {
    session_id: String,
    attempt: u64,
}

/// Manages the lifecycle of every registered stream session.
///
/// Cheap to clone. Each method sends a command into a single decision
/// loop and returns as soon as the state mutation is applied; join and
/// leave completion is reported through [`SessionObserver`]
/// notifications, never awaited by the caller. Must be created inside a
/// tokio runtime.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::UnboundedSender<Command>,
    hub: ObserverHub,
}

impl SessionManager {
    pub fn new(engine: Arc<dyn EngineAdapter>, config: CallConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (deadline_tx, deadline_rx) = mpsc::unbounded_channel();
        let hub = ObserverHub::new();

        let decision_loop = DecisionLoop {
            engine,
            config,
            hub: hub.clone(),
            sessions: IndexMap::new(),
            event_tx,
            deadline_tx,
        };
        tokio::spawn(decision_loop.run(command_rx, event_rx, deadline_rx));

        Self { commands, hub }
    }

    /// Register an observer for session notifications.
    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.hub.add_observer(observer);
    }

    /// Register a new session in Idle. The engine is created lazily on
    /// the first `start`, so an Idle session holds no native resources.
    pub async fn register(&self, config: SessionConfig) -> Result<String, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Register { config, reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)?
    }

    /// Start an Idle session: create its engine, bind preview, issue the
    /// asynchronous join, arm the join deadline.
    pub async fn start(&self, id: impl Into<String>) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Start { id: id.into(), reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)?
    }

    /// Start sessions in the given order, best-effort.
    pub async fn start_all(&self, ids: Vec<String>) -> Result<BatchOutcome, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::StartAll { ids, reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)
    }

    /// End a session. No-op on Idle; an end while Joining marks the
    /// in-flight join stale and the session settles to Idle once the
    /// join resolves.
    pub async fn end(&self, id: impl Into<String>) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::End { id: id.into(), reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)?
    }

    /// End sessions in the given order, best-effort.
    pub async fn end_all(&self, ids: Vec<String>) -> Result<BatchOutcome, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::EndAll { ids, reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)
    }

    /// Recover a Failed session back to Idle, releasing any partial
    /// engine resources.
    pub async fn reset(&self, id: impl Into<String>) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Reset { id: id.into(), reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)?
    }

    pub async fn state(&self, id: impl Into<String>) -> Result<SessionState, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::State { id: id.into(), reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)?
    }

    pub async fn remote_users(&self, id: impl Into<String>) -> Result<Vec<RemoteUser>, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::RemoteUsers { id: id.into(), reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)?
    }

    /// The local uid in effect for a session: the engine-assigned one
    /// once joined (when the config asked for auto-assignment with 0),
    /// otherwise the configured value.
    pub async fn local_uid(&self, id: impl Into<String>) -> Result<u32, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::LocalUid { id: id.into(), reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)?
    }

    /// Session ids in registration order.
    pub async fn session_ids(&self) -> Result<Vec<String>, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SessionIds { reply })
            .map_err(|_| CallError::Terminated)?;
        rx.await.map_err(|_| CallError::Terminated)
    }

    /// End every session, destroy every engine handle, clear the map
    /// and stop the decision loop. Safe to call repeatedly; once the
    /// loop is gone this is a no-op.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_err() {
            return;
        }
        let _ = rx.await;
    }
}

/// The single decision loop. Owns the session map outright: commands,
/// engine events and join deadlines are merged and applied one at a
/// time, so a UI-issued end can never race an in-flight join
/// confirmation for the same session.
struct DecisionLoop {
    engine: Arc<dyn EngineAdapter>,
    config: CallConfig,
    hub: ObserverHub,
    sessions: IndexMap<String, StreamSession>,
    event_tx: mpsc::UnboundedSender<CallEvent>,
    deadline_tx: mpsc::UnboundedSender<JoinDeadline>,
}

impl DecisionLoop {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<CallEvent>,
        mut deadlines: mpsc::UnboundedReceiver<JoinDeadline>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown_all().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    // every handle dropped: tear down as a shutdown would
                    None => {
                        self.shutdown_all().await;
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event).await,
                Some(deadline) = deadlines.recv() => self.handle_deadline(deadline).await,
            }
        }
        tracing::debug!("session manager loop ended");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Register { config, reply } => {
                let _ = reply.send(self.do_register(config));
            }
            Command::Start { id, reply } => {
                let _ = reply.send(self.do_start(&id).await);
            }
            Command::StartAll { ids, reply } => {
                let mut outcomes = Vec::with_capacity(ids.len());
                for id in ids {
                    let result = self.do_start(&id).await;
                    outcomes.push((id, result));
                }
                let _ = reply.send(BatchOutcome { outcomes });
            }
            Command::End { id, reply } => {
                let _ = reply.send(self.do_end(&id).await);
            }
            Command::EndAll { ids, reply } => {
                let mut outcomes = Vec::with_capacity(ids.len());
                for id in ids {
                    let result = self.do_end(&id).await;
                    outcomes.push((id, result));
                }
                let _ = reply.send(BatchOutcome { outcomes });
            }
            Command::Reset { id, reply } => {
                let _ = reply.send(self.do_reset(&id));
            }
            Command::State { id, reply } => {
                let result = self
                    .sessions
                    .get(&id)
                    .map(|session| session.state())
                    .ok_or(CallError::UnknownSession(id));
                let _ = reply.send(result);
            }
            Command::RemoteUsers { id, reply } => {
                let result = self
                    .sessions
                    .get(&id)
                    .map(|session| session.remote_users())
                    .ok_or(CallError::UnknownSession(id));
                let _ = reply.send(result);
            }
            Command::LocalUid { id, reply } => {
                let result = self
                    .sessions
                    .get(&id)
                    .map(|session| session.local_uid())
                    .ok_or(CallError::UnknownSession(id));
                let _ = reply.send(result);
            }
            Command::SessionIds { reply } => {
                let _ = reply.send(self.sessions.keys().cloned().collect());
            }
            // handled in run()
            Command::Shutdown { .. } => {}
        }
    }

    fn do_register(&mut self, config: SessionConfig) -> Result<String, CallError> {
        let id = config.session_id.clone();
        if self.sessions.contains_key(&id) {
            return Err(CallError::DuplicateSession(id));
        }
        tracing::info!(
            "session '{id}' registered for channel '{}'",
            config.channel_name
        );
        self.sessions.insert(id.clone(), StreamSession::new(config));
        self.notify_state(&id);
        Ok(id)
    }

    async fn do_start(&mut self, id: &str) -> Result<(), CallError> {
        let Some(state) = self.sessions.get(id).map(|s| s.state()) else {
            return Err(CallError::UnknownSession(id.to_string()));
        };
        if state != SessionState::Idle {
            return Err(CallError::InvalidState {
                id: id.to_string(),
                state,
                command: "start",
            });
        }

        let Some(config) = self.sessions.get(id).map(|s| s.config().clone()) else {
            return Err(CallError::UnknownSession(id.to_string()));
        };
        let engine_config = EngineConfig {
            session_id: id.to_string(),
            app_credential: config.app_credential.clone(),
            options: config.engine_options.clone(),
        };

        let handle = match self
            .engine
            .create_engine(&engine_config, self.event_tx.clone())
        {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!("session '{id}': engine init failed: {err}");
                if let Some(session) = self.sessions.get_mut(id) {
                    session.fail(SessionError::Init(err.0.clone()));
                }
                self.notify_state(id);
                return Err(CallError::EngineInit {
                    id: id.to_string(),
                    reason: err.0,
                });
            }
        };

        self.engine.start_preview(&handle);
        let Some(attempt) = self
            .sessions
            .get_mut(id)
            .map(|s| s.begin_join(handle.clone()))
        else {
            return Err(CallError::UnknownSession(id.to_string()));
        };
        self.notify_state(id);

        let options = ChannelOptions {
            channel_profile: config.engine_options.channel_profile,
            client_role: config.engine_options.client_role,
        };
        self.engine
            .join(&handle, &config.channel_name, config.local_user_id, options)
            .await;
        self.arm_join_deadline(id, attempt);
        Ok(())
    }

    async fn do_end(&mut self, id: &str) -> Result<(), CallError> {
        let Some(state) = self.sessions.get(id).map(|s| s.state()) else {
            return Err(CallError::UnknownSession(id.to_string()));
        };
        match state {
            // idempotent: ending a session that is not in a call succeeds
            SessionState::Idle => Ok(()),
            SessionState::Joined => {
                let handle = self.sessions.get_mut(id).and_then(|session| {
                    session.begin_leave();
                    session.handle().cloned()
                });
                self.notify_state(id);
                if let Some(handle) = &handle {
                    self.engine.stop_preview(handle);
                    self.engine.leave(handle).await;
                }
                self.settle_leave(id);
                Ok(())
            }
            SessionState::Joining => {
                let handle = self.sessions.get_mut(id).and_then(|session| {
                    session.begin_leave();
                    session.handle().cloned()
                });
                if let Some(handle) = &handle {
                    self.engine.stop_preview(handle);
                }
                self.notify_state(id);
                // settles to Idle once the in-flight join resolves
                Ok(())
            }
            state @ (SessionState::Leaving | SessionState::Failed) => {
                Err(CallError::InvalidState {
                    id: id.to_string(),
                    state,
                    command: "end",
                })
            }
        }
    }

    fn do_reset(&mut self, id: &str) -> Result<(), CallError> {
        let Some(state) = self.sessions.get(id).map(|s| s.state()) else {
            return Err(CallError::UnknownSession(id.to_string()));
        };
        if state != SessionState::Failed {
            return Err(CallError::InvalidState {
                id: id.to_string(),
                state,
                command: "reset",
            });
        }
        if let Some(session) = self.sessions.get_mut(id) {
            if let Some(handle) = session.reset() {
                // destroying the engine implicitly leaves a half-joined channel
                self.engine.destroy(handle);
            }
        }
        tracing::info!("session '{id}' reset to idle");
        self.notify_state(id);
        Ok(())
    }

    async fn handle_event(&mut self, event: CallEvent) {
        let id = event.session_id().to_string();
        let Some(state) = self.sessions.get(&id).map(|s| s.state()) else {
            tracing::debug!("dropping event for unknown session '{id}': {event:?}");
            return;
        };

        match event {
            CallEvent::JoinSucceeded { uid, channel, .. } => match state {
                SessionState::Joining => {
                    if let Some(session) = self.sessions.get_mut(&id) {
                        session.confirm_join(uid);
                    }
                    tracing::info!("session '{id}' joined channel '{channel}' as uid {uid}");
                    self.notify_state(&id);
                }
                SessionState::Leaving if self.stale_join_pending(&id) => {
                    // the join settled after an end was issued; leave at
                    // once, the session must never land in Joined
                    tracing::info!("session '{id}': stale join confirmation, leaving");
                    let handle = self.sessions.get(&id).and_then(|s| s.handle().cloned());
                    if let Some(handle) = &handle {
                        self.engine.leave(handle).await;
                    }
                    self.settle_leave(&id);
                }
                _ => tracing::debug!("session '{id}': dropping JoinSucceeded in {state:?}"),
            },
            CallEvent::JoinFailed { code, .. } => match state {
                SessionState::Joining => {
                    if let Some(session) = self.sessions.get_mut(&id) {
                        session.fail(SessionError::JoinFailed(code));
                    }
                    tracing::warn!("session '{id}': join failed with code {code}");
                    self.notify_state(&id);
                }
                SessionState::Leaving if self.stale_join_pending(&id) => {
                    // the abandoned join never happened; nothing to leave
                    self.settle_leave(&id);
                }
                _ => tracing::debug!("session '{id}': dropping JoinFailed in {state:?}"),
            },
            CallEvent::EngineError { code, .. } => match state {
                SessionState::Joining | SessionState::Joined => {
                    if let Some(session) = self.sessions.get_mut(&id) {
                        session.fail(SessionError::Engine(code));
                    }
                    tracing::warn!("session '{id}': engine error {code}");
                    self.notify_state(&id);
                }
                _ => tracing::debug!("session '{id}': dropping EngineError in {state:?}"),
            },
            CallEvent::UserJoined { uid, .. } => {
                if state == SessionState::Joined {
                    let added = self
                        .sessions
                        .get_mut(&id)
                        .map(|s| s.user_joined(uid, Utc::now()))
                        .unwrap_or(false);
                    if added {
                        self.hub.notify(SessionNotification::RemoteUserChanged {
                            session_id: id,
                            uid,
                            present: true,
                        });
                    }
                } else {
                    tracing::debug!("session '{id}': dropping UserJoined in {state:?}");
                }
            }
            CallEvent::UserLeft { uid, reason, .. } => {
                if state == SessionState::Joined {
                    let removed = self
                        .sessions
                        .get_mut(&id)
                        .map(|s| s.user_left(uid))
                        .unwrap_or(false);
                    if removed {
                        tracing::info!("session '{id}': user {uid} left ({reason:?})");
                        self.hub.notify(SessionNotification::RemoteUserChanged {
                            session_id: id,
                            uid,
                            present: false,
                        });
                    } else {
                        // left-before-joined jitter; nothing to remove
                        tracing::debug!("session '{id}': UserLeft for absent uid {uid}");
                    }
                } else {
                    tracing::debug!("session '{id}': dropping UserLeft in {state:?}");
                }
            }
        }
    }

    async fn handle_deadline(&mut self, deadline: JoinDeadline) {
        let id = deadline.session_id;
        let Some((state, attempt, stale)) = self
            .sessions
            .get(&id)
            .map(|s| (s.state(), s.attempt(), s.stale_join_pending()))
        else {
            return;
        };
        if attempt != deadline.attempt {
            // a newer join attempt owns the session now
            return;
        }
        match state {
            SessionState::Joining => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.fail(SessionError::Timeout);
                }
                tracing::warn!("session '{id}': no join confirmation before the deadline");
                self.notify_state(&id);
            }
            SessionState::Leaving if stale => {
                // the abandoned join never resolved; finish the leave
                self.settle_leave(&id);
            }
            _ => {}
        }
    }

    /// Leaving → Idle: destroy the handle and report the final state.
    fn settle_leave(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            if let Some(handle) = session.finish_leave() {
                self.engine.destroy(handle);
            }
        }
        self.notify_state(id);
    }

    async fn shutdown_all(&mut self) {
        let ids: Vec<String> = self.sessions.keys().cloned().collect();
        for id in &ids {
            let state = match self.sessions.get(id) {
                Some(session) => session.state(),
                None => continue,
            };
            if matches!(state, SessionState::Joined | SessionState::Joining) {
                if let Err(err) = self.do_end(id).await {
                    tracing::warn!("shutdown: ending session '{id}' failed: {err}");
                }
            }
        }
        // Failed and stale-leaving sessions may still hold engine resources
        for id in &ids {
            if let Some(session) = self.sessions.get_mut(id) {
                if let Some(handle) = session.take_handle() {
                    self.engine.destroy(handle);
                }
            }
        }
        self.sessions.clear();
        tracing::info!("session manager shut down");
    }

    fn stale_join_pending(&self, id: &str) -> bool {
        self.sessions
            .get(id)
            .map(|s| s.stale_join_pending())
            .unwrap_or(false)
    }

    fn notify_state(&self, id: &str) {
        if let Some(session) = self.sessions.get(id) {
            self.hub.notify(SessionNotification::StateChanged {
                session_id: id.to_string(),
                state: session.state(),
                error: session.error().cloned(),
            });
        }
    }

    fn arm_join_deadline(&self, id: &str, attempt: u64) {
        let deadline_tx = self.deadline_tx.clone();
        let session_id = id.to_string();
        let timeout = self.config.join_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = deadline_tx.send(JoinDeadline { session_id, attempt });
        });
    }
}
