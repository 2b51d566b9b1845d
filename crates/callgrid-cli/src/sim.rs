//! Simulated engine: confirms joins after a short random delay, then
//! drifts a few remote viewers in and out of the channel.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc;
use uuid::Uuid;

use callgrid_core::{
    CallEvent, ChannelOptions, EngineAdapter, EngineConfig, EngineHandle, EngineInitError,
    UserLeftReason,
};

struct Instance {
    session_id: String,
    events: mpsc::UnboundedSender<CallEvent>,
}

pub struct SimulatedEngine {
    instances: Mutex<HashMap<Uuid, Instance>>,
    next_auto_uid: AtomicU32,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            next_auto_uid: AtomicU32::new(9000),
        }
    }

    fn instance(&self, handle: &EngineHandle) -> Option<(String, mpsc::UnboundedSender<CallEvent>)> {
        let instances = self.instances.lock().unwrap();
        instances
            .get(&handle.id())
            .map(|i| (i.session_id.clone(), i.events.clone()))
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineAdapter for SimulatedEngine {
    fn create_engine(
        &self,
        config: &EngineConfig,
        events: mpsc::UnboundedSender<CallEvent>,
    ) -> Result<EngineHandle, EngineInitError> {
        if config.app_credential.is_empty() {
            return Err(EngineInitError("empty app credential".to_string()));
        }
        let handle = EngineHandle::new();
        let encoder = &config.options.video_encoder;
        tracing::debug!(
            "sim engine for '{}': {}x{} @ {} fps, facing {:?}",
            config.session_id,
            encoder.width,
            encoder.height,
            encoder.frame_rate,
            config.options.camera_facing,
        );
        self.instances.lock().unwrap().insert(
            handle.id(),
            Instance {
                session_id: config.session_id.clone(),
                events,
            },
        );
        Ok(handle)
    }

    fn start_preview(&self, handle: &EngineHandle) {
        if let Some((session_id, _)) = self.instance(handle) {
            tracing::debug!("sim preview started for '{session_id}'");
        }
    }

    fn stop_preview(&self, handle: &EngineHandle) {
        if let Some((session_id, _)) = self.instance(handle) {
            tracing::debug!("sim preview stopped for '{session_id}'");
        }
    }

    async fn join(&self, handle: &EngineHandle, channel: &str, uid: u32, options: ChannelOptions) {
        let Some((session_id, events)) = self.instance(handle) else {
            return;
        };
        let uid = if uid == 0 {
            self.next_auto_uid.fetch_add(1, Ordering::SeqCst)
        } else {
            uid
        };
        tracing::debug!(
            "sim join request: '{session_id}' -> '{channel}' as uid {uid} ({:?}/{:?})",
            options.channel_profile,
            options.client_role,
        );

        let channel = channel.to_string();
        let join_delay = Duration::from_millis(rand::thread_rng().gen_range(80..300));
        tokio::spawn(async move {
            tokio::time::sleep(join_delay).await;
            if events
                .send(CallEvent::JoinSucceeded {
                    session_id: session_id.clone(),
                    uid,
                    channel,
                })
                .is_err()
            {
                return;
            }
            // a couple of viewers drift in, one drifts out again
            for (offset_ms, viewer) in [(400u64, 7001u32), (900, 7002)] {
                tokio::time::sleep(Duration::from_millis(offset_ms)).await;
                if events
                    .send(CallEvent::UserJoined {
                        session_id: session_id.clone(),
                        uid: viewer,
                    })
                    .is_err()
                {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(1200)).await;
            let _ = events.send(CallEvent::UserLeft {
                session_id,
                uid: 7001,
                reason: UserLeftReason::Quit,
            });
        });
    }

    async fn leave(&self, handle: &EngineHandle) {
        if let Some((session_id, _)) = self.instance(handle) {
            // leave confirmation is implicit at this boundary
            tracing::debug!("sim leave request for '{session_id}'");
        }
    }

    fn destroy(&self, handle: EngineHandle) {
        if let Some(instance) = self.instances.lock().unwrap().remove(&handle.id()) {
            tracing::debug!("sim engine destroyed for '{}'", instance.session_id);
        }
    }
}
