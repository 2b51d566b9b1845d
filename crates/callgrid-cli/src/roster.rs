use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use callgrid_core::{CameraFacing, ChannelProfile, EngineOptions, SessionConfig};

/// The set of sessions the shell drives, loadable from JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Roster {
    pub sessions: Vec<SessionConfig>,
}

impl Roster {
    /// Front and back camera broadcasting into the same channel, each
    /// on its own engine.
    pub fn dual_camera() -> Self {
        let front = SessionConfig {
            session_id: "front-camera".to_string(),
            app_credential: "demo-app-key".to_string(),
            channel_name: "callgrid-demo".to_string(),
            local_user_id: 1001,
            engine_options: EngineOptions {
                channel_profile: ChannelProfile::LiveBroadcasting,
                camera_facing: CameraFacing::Front,
                ..Default::default()
            },
        };
        let back = SessionConfig {
            session_id: "back-camera".to_string(),
            local_user_id: 1002,
            engine_options: EngineOptions {
                channel_profile: ChannelProfile::LiveBroadcasting,
                camera_facing: CameraFacing::Back,
                ..Default::default()
            },
            ..front.clone()
        };
        Self {
            sessions: vec![front, back],
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading roster {}", path.display()))?;
        let roster: Roster = serde_json::from_str(&contents)
            .with_context(|| format!("parsing roster {}", path.display()))?;
        Ok(roster)
    }
}
