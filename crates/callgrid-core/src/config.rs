use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Immutable description of one stream session, fixed at registration.
///
/// A `local_user_id` of 0 asks the engine to assign one; the actual uid
/// arrives with the join confirmation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub session_id: String,
    pub app_credential: String,
    pub channel_name: String,
    #[serde(default)]
    pub local_user_id: u32,
    #[serde(default)]
    pub engine_options: EngineOptions,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EngineOptions {
    #[serde(default = "default_true")]
    pub video_enabled: bool,
    #[serde(default = "default_true")]
    pub audio_enabled: bool,
    #[serde(default)]
    pub channel_profile: ChannelProfile,
    #[serde(default)]
    pub client_role: ClientRole,
    #[serde(default)]
    pub camera_facing: CameraFacing,
    #[serde(default)]
    pub video_encoder: VideoEncoderConfig,
}

fn default_true() -> bool {
    true
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            video_enabled: true,
            audio_enabled: true,
            channel_profile: ChannelProfile::default(),
            client_role: ClientRole::default(),
            camera_facing: CameraFacing::default(),
            video_encoder: VideoEncoderConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelProfile {
    #[default]
    Communication,
    LiveBroadcasting,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    #[default]
    Broadcaster,
    Audience,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    #[default]
    Front,
    Back,
}

/// Encoder parameters handed to the engine at creation.
///
/// A bitrate of 0 leaves the choice to the engine.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoEncoderConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default)]
    pub bitrate_kbps: u32,
    #[serde(default)]
    pub orientation_mode: OrientationMode,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_frame_rate() -> u32 {
    30
}

impl Default for VideoEncoderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
            bitrate_kbps: 0,
            orientation_mode: OrientationMode::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrientationMode {
    #[default]
    Adaptive,
    FixedLandscape,
    FixedPortrait,
}

/// Manager-wide tuning, independent of any single session.
#[derive(Clone, Debug)]
pub struct CallConfig {
    /// A join with no confirmation within this window is failed as a
    /// timeout so a session cannot stay in Joining forever.
    pub join_timeout: Duration,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(15),
        }
    }
}
