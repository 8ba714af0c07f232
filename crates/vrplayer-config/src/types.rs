use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest gap OpenHMD tolerates between context updates (10 updates/s).
pub const MAX_DEVICE_UPDATE_INTERVAL_MS: u64 = 100;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tracking.max_update_interval_ms must be within 1..=100, got {0}")]
    UpdateInterval(u64),
    #[error("tracking.eye_separation must be finite and non-negative, got {0}")]
    EyeSeparation(f32),
    #[error("view.default_fov_degrees must be within 45..=150, got {0}")]
    DefaultFov(f32),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// How frames are handed to the engine and split between the eyes.
    pub playback: PlaybackConfig,
    /// Initial field of view and manual look step.
    pub view: ViewConfig,
    /// Pose sampling cadence and eye parallax.
    pub tracking: TrackingConfig,
    /// Window placement.
    pub window: WindowConfig,
}

impl AppConfig {
    /// Reject values the render and tracking paths cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.tracking.max_update_interval_ms;
        if interval == 0 || interval > MAX_DEVICE_UPDATE_INTERVAL_MS {
            return Err(ConfigError::UpdateInterval(interval));
        }
        if let Some(sep) = self.tracking.eye_separation {
            if !sep.is_finite() || sep < 0.0 {
                return Err(ConfigError::EyeSeparation(sep));
            }
        }
        let fov = self.view.default_fov_degrees;
        if !(45.0..=150.0).contains(&fov) {
            return Err(ConfigError::DefaultFov(fov));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Layout of the two eye images inside each decoded frame.
    pub packing: StereoPackingMode,
    /// Swap left/right eye content.
    pub invert_stereo: bool,
    /// Value passed to the engine's `hwdec` option.
    pub hwdec: String,
    /// Let the engine remember the playback position on quit.
    pub save_position_on_quit: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            packing: StereoPackingMode::SideBySide,
            invert_stereo: false,
            hwdec: "auto".to_string(),
            save_position_on_quit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// FOV restored by Escape (degrees).
    pub default_fov_degrees: f32,
    /// Degrees of yaw/pitch per W/A/S/D press.
    pub look_step_degrees: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_fov_degrees: 90.0,
            look_step_degrees: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Upper bound on the time between two device updates when nothing
    /// consumes poses (window hidden, minimized).
    pub max_update_interval_ms: u64,
    /// Shift each eye's geometry horizontally by the eye separation.
    pub eye_parallax: bool,
    /// Eye separation override. `None` uses half the device IPD.
    pub eye_separation: Option<f32>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_update_interval_ms: 50,
            eye_parallax: false,
            eye_separation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Move the window onto the output matching the headset panel.
    pub auto_place: bool,
    /// Initial inner size before placement.
    pub initial_size: (u32, u32),
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            auto_place: true,
            initial_size: (960, 540),
        }
    }
}

/// How a single decoded frame is divided between the eyes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StereoPackingMode {
    /// One image shown to both eyes.
    Monoscopic,
    /// Left eye in the upper half, right eye in the lower half.
    OverUnder,
    /// Left eye in the left half, right eye in the right half.
    SideBySide,
}

impl StereoPackingMode {
    /// Next mode in the runtime toggle order.
    pub fn cycle(self) -> Self {
        match self {
            StereoPackingMode::Monoscopic => StereoPackingMode::OverUnder,
            StereoPackingMode::OverUnder => StereoPackingMode::SideBySide,
            StereoPackingMode::SideBySide => StereoPackingMode::Monoscopic,
        }
    }
}

/// Horizontal coverage of the source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionAngle {
    /// Front hemisphere only (VR180).
    #[default]
    Half,
    /// Full sphere.
    Full,
}

impl ProjectionAngle {
    pub fn degrees(self) -> f32 {
        match self {
            ProjectionAngle::Half => 180.0,
            ProjectionAngle::Full => 360.0,
        }
    }
}
