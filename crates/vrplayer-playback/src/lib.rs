pub mod mpv;

use std::path::{Path, PathBuf};
use thiserror::Error;
use vrplayer_config::PlaybackConfig;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Playback library not available: {0}")]
    Library(String),
    #[error("Failed to create playback engine")]
    Create,
    #[error("Failed to set engine option {name}: {message}")]
    SetOption { name: String, message: String },
    #[error("Failed to initialize playback engine: {0}")]
    Initialize(String),
    #[error("Failed to create render context: {0}")]
    RenderContext(String),
    #[error("Engine command {command} failed: {message}")]
    Command { command: String, message: String },
    #[error("Failed to render frame: {0}")]
    Render(String),
    #[error("Argument contains an interior NUL byte: {0:?}")]
    InvalidArgument(String),
}

/// Engine properties the player observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    PlaybackTime,
    Duration,
    Width,
    Height,
}

impl Property {
    pub const ALL: [Property; 4] = [
        Property::PlaybackTime,
        Property::Duration,
        Property::Width,
        Property::Height,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Property::PlaybackTime => "playback-time",
            Property::Duration => "duration",
            Property::Width => "width",
            Property::Height => "height",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PropertyChanged(Property, f64),
    EndOfFile,
    Shutdown,
}

/// Notifications raised from engine threads.
///
/// The callbacks run on threads owned by the engine and must not call
/// back into it; they only wake the UI thread.
pub struct EngineCallbacks {
    /// New events are waiting in [`PlaybackEngine::drain_events`].
    pub on_wakeup: Box<dyn Fn() + Send + Sync>,
    /// A new video frame may be ready to render.
    pub on_frame: Box<dyn Fn() + Send + Sync>,
}

/// CPU-side RGBX frame buffer the engine renders into.
#[derive(Debug, Clone)]
pub struct FrameTarget {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameTarget {
    pub const BYTES_PER_PIXEL: u32 = 4;

    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![0; (width * height * Self::BYTES_PER_PIXEL) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row. Rows are tightly packed.
    pub fn stride(&self) -> u32 {
        self.width * Self::BYTES_PER_PIXEL
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// Options applied to the engine before it is initialized.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub hwdec: String,
    pub save_position_on_quit: bool,
    pub watch_later_dir: Option<PathBuf>,
}

impl EngineOptions {
    pub fn from_config(config: &PlaybackConfig, watch_later_dir: Option<PathBuf>) -> Self {
        Self {
            hwdec: config.hwdec.clone(),
            save_position_on_quit: config.save_position_on_quit,
            watch_later_dir,
        }
    }

    /// `(name, value)` pairs in the order they are set.
    pub fn option_pairs(&self) -> Vec<(&'static str, String)> {
        let yes_no = |b: bool| if b { "yes" } else { "no" }.to_string();

        let mut pairs = vec![
            ("terminal", "yes".to_string()),
            ("input-default-bindings", "yes".to_string()),
            ("osc", "no".to_string()),
            ("osd-bar", "no".to_string()),
            ("save-position-on-quit", yes_no(self.save_position_on_quit)),
            ("keep-open", "yes".to_string()),
            ("keep-open-pause", "no".to_string()),
            ("hwdec", self.hwdec.clone()),
            // Video output goes through the render API.
            ("vo", "libmpv".to_string()),
        ];
        if let Some(dir) = &self.watch_later_dir {
            pairs.push(("watch-later-directory", dir.display().to_string()));
        }
        pairs
    }
}

/// The decoding/playback engine as the player drives it.
///
/// All methods are called from the UI thread.
pub trait PlaybackEngine {
    /// Start playing `path`, replacing whatever was loaded.
    fn load_file(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Whether the engine has a new frame since the last render.
    fn frame_pending(&mut self) -> bool;

    /// Render the current video frame into `target`, scaled to its size.
    fn render_frame(&mut self, target: &mut FrameTarget) -> Result<(), EngineError>;

    /// Forward a key press using the engine's key names.
    fn key_press(&mut self, name: &str) -> Result<(), EngineError>;

    /// Take all queued events without blocking.
    fn drain_events(&mut self) -> Vec<EngineEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_target_is_tightly_packed_rgbx() {
        let target = FrameTarget::new(16, 9);
        assert_eq!(target.stride(), 64);
        assert_eq!(target.pixels().len(), 16 * 9 * 4);
    }

    #[test]
    fn frame_target_never_zero_sized() {
        let target = FrameTarget::new(0, 0);
        assert_eq!((target.width(), target.height()), (1, 1));
        assert_eq!(target.pixels().len(), 4);
    }

    #[test]
    fn default_options_match_player_behaviour() {
        let options = EngineOptions::from_config(
            &PlaybackConfig::default(),
            Some(PathBuf::from("/tmp/mpv/watch_later")),
        );
        let pairs = options.option_pairs();
        let get = |name: &str| {
            pairs
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("terminal"), Some("yes"));
        assert_eq!(get("osc"), Some("no"));
        assert_eq!(get("osd-bar"), Some("no"));
        assert_eq!(get("save-position-on-quit"), Some("yes"));
        assert_eq!(get("keep-open"), Some("yes"));
        assert_eq!(get("keep-open-pause"), Some("no"));
        assert_eq!(get("hwdec"), Some("auto"));
        assert_eq!(get("watch-later-directory"), Some("/tmp/mpv/watch_later"));
    }

    #[test]
    fn watch_later_directory_is_optional() {
        let mut config = PlaybackConfig::default();
        config.save_position_on_quit = false;
        config.hwdec = "no".into();
        let pairs = EngineOptions::from_config(&config, None).option_pairs();

        assert!(pairs.iter().all(|(n, _)| *n != "watch-later-directory"));
        assert!(pairs.contains(&("save-position-on-quit", "no".to_string())));
        assert!(pairs.contains(&("hwdec", "no".to_string())));
    }

    #[test]
    fn property_names() {
        let names: Vec<_> = Property::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["playback-time", "duration", "width", "height"]);
    }
}
