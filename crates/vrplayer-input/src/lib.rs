pub mod keyboard;

pub use keyboard::KeyboardHandler;

/// What a key press asks the player to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    /// Narrow the field of view.
    ZoomIn,
    /// Widen the field of view.
    ZoomOut,
    /// Default FOV, no yaw or pitch offset.
    ResetView,
    /// Change the pitch offset by this many look steps.
    Pitch(f32),
    /// Change the yaw offset by this many look steps.
    Yaw(f32),
    /// Close the player.
    Quit,
    /// Switch to the next stereo packing mode.
    CyclePacking,
    /// Swap the eyes.
    ToggleInvertStereo,
    /// Hand the key to the playback engine under this name.
    Forward(String),
}
