pub mod placement;

pub use placement::{DisplayPlacement, OutputWatcher, PlacementDecision};

use winit::monitor::MonitorHandle;
use winit::window::Window;

/// An output the window can be placed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Platform name, if the backend reports one.
    pub name: Option<String>,
    /// Top-left corner in the desktop's physical coordinate space.
    pub position: (i32, i32),
    /// Resolution in physical pixels.
    pub width: u32,
    pub height: u32,
}

impl DisplayInfo {
    pub fn from_monitor(monitor: &MonitorHandle) -> Self {
        let position = monitor.position();
        let size = monitor.size();
        Self {
            name: monitor.name(),
            position: (position.x, position.y),
            width: size.width,
            height: size.height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// All outputs currently known to the windowing system.
pub fn list_outputs(window: &Window) -> Vec<DisplayInfo> {
    window
        .available_monitors()
        .map(|m| DisplayInfo::from_monitor(&m))
        .collect()
}

/// The output the window is on, if the platform can tell.
pub fn current_output(window: &Window) -> Option<DisplayInfo> {
    window.current_monitor().map(|m| DisplayInfo::from_monitor(&m))
}
