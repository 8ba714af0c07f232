use glam::Mat4;

/// One of the two eyes of the headset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }

    /// The other eye.
    pub fn opposite(self) -> Eye {
        match self {
            Eye::Left => Eye::Right,
            Eye::Right => Eye::Left,
        }
    }
}

/// Per-eye matrices as reported by the device driver, before any
/// convention change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeMatrices {
    pub left_view: Mat4,
    pub right_view: Mat4,
    pub left_projection: Mat4,
    pub right_projection: Mat4,
}

/// A consistent set of view/projection matrices from a single device
/// update. Views are eye-to-world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    pub left_view: Mat4,
    pub right_view: Mat4,
    pub left_projection: Mat4,
    pub right_projection: Mat4,
    /// Stamped by the store on publish; 0 until the first publish.
    pub generation: u64,
}

impl PoseSnapshot {
    pub const IDENTITY: PoseSnapshot = PoseSnapshot {
        left_view: Mat4::IDENTITY,
        right_view: Mat4::IDENTITY,
        left_projection: Mat4::IDENTITY,
        right_projection: Mat4::IDENTITY,
        generation: 0,
    };

    /// Convert raw driver matrices (world-to-eye views) into a snapshot.
    pub fn from_device(raw: &EyeMatrices) -> Self {
        Self {
            left_view: raw.left_view.inverse(),
            right_view: raw.right_view.inverse(),
            left_projection: raw.left_projection,
            right_projection: raw.right_projection,
            generation: 0,
        }
    }

    pub fn view(&self, eye: Eye) -> Mat4 {
        match eye {
            Eye::Left => self.left_view,
            Eye::Right => self.right_view,
        }
    }

    pub fn projection(&self, eye: Eye) -> Mat4 {
        match eye {
            Eye::Left => self.left_projection,
            Eye::Right => self.right_projection,
        }
    }
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Native panel resolution of the headset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceGeometry {
    pub horizontal_pixels: u32,
    pub vertical_pixels: u32,
}

/// Optical constants read once when the device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceCalibration {
    /// Inter-pupillary distance (meters).
    pub ipd: f32,
    /// Physical screen width and height (meters).
    pub screen_size: [f32; 2],
    pub lens_separation: f32,
    pub lens_vertical_position: f32,
    pub distortion_k: [f32; 4],
    pub aberration_k: [f32; 3],
}

/// Everything known about an opened device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub vendor: String,
    pub product: String,
    pub geometry: DeviceGeometry,
    pub calibration: DeviceCalibration,
}
