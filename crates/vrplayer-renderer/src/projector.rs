use crate::viewport::ViewportState;
use glam::{Mat4, Vec4};
use vrplayer_config::StereoPackingMode;
use vrplayer_tracking::types::{Eye, PoseSnapshot};

pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 1000.0;

/// Normalized texture sub-rectangle holding one eye's image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub min_u: f32,
    pub min_v: f32,
    pub max_u: f32,
    pub max_v: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(min_u: f32, min_v: f32, max_u: f32, max_v: f32) -> Self {
        Self {
            min_u,
            min_v,
            max_u,
            max_v,
        }
    }

    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.min_u, self.min_v, self.max_u, self.max_v)
    }

    /// Select the region of a packed frame that belongs to the eye with
    /// the given index (0 = left).
    pub fn for_packing(packing: StereoPackingMode, eye_index: usize) -> Self {
        match (packing, eye_index) {
            (StereoPackingMode::Monoscopic, _) => UvRect::FULL,
            (StereoPackingMode::OverUnder, 0) => UvRect::new(0.0, 0.0, 1.0, 0.5),
            (StereoPackingMode::OverUnder, _) => UvRect::new(0.0, 0.5, 1.0, 1.0),
            (StereoPackingMode::SideBySide, 0) => UvRect::new(0.0, 0.0, 0.5, 1.0),
            (StereoPackingMode::SideBySide, _) => UvRect::new(0.5, 0.0, 1.0, 1.0),
        }
    }
}

/// Everything the sphere shader needs to draw one eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeParams {
    pub view_projection: Mat4,
    pub uv_rect: UvRect,
    /// Horizontal geometry shift for parallax; negative for the left eye.
    pub eye_offset: f32,
    /// 360 divided by the horizontal coverage of the video.
    pub angle_factor: f32,
}

/// Per-frame projection of a pose into per-eye draw parameters.
///
/// Pure: the same inputs always give bit-identical output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoProjector {
    output_width: u32,
    output_height: u32,
    eye_separation: f32,
}

impl StereoProjector {
    /// `output_width` spans both eyes; each eye gets half of it.
    pub fn new(output_width: u32, output_height: u32, eye_separation: f32) -> Self {
        Self {
            output_width,
            output_height,
            eye_separation,
        }
    }

    /// Aspect ratio of one eye's viewport.
    pub fn eye_aspect(&self) -> f32 {
        (self.output_width as f32 / 2.0) / self.output_height.max(1) as f32
    }

    pub fn compute_eye(
        &self,
        eye: Eye,
        snapshot: &PoseSnapshot,
        viewport: &ViewportState,
        packing: StereoPackingMode,
    ) -> EyeParams {
        let projection = Mat4::perspective_rh(
            viewport.field_of_view_degrees.to_radians(),
            self.eye_aspect(),
            Z_NEAR,
            Z_FAR,
        );
        let look = Mat4::from_rotation_y(viewport.yaw_offset_degrees.to_radians())
            * Mat4::from_rotation_x(viewport.pitch_offset_degrees.to_radians());
        let view_projection = projection * look * snapshot.view(eye);

        let source_eye = if viewport.invert_stereo {
            eye.opposite()
        } else {
            eye
        };

        let eye_offset = match eye {
            Eye::Left => -self.eye_separation,
            Eye::Right => self.eye_separation,
        };

        EyeParams {
            view_projection,
            uv_rect: UvRect::for_packing(packing, source_eye.index()),
            eye_offset,
            angle_factor: 360.0 / viewport.projection_angle.degrees(),
        }
    }
}
