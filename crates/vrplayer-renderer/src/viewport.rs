use vrplayer_config::{ProjectionAngle, ViewConfig};

pub const MIN_FOV_DEGREES: f32 = 45.0;
pub const MAX_FOV_DEGREES: f32 = 150.0;
pub const FOV_STEP_DEGREES: f32 = 10.0;
pub const DEFAULT_FOV_DEGREES: f32 = 90.0;

/// User-controlled view parameters. Owned by the render thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub field_of_view_degrees: f32,
    pub yaw_offset_degrees: f32,
    pub pitch_offset_degrees: f32,
    pub invert_stereo: bool,
    pub projection_angle: ProjectionAngle,
    /// FOV restored by [`ViewportState::reset`].
    pub default_fov_degrees: f32,
    /// Degrees per manual look step.
    pub look_step_degrees: f32,
}

impl ViewportState {
    pub fn new(projection_angle: ProjectionAngle, invert_stereo: bool) -> Self {
        Self {
            field_of_view_degrees: DEFAULT_FOV_DEGREES,
            yaw_offset_degrees: 0.0,
            pitch_offset_degrees: 0.0,
            invert_stereo,
            projection_angle,
            default_fov_degrees: DEFAULT_FOV_DEGREES,
            look_step_degrees: 1.0,
        }
    }

    pub fn from_config(
        view: &ViewConfig,
        projection_angle: ProjectionAngle,
        invert_stereo: bool,
    ) -> Self {
        let default_fov = view.default_fov_degrees.clamp(MIN_FOV_DEGREES, MAX_FOV_DEGREES);
        Self {
            field_of_view_degrees: default_fov,
            default_fov_degrees: default_fov,
            look_step_degrees: view.look_step_degrees,
            ..Self::new(projection_angle, invert_stereo)
        }
    }

    /// Narrow the field of view by one step.
    pub fn zoom_in(&mut self) {
        self.field_of_view_degrees =
            (self.field_of_view_degrees - FOV_STEP_DEGREES).max(MIN_FOV_DEGREES);
    }

    /// Widen the field of view by one step.
    pub fn zoom_out(&mut self) {
        self.field_of_view_degrees =
            (self.field_of_view_degrees + FOV_STEP_DEGREES).min(MAX_FOV_DEGREES);
    }

    pub fn pitch(&mut self, steps: f32) {
        self.pitch_offset_degrees += steps * self.look_step_degrees;
    }

    pub fn yaw(&mut self, steps: f32) {
        self.yaw_offset_degrees += steps * self.look_step_degrees;
    }

    pub fn toggle_invert_stereo(&mut self) {
        self.invert_stereo = !self.invert_stereo;
    }

    /// Back to the default FOV with no manual look offset.
    pub fn reset(&mut self) {
        self.field_of_view_degrees = self.default_fov_degrees;
        self.yaw_offset_degrees = 0.0;
        self.pitch_offset_degrees = 0.0;
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(ProjectionAngle::default(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_in_stabilises_at_minimum() {
        let mut viewport = ViewportState::default();
        for _ in 0..10 {
            viewport.zoom_in();
        }
        assert_eq!(viewport.field_of_view_degrees, MIN_FOV_DEGREES);
        viewport.zoom_in();
        assert_eq!(viewport.field_of_view_degrees, MIN_FOV_DEGREES);
    }

    #[test]
    fn zoom_out_stabilises_at_maximum() {
        let mut viewport = ViewportState::default();
        for _ in 0..10 {
            viewport.zoom_out();
        }
        assert_eq!(viewport.field_of_view_degrees, MAX_FOV_DEGREES);
        viewport.zoom_out();
        assert_eq!(viewport.field_of_view_degrees, MAX_FOV_DEGREES);
    }

    #[test]
    fn zoom_steps_by_ten_degrees() {
        let mut viewport = ViewportState::default();
        viewport.zoom_in();
        assert_eq!(viewport.field_of_view_degrees, 80.0);
        viewport.zoom_out();
        viewport.zoom_out();
        assert_eq!(viewport.field_of_view_degrees, 100.0);
    }

    #[test]
    fn reset_restores_fov_and_clears_offsets() {
        let mut viewport = ViewportState::default();
        viewport.zoom_out();
        viewport.yaw(-3.0);
        viewport.pitch(7.0);
        viewport.toggle_invert_stereo();

        viewport.reset();
        assert_eq!(viewport.field_of_view_degrees, 90.0);
        assert_eq!(viewport.yaw_offset_degrees, 0.0);
        assert_eq!(viewport.pitch_offset_degrees, 0.0);
        // Stereo inversion is not a view offset.
        assert!(viewport.invert_stereo);
    }

    #[test]
    fn look_steps_use_configured_size() {
        let view = ViewConfig {
            default_fov_degrees: 100.0,
            look_step_degrees: 2.5,
        };
        let mut viewport = ViewportState::from_config(&view, ProjectionAngle::Full, false);
        assert_eq!(viewport.field_of_view_degrees, 100.0);

        viewport.yaw(1.0);
        viewport.pitch(-2.0);
        assert_eq!(viewport.yaw_offset_degrees, 2.5);
        assert_eq!(viewport.pitch_offset_degrees, -5.0);

        viewport.zoom_in();
        viewport.reset();
        assert_eq!(viewport.field_of_view_degrees, 100.0);
    }
}
