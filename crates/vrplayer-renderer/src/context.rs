use crate::mesh::CUBE_VERTICES;
use crate::pipeline::{SpherePipeline, Uniforms};
use crate::projector::StereoProjector;
use crate::target::{frame_target_size, VideoTexture};
use crate::viewport::ViewportState;
use tracing::{debug, info, warn};
use vrplayer_config::StereoPackingMode;
use vrplayer_playback::{EngineError, FrameTarget, PlaybackEngine};
use vrplayer_tracking::types::Eye;
use vrplayer_tracking::HeadTracker;
use wgpu::util::DeviceExt;

/// Lifecycle of the graphics resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// No GPU resources yet; frames are skipped.
    Uninitialized,
    /// Resources exist and no frame is in progress.
    Ready,
    /// A frame is being recorded. Only seen from inside
    /// [`GraphicsContext::render_frame`]; a frame requested in this phase is
    /// skipped rather than nested.
    Rendering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn,
    Skipped,
}

/// Per-frame inputs owned by the application.
pub struct FrameInputs<'a> {
    pub tracker: &'a HeadTracker,
    pub viewport: &'a ViewportState,
    pub packing: StereoPackingMode,
    pub eye_separation: f32,
}

/// Uniform buffer of one eye, rewritten every frame.
struct EyeUniforms {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl EyeUniforms {
    fn new(device: &wgpu::Device, pipeline: &SpherePipeline, eye: Eye) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(match eye {
                Eye::Left => "left_eye_uniform_buffer",
                Eye::Right => "right_eye_uniform_buffer",
            }),
            size: std::mem::size_of::<Uniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = pipeline.create_uniform_bind_group(device, &buffer);
        Self { buffer, bind_group }
    }
}

struct GpuResources {
    pipeline: SpherePipeline,
    // Indexed by `Eye::index`. One buffer per eye: both writes land before
    // the pass that reads them is submitted.
    eye_uniforms: [EyeUniforms; 2],
    vertex_buffer: wgpu::Buffer,
    video: VideoTexture,
    max_texture_dimension: u32,
}

/// Owns every GPU resource of the player and draws one stereo frame at
/// a time: engine frame into the video texture, then the cube once per
/// eye into that eye's half of the output.
pub struct GraphicsContext {
    phase: RenderPhase,
    gpu: Option<GpuResources>,
    frame: Option<FrameTarget>,
    surface_size: (u32, u32),
    // The CPU frame was reallocated and holds no picture yet.
    frame_stale: bool,
    frame_count: u64,
}

impl GraphicsContext {
    pub fn new() -> Self {
        Self {
            phase: RenderPhase::Uninitialized,
            gpu: None,
            frame: None,
            surface_size: (0, 0),
            frame_stale: false,
            frame_count: 0,
        }
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Create the pipeline, cube geometry and video target. Only the
    /// first call has an effect.
    pub fn attach(
        &mut self,
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) {
        if self.phase != RenderPhase::Uninitialized {
            debug!("Graphics context already attached");
            return;
        }

        let pipeline = SpherePipeline::new(device, color_format);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube_vertex_buffer"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let max_texture_dimension = device.limits().max_texture_dimension_2d;
        let (video_width, video_height) = frame_target_size(width, height, max_texture_dimension);
        let video = VideoTexture::new(device, &pipeline, video_width, video_height);

        let eye_uniforms = Eye::BOTH.map(|eye| EyeUniforms::new(device, &pipeline, eye));

        self.gpu = Some(GpuResources {
            eye_uniforms,
            pipeline,
            vertex_buffer,
            video,
            max_texture_dimension,
        });
        self.frame = Some(FrameTarget::new(video_width, video_height));
        self.frame_stale = true;
        self.surface_size = (width, height);
        self.phase = RenderPhase::Ready;

        info!(
            width,
            height,
            video_width,
            video_height,
            ?color_format,
            "Graphics context attached"
        );
    }

    /// Follow a surface resize: the video target is recreated at the new
    /// surface size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.surface_size = (width, height);
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let (video_width, video_height) =
            frame_target_size(width, height, gpu.max_texture_dimension);
        if (video_width, video_height) == (gpu.video.width, gpu.video.height) {
            return;
        }

        gpu.video = VideoTexture::new(device, &gpu.pipeline, video_width, video_height);
        self.frame = Some(FrameTarget::new(video_width, video_height));
        self.frame_stale = true;
        debug!(video_width, video_height, "Video target resized");
    }

    /// Ask the engine for a new picture if it has one, or if the target
    /// was just reallocated. Returns whether the CPU frame changed.
    fn refresh_video(&mut self, engine: &mut dyn PlaybackEngine) -> Result<bool, EngineError> {
        let Some(frame) = self.frame.as_mut() else {
            return Ok(false);
        };
        if !engine.frame_pending() && !self.frame_stale {
            return Ok(false);
        }
        engine.render_frame(frame)?;
        self.frame_stale = false;
        Ok(true)
    }

    /// Enter [`RenderPhase::Rendering`] if a frame can be drawn now.
    fn begin_frame(&mut self) -> bool {
        if self.phase != RenderPhase::Ready {
            debug!(phase = ?self.phase, "Skipping frame");
            return false;
        }
        let (width, height) = self.surface_size;
        if width == 0 || height == 0 {
            return false;
        }
        self.phase = RenderPhase::Rendering;
        true
    }

    fn end_frame(&mut self) {
        self.phase = RenderPhase::Ready;
        self.frame_count += 1;
    }

    /// Draw one stereo frame into `output`.
    pub fn render_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output: &wgpu::TextureView,
        engine: &mut dyn PlaybackEngine,
        inputs: &FrameInputs<'_>,
    ) -> FrameOutcome {
        if !self.begin_frame() {
            return FrameOutcome::Skipped;
        }
        let (width, height) = self.surface_size;

        match self.refresh_video(engine) {
            Ok(true) => {
                if let (Some(gpu), Some(frame)) = (&self.gpu, &self.frame) {
                    gpu.video.upload(queue, frame);
                }
            }
            Ok(false) => {}
            // Keep showing the previous picture.
            Err(e) => warn!(?e, "Engine failed to render frame"),
        }

        let Some(gpu) = self.gpu.as_ref() else {
            self.phase = RenderPhase::Uninitialized;
            return FrameOutcome::Skipped;
        };

        let pose = inputs.tracker.pose();
        let projector = StereoProjector::new(width, height, inputs.eye_separation);
        let half_width = width / 2;

        for eye in Eye::BOTH {
            let params = projector.compute_eye(eye, &pose, inputs.viewport, inputs.packing);
            queue.write_buffer(
                &gpu.eye_uniforms[eye.index()].buffer,
                0,
                bytemuck::cast_slice(&[Uniforms::new(&params)]),
            );
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("stereo_render"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("stereo_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&gpu.pipeline.pipeline);
            pass.set_bind_group(1, &gpu.video.bind_group, &[]);
            pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));

            for eye in Eye::BOTH {
                pass.set_viewport(
                    (eye.index() as u32 * half_width) as f32,
                    0.0,
                    half_width.max(1) as f32,
                    height as f32,
                    0.0,
                    1.0,
                );
                pass.set_bind_group(0, &gpu.eye_uniforms[eye.index()].bind_group, &[]);
                pass.draw(0..CUBE_VERTICES.len() as u32, 0..1);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));

        self.end_frame();
        if self.frame_count % 300 == 0 {
            debug!(frames = self.frame_count, generation = pose.generation, "Render heartbeat");
        }
        FrameOutcome::Drawn
    }
}

impl Default for GraphicsContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use vrplayer_playback::EngineEvent;

    #[derive(Default)]
    struct CountingEngine {
        pending: bool,
        renders: u32,
    }

    impl PlaybackEngine for CountingEngine {
        fn load_file(&mut self, _path: &Path) -> Result<(), EngineError> {
            Ok(())
        }

        fn frame_pending(&mut self) -> bool {
            self.pending
        }

        fn render_frame(&mut self, target: &mut FrameTarget) -> Result<(), EngineError> {
            self.renders += 1;
            self.pending = false;
            target.pixels_mut().fill(0xff);
            Ok(())
        }

        fn key_press(&mut self, _name: &str) -> Result<(), EngineError> {
            Ok(())
        }

        fn drain_events(&mut self) -> Vec<EngineEvent> {
            Vec::new()
        }
    }

    #[test]
    fn starts_uninitialized() {
        let context = GraphicsContext::new();
        assert_eq!(context.phase(), RenderPhase::Uninitialized);
        assert_eq!(context.frame_count(), 0);
    }

    #[test]
    fn frame_in_progress_blocks_nested_frame() {
        let mut context = GraphicsContext::new();
        assert!(!context.begin_frame());

        context.phase = RenderPhase::Ready;
        context.surface_size = (1920, 1080);
        assert!(context.begin_frame());
        assert_eq!(context.phase(), RenderPhase::Rendering);
        assert!(!context.begin_frame());

        context.end_frame();
        assert_eq!(context.phase(), RenderPhase::Ready);
        assert_eq!(context.frame_count(), 1);
        assert!(context.begin_frame());
    }

    #[test]
    fn zero_sized_surface_skips_frame() {
        let mut context = GraphicsContext::new();
        context.phase = RenderPhase::Ready;
        context.surface_size = (0, 1080);
        assert!(!context.begin_frame());
        assert_eq!(context.phase(), RenderPhase::Ready);
    }

    #[test]
    fn eye_uniforms_fit_a_fixed_uniform_buffer() {
        // Written in place each frame, so the layout must stay fixed and
        // 16-byte aligned.
        assert_eq!(std::mem::size_of::<Uniforms>(), 96);
        assert_eq!(std::mem::size_of::<Uniforms>() % 16, 0);
    }

    #[test]
    fn video_refresh_before_attach_does_nothing() {
        let mut context = GraphicsContext::new();
        let mut engine = CountingEngine {
            pending: true,
            ..Default::default()
        };

        assert!(!context.refresh_video(&mut engine).unwrap());
        assert_eq!(engine.renders, 0);
        assert_eq!(context.phase(), RenderPhase::Uninitialized);
    }

    #[test]
    fn stale_frame_is_rendered_once_then_only_when_pending() {
        let mut context = GraphicsContext::new();
        context.frame = Some(FrameTarget::new(4, 2));
        context.frame_stale = true;
        let mut engine = CountingEngine::default();

        // Freshly allocated target is filled even without a new frame.
        assert!(context.refresh_video(&mut engine).unwrap());
        assert_eq!(engine.renders, 1);

        assert!(!context.refresh_video(&mut engine).unwrap());
        assert_eq!(engine.renders, 1);

        engine.pending = true;
        assert!(context.refresh_video(&mut engine).unwrap());
        assert_eq!(engine.renders, 2);
        assert!(context
            .frame
            .as_ref()
            .unwrap()
            .pixels()
            .iter()
            .all(|&b| b == 0xff));
    }
}
