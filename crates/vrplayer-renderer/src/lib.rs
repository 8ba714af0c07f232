pub mod context;
pub mod mesh;
pub mod pipeline;
pub mod projector;
pub mod target;
pub mod viewport;

pub use context::{FrameInputs, FrameOutcome, GraphicsContext, RenderPhase};
pub use projector::{EyeParams, StereoProjector, UvRect};
pub use viewport::ViewportState;
