pub mod frames;
pub mod sampler;

pub use frames::{Frame, FrameStore, frame_path};
pub use sampler::{CaptureHandle, CaptureLoop};
