//! facedb-hw: Frame sources: V4L2 webcam capture and still images.

pub mod camera;
pub mod frame;
pub mod source;
pub mod still;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::Frame;
pub use source::FrameSource;
pub use still::{StillImage, StillImageError};
