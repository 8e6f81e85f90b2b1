use crate::frame::Frame;

/// Anything that can hand out the latest frame on demand.
pub trait FrameSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn grab(&mut self) -> Result<Frame, Self::Error>;

    /// Short human-readable description for logs and the shell banner.
    fn describe(&self) -> String;
}
