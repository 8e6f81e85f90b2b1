//! Still-image frame source for running without a camera.

use crate::frame::Frame;
use crate::source::FrameSource;
use image::RgbImage;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("cannot read image {path}: {source}")]
pub struct StillImageError {
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

/// Serves the same decoded image on every grab.
pub struct StillImage {
    path: PathBuf,
    image: RgbImage,
    grabs: u32,
}

impl StillImage {
    /// Decode the image at `path` (any format the `image` crate reads) into RGB.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StillImageError> {
        let path = path.as_ref().to_path_buf();
        let image = image::open(&path)
            .map_err(|source| StillImageError {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "loaded still image");
        Ok(Self {
            path,
            image,
            grabs: 0,
        })
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            image,
            grabs: 0,
        }
    }
}

impl FrameSource for StillImage {
    type Error = Infallible;

    fn grab(&mut self) -> Result<Frame, Infallible> {
        let frame = Frame::new(self.image.clone(), self.grabs);
        self.grabs = self.grabs.wrapping_add(1);
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!(
            "image {} ({}x{})",
            self.path.display(),
            self.image.width(),
            self.image.height()
        )
    }
}
