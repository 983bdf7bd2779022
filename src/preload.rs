//! Off-screen image preloading.
//!
//! A frame is only swapped in once its image has been downloaded, so the
//! screen never shows a half-loaded picture. The preload also tells us
//! the orientation of the image.

use async_trait::async_trait;
use image::ImageReader;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PreloadError {
    #[error("download failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("image host returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("unreadable image: {0}")]
    Image(#[from] image::ImageError),

    #[error("unreadable image: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

#[async_trait]
pub trait ImagePreloader: Send + Sync {
    async fn preload(&self, url: &str) -> Result<ImageInfo, PreloadError>;
}

/// Downloads images over HTTP and decodes just enough to know their size
pub struct HttpPreloader {
    client: reqwest::Client,
}

impl HttpPreloader {
    pub fn new(timeout: Duration) -> Result<Self, PreloadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImagePreloader for HttpPreloader {
    async fn preload(&self, url: &str) -> Result<ImageInfo, PreloadError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(PreloadError::Status(response.status()));
        }
        let bytes = response.bytes().await?;
        let info = probe_dimensions(&bytes)?;
        debug!(url = %url, width = info.width, height = info.height, "Image preloaded");
        Ok(info)
    }
}

/// Read the pixel dimensions from an encoded image header
pub fn probe_dimensions(bytes: &[u8]) -> Result<ImageInfo, PreloadError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(ImageInfo { width, height })
}
