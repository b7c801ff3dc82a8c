use std::path::PathBuf;

use crate::shared::error::StreamError;
use crate::shared::pixel_format::{PixelFormat, PixelLayout};

/// Everything a writer needs to know up front. Fixed for its lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
    pub filename: PathBuf,
    /// Container name to try first; `None` or empty uses the default.
    pub format_hint: Option<String>,
    pub layout: PixelLayout,
    pub width: u32,
    pub height: u32,
    /// Bits per second.
    pub bit_rate: u64,
    /// Whole frames per second.
    pub frame_rate: u32,
}

impl StreamConfig {
    pub fn source_pixel_format(&self) -> PixelFormat {
        self.layout.pixel_format()
    }

    /// Exact byte length of one caller-supplied frame.
    pub fn frame_len(&self) -> Result<usize, StreamError> {
        let format = self.source_pixel_format();
        format.picture_size(self.width, self.height).ok_or_else(|| {
            StreamError::Allocation(format!(
                "{}x{} {format} frame exceeds addressable memory",
                self.width, self.height
            ))
        })
    }
}
