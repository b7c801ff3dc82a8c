use crate::shared::error::StreamError;
use crate::shared::pixel_format::{PixelFormat, PlaneGeometry};

/// One frame of pixel data in a fixed pixel format.
///
/// Planes are packed back to back without row padding, so the byte layout
/// of a GRAY8 or RGB24 picture is exactly what capture code hands over.
#[derive(Debug)]
pub struct Picture {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Picture {
    /// Allocates a zeroed picture, reporting allocation failure instead of
    /// aborting.
    pub fn alloc(format: PixelFormat, width: u32, height: u32) -> Result<Self, StreamError> {
        let len = format.picture_size(width, height).ok_or_else(|| {
            StreamError::Allocation(format!(
                "{width}x{height} {format} picture exceeds addressable memory"
            ))
        })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            StreamError::Allocation(format!(
                "{len} bytes for {width}x{height} {format} picture: {e}"
            ))
        })?;
        data.resize(len, 0);
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn planes(&self) -> Vec<PlaneGeometry> {
        self.format.planes(self.width, self.height)
    }

    /// Byte range of plane `index` inside [`Self::data`].
    pub fn plane_range(&self, index: usize) -> std::ops::Range<usize> {
        let planes = self.planes();
        let start: usize = planes[..index].iter().map(PlaneGeometry::len).sum();
        start..start + planes[index].len()
    }

    pub fn plane(&self, index: usize) -> &[u8] {
        let range = self.plane_range(index);
        &self.data[range]
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut [u8] {
        let range = self.plane_range(index);
        &mut self.data[range]
    }

    /// Overwrites the picture with `src`, which must match its size exactly.
    pub fn fill_from(&mut self, src: &[u8]) -> Result<(), StreamError> {
        if src.len() != self.data.len() {
            return Err(StreamError::FrameSize {
                expected: self.data.len(),
                actual: src.len(),
            });
        }
        self.data.copy_from_slice(src);
        Ok(())
    }
}
