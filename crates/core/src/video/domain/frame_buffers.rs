use crate::shared::error::StreamError;
use crate::shared::picture::Picture;
use crate::shared::pixel_format::PixelFormat;

/// The pictures a writer reuses for every frame.
///
/// `primary` is in the codec's pixel format. `scratch` holds the caller's
/// bytes in the source format and only exists when the two formats differ.
#[derive(Debug)]
pub struct FrameBuffers {
    primary: Picture,
    scratch: Option<Picture>,
}

impl FrameBuffers {
    pub fn allocate(
        codec_format: PixelFormat,
        source_format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, StreamError> {
        let primary = Picture::alloc(codec_format, width, height)?;
        let scratch = if codec_format != source_format {
            Some(Picture::alloc(source_format, width, height)?)
        } else {
            None
        };
        Ok(Self { primary, scratch })
    }

    pub fn primary(&self) -> &Picture {
        &self.primary
    }

    pub fn has_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    /// Byte length callers must supply per frame.
    pub fn source_len(&self) -> usize {
        self.scratch.as_ref().unwrap_or(&self.primary).len()
    }

    /// Both pictures, borrowed together so one can be converted into the
    /// other.
    pub fn split_mut(&mut self) -> (Option<&mut Picture>, &mut Picture) {
        (self.scratch.as_mut(), &mut self.primary)
    }
}

/// Fixed-capacity buffer receiving one encoded frame. Never grows.
#[derive(Debug)]
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, StreamError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|e| {
            StreamError::Allocation(format!("{capacity} byte output buffer: {e}"))
        })?;
        data.resize(capacity, 0);
        Ok(Self { data })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn filled(&self, len: usize) -> &[u8] {
        &self.data[..len]
    }
}
