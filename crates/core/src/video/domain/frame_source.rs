use crate::shared::error::StreamError;

/// Supplies raw frames in the writer's source pixel format.
pub trait FrameSource {
    /// Bytes per frame.
    fn frame_len(&self) -> usize;

    /// Fills `buf` with the next frame. Returns `false` once exhausted.
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<bool, StreamError>;

    /// Number of frames, when known in advance.
    fn total_frames(&self) -> Option<usize> {
        None
    }
}
