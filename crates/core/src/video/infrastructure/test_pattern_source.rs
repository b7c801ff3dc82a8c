use crate::shared::error::StreamError;
use crate::shared::pixel_format::PixelLayout;
use crate::video::domain::frame_source::FrameSource;

/// Synthetic frames: a diagonal gradient that shifts by one step per frame.
pub struct TestPatternSource {
    layout: PixelLayout,
    width: u32,
    height: u32,
    frames: usize,
    next: usize,
}

impl TestPatternSource {
    pub fn new(layout: PixelLayout, width: u32, height: u32, frames: usize) -> Self {
        Self {
            layout,
            width,
            height,
            frames,
            next: 0,
        }
    }

    fn channels(&self) -> usize {
        match self.layout {
            PixelLayout::Gray => 1,
            PixelLayout::Rgb => 3,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels()
    }

    fn read_frame(&mut self, buf: &mut [u8]) -> Result<bool, StreamError> {
        if buf.len() != self.frame_len() {
            return Err(StreamError::FrameSize {
                expected: self.frame_len(),
                actual: buf.len(),
            });
        }
        if self.next >= self.frames {
            return Ok(false);
        }

        let t = self.next;
        let width = self.width as usize;
        let channels = self.channels();
        for (i, pixel) in buf.chunks_exact_mut(channels).enumerate() {
            let (x, y) = (i % width, i / width);
            let base = x + y + t;
            match self.layout {
                PixelLayout::Gray => pixel[0] = base as u8,
                PixelLayout::Rgb => {
                    pixel[0] = base as u8;
                    pixel[1] = (base + 85) as u8;
                    pixel[2] = (base + 170) as u8;
                }
            }
        }

        self.next += 1;
        Ok(true)
    }

    fn total_frames(&self) -> Option<usize> {
        Some(self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::gray(PixelLayout::Gray, 4 * 2)]
    #[case::rgb(PixelLayout::Rgb, 4 * 2 * 3)]
    fn test_frame_len(#[case] layout: PixelLayout, #[case] expected: usize) {
        assert_eq!(TestPatternSource::new(layout, 4, 2, 1).frame_len(), expected);
    }

    #[test]
    fn test_yields_requested_frame_count() {
        let mut source = TestPatternSource::new(PixelLayout::Gray, 4, 4, 3);
        let mut buf = vec![0u8; source.frame_len()];
        let mut frames = 0;
        while source.read_frame(&mut buf).unwrap() {
            frames += 1;
        }
        assert_eq!(frames, 3);
        assert_eq!(source.total_frames(), Some(3));
    }

    #[test]
    fn test_pattern_moves_between_frames() {
        let mut source = TestPatternSource::new(PixelLayout::Gray, 3, 2, 2);
        let mut first = vec![0u8; source.frame_len()];
        let mut second = vec![0u8; source.frame_len()];
        source.read_frame(&mut first).unwrap();
        source.read_frame(&mut second).unwrap();

        assert_eq!(first, vec![0, 1, 2, 1, 2, 3]);
        assert_eq!(second, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_rgb_channels_are_offset() {
        let mut source = TestPatternSource::new(PixelLayout::Rgb, 1, 1, 1);
        let mut buf = [0u8; 3];
        source.read_frame(&mut buf).unwrap();
        assert_eq!(buf, [0, 85, 170]);
    }

    #[test]
    fn test_zero_frames() {
        let mut source = TestPatternSource::new(PixelLayout::Rgb, 2, 2, 0);
        let mut buf = vec![0u8; source.frame_len()];
        assert!(!source.read_frame(&mut buf).unwrap());
    }
}
