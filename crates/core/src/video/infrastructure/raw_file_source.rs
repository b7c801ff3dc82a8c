use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::shared::error::StreamError;
use crate::video::domain::frame_source::FrameSource;

/// Reads back-to-back raw frames of a fixed size from a file or any reader.
pub struct RawFileSource<R> {
    reader: R,
    frame_len: usize,
    total_frames: Option<usize>,
}

impl RawFileSource<BufReader<File>> {
    pub fn open(path: &Path, frame_len: usize) -> Result<Self, StreamError> {
        let file = File::open(path)
            .map_err(|e| StreamError::io(format!("could not open '{}'", path.display()), e))?;
        let total_frames = file
            .metadata()
            .ok()
            .filter(|_| frame_len > 0)
            .map(|m| (m.len() / frame_len as u64) as usize);
        let mut source = Self::from_reader(BufReader::new(file), frame_len);
        source.total_frames = total_frames;
        Ok(source)
    }
}

impl<R: Read> RawFileSource<R> {
    pub fn from_reader(reader: R, frame_len: usize) -> Self {
        Self {
            reader,
            frame_len,
            total_frames: None,
        }
    }
}

impl<R: Read> FrameSource for RawFileSource<R> {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn read_frame(&mut self, buf: &mut [u8]) -> Result<bool, StreamError> {
        if buf.len() != self.frame_len {
            return Err(StreamError::FrameSize {
                expected: self.frame_len,
                actual: buf.len(),
            });
        }

        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(StreamError::io("could not read input frame", e)),
            }
        }

        match filled {
            0 => Ok(false),
            n if n == buf.len() => Ok(true),
            n => Err(StreamError::FrameSize {
                expected: self.frame_len,
                actual: n,
            }),
        }
    }

    fn total_frames(&self) -> Option<usize> {
        self.total_frames
    }
}
