use crate::shared::constants::{FIXED_GOP_SIZE, LEGACY_MPEG_B_FRAMES, MIN_GOP_SIZE};
use crate::shared::pixel_format::PixelFormat;
use crate::shared::rational::Rational;

/// Video codecs a container can name as its default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodecId {
    Mpeg1Video,
    Mpeg2Video,
    Mpeg4,
    H263,
    H264,
    Mjpeg,
    RawVideo,
    /// Any other codec, identified by the library's short name.
    Other(&'static str),
}

impl CodecId {
    /// MPEG-1 and MPEG-2 video, the only codecs configured with B-frames.
    pub fn is_legacy_mpeg(self) -> bool {
        matches!(self, Self::Mpeg1Video | Self::Mpeg2Video)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Mpeg1Video => "mpeg1video",
            Self::Mpeg2Video => "mpeg2video",
            Self::Mpeg4 => "mpeg4",
            Self::H263 => "h263",
            Self::H264 => "h264",
            Self::Mjpeg => "mjpeg",
            Self::RawVideo => "rawvideo",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Keyframe interval for a stream.
///
/// Every stream gets a fixed interval, whatever its frame rate, so a
/// decoder joining mid-stream waits at most this many frames.
pub fn gop_size() -> u32 {
    FIXED_GOP_SIZE.max(MIN_GOP_SIZE)
}

pub fn max_b_frames(codec: CodecId) -> u32 {
    if codec.is_legacy_mpeg() {
        LEGACY_MPEG_B_FRAMES
    } else {
        0
    }
}

/// Negotiated encoder settings for the single video stream.
#[derive(Clone, Debug, PartialEq)]
pub struct CodecParameters {
    pub codec_id: CodecId,
    pub bit_rate: u64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    pub time_base: Rational,
    pub gop_size: u32,
    pub max_b_frames: u32,
}

/// What an encoder lookup reports about the implementation it found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderDescriptor {
    pub name: String,
    pub pixel_format: PixelFormat,
}
