use ffmpeg_next::codec::Id;
use ffmpeg_next::format::Pixel;

use crate::shared::codec::CodecId;
use crate::shared::pixel_format::PixelFormat;
use crate::shared::rational::Rational;

pub fn to_pixel(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Gray8 => Pixel::GRAY8,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuvj420p => Pixel::YUVJ420P,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
    }
}

/// `None` for pixel formats the frame buffers cannot represent.
pub fn from_pixel(pixel: Pixel) -> Option<PixelFormat> {
    match pixel {
        Pixel::GRAY8 => Some(PixelFormat::Gray8),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::YUVJ420P => Some(PixelFormat::Yuvj420p),
        Pixel::YUV422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P => Some(PixelFormat::Yuv444p),
        _ => None,
    }
}

pub fn to_codec_id(codec: CodecId) -> Id {
    match codec {
        CodecId::Mpeg1Video => Id::MPEG1VIDEO,
        CodecId::Mpeg2Video => Id::MPEG2VIDEO,
        CodecId::Mpeg4 => Id::MPEG4,
        CodecId::H263 => Id::H263,
        CodecId::H264 => Id::H264,
        CodecId::Mjpeg => Id::MJPEG,
        CodecId::RawVideo => Id::RAWVIDEO,
        CodecId::Other(name) => ffmpeg_next::encoder::find_by_name(name)
            .map(|c| c.id())
            .unwrap_or(Id::None),
    }
}

/// `None` for `AV_CODEC_ID_NONE`, i.e. a container without video.
pub fn from_codec_id(id: Id) -> Option<CodecId> {
    let codec = match id {
        Id::None => return None,
        Id::MPEG1VIDEO => CodecId::Mpeg1Video,
        Id::MPEG2VIDEO => CodecId::Mpeg2Video,
        Id::MPEG4 => CodecId::Mpeg4,
        Id::H263 => CodecId::H263,
        Id::H264 => CodecId::H264,
        Id::MJPEG => CodecId::Mjpeg,
        Id::RAWVIDEO => CodecId::RawVideo,
        other => CodecId::Other(other.name()),
    };
    Some(codec)
}

pub fn to_rational(value: Rational) -> ffmpeg_next::Rational {
    ffmpeg_next::Rational(value.num, value.den)
}
