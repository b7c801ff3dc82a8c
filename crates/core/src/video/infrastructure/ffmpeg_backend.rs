use std::ffi::{CStr, CString};
use std::io;
use std::os::raw::c_int;
use std::path::Path;
use std::ptr;

use ffmpeg_next::codec::packet::Flags as PacketFlags;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use ffmpeg_next::{ffi, format, Packet};

use crate::shared::codec::{CodecId, CodecParameters, EncoderDescriptor};
use crate::shared::container::{ContainerFormat, OutputContext};
use crate::shared::error::StreamError;
use crate::shared::init_guard::InitGuard;
use crate::shared::picture::Picture;
use crate::shared::pixel_format::PixelFormat;
use crate::shared::rational::Rational;
use crate::video::domain::media_backend::MediaBackend;

use super::ffmpeg_mapping::{from_codec_id, from_pixel, to_codec_id, to_pixel, to_rational};

static FFMPEG_INIT: InitGuard = InitGuard::new();

/// Timing of the packet last handed out by the encoder, applied when the
/// caller writes it.
#[derive(Clone, Copy)]
struct PacketTiming {
    pts: Option<i64>,
    dts: Option<i64>,
    key: bool,
}

/// Drives libavformat/libavcodec through ffmpeg-next.
pub struct FfmpegBackend {
    octx: Option<format::context::Output>,
    encoder: Option<ffmpeg_next::encoder::video::Encoder>,
    scaler: Option<(PixelFormat, PixelFormat, scaling::Context)>,
    stream_index: usize,
    time_base: Rational,
    next_pts: i64,
    raw_pts: i64,
    pending: Option<PacketTiming>,
    draining: bool,
    frames_written: u64,
}

// Safety: FfmpegBackend is owned by a single StreamWriter and only used from
// one thread at a time. The raw pointers inside ffmpeg types are not shared.
unsafe impl Send for FfmpegBackend {}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            octx: None,
            encoder: None,
            scaler: None,
            stream_index: 0,
            time_base: Rational::new(1, 1),
            next_pts: 0,
            raw_pts: 0,
            pending: None,
            draining: false,
            frames_written: 0,
        }
    }

    fn octx_mut(&mut self) -> io::Result<&mut format::context::Output> {
        self.octx
            .as_mut()
            .ok_or_else(|| io::Error::other("output context is not allocated"))
    }

    fn receive_packet(&mut self, out: &mut [u8]) -> Result<usize, StreamError> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(0);
        };
        let mut packet = Packet::empty();
        match encoder.receive_packet(&mut packet) {
            Ok(()) => {
                let data = packet.data().unwrap_or(&[]);
                if data.len() > out.len() {
                    return Err(StreamError::Encode(format!(
                        "encoded frame of {} bytes exceeds the {} byte output buffer",
                        data.len(),
                        out.len()
                    )));
                }
                out[..data.len()].copy_from_slice(data);
                self.pending = Some(PacketTiming {
                    pts: packet.pts(),
                    dts: packet.dts(),
                    key: packet.is_key(),
                });
                Ok(data.len())
            }
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(0)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(0),
            Err(e) => Err(StreamError::Encode(format!("error receiving packet: {e}"))),
        }
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn c_path(path: &Path) -> Result<CString, String> {
    let s = path
        .to_str()
        .ok_or_else(|| format!("path is not valid UTF-8: {}", path.display()))?;
    CString::new(s).map_err(|e| e.to_string())
}

/// Copies a tightly packed picture into a frame, respecting its strides.
fn frame_from_picture(picture: &Picture) -> VideoFrame {
    let mut frame = VideoFrame::new(
        to_pixel(picture.format()),
        picture.width(),
        picture.height(),
    );
    for (i, plane) in picture.planes().iter().enumerate() {
        let stride = frame.stride(i);
        let src = picture.plane(i);
        let dst = frame.data_mut(i);
        for row in 0..plane.rows {
            let from = row * plane.row_bytes;
            dst[row * stride..row * stride + plane.row_bytes]
                .copy_from_slice(&src[from..from + plane.row_bytes]);
        }
    }
    frame
}

fn picture_from_frame(frame: &VideoFrame, picture: &mut Picture) {
    for (i, plane) in picture.planes().iter().enumerate() {
        let stride = frame.stride(i);
        let src = frame.data(i);
        let dst = picture.plane_mut(i);
        for row in 0..plane.rows {
            let to = row * plane.row_bytes;
            dst[to..to + plane.row_bytes]
                .copy_from_slice(&src[row * stride..row * stride + plane.row_bytes]);
        }
    }
}

impl MediaBackend for FfmpegBackend {
    fn initialize(&self) -> Result<(), StreamError> {
        FFMPEG_INIT.run(|| ffmpeg_next::init().map_err(|e| e.to_string()))
    }

    fn guess_format(&self, name: &str) -> Option<ContainerFormat> {
        let short_name = CString::new(name).ok()?;
        // Safety: av_guess_format returns a pointer into libavformat's static
        // muxer table or null.
        unsafe {
            let fmt = ffi::av_guess_format(short_name.as_ptr(), ptr::null(), ptr::null());
            if fmt.is_null() {
                return None;
            }
            let fmt = &*fmt;
            let video_codec = from_codec_id(ffmpeg_next::codec::Id::from(fmt.video_codec));
            Some(ContainerFormat {
                name: CStr::from_ptr(fmt.name).to_string_lossy().into_owned(),
                video_codec,
                no_file: (fmt.flags & ffi::AVFMT_NOFILE as c_int) != 0,
                raw_picture: video_codec == Some(CodecId::RawVideo),
            })
        }
    }

    fn find_encoder(&self, codec: CodecId) -> Option<EncoderDescriptor> {
        let found = ffmpeg_next::encoder::find(to_codec_id(codec))?;
        let name = found.name().to_string();
        let video = found.video().ok()?;
        // Encoders that list no formats (rawvideo) accept anything; YUV420P
        // is the conventional choice.
        let pixel_format = video
            .formats()
            .and_then(|mut formats| formats.find_map(from_pixel))
            .unwrap_or(PixelFormat::Yuv420p);
        Some(EncoderDescriptor { name, pixel_format })
    }

    fn set_parameters(
        &mut self,
        output: &OutputContext,
        stream: Option<&CodecParameters>,
    ) -> Result<Option<usize>, StreamError> {
        let name = CString::new(output.format().name.as_str())
            .map_err(|e| StreamError::Config(format!("invalid output format parameters: {e}")))?;
        let path = c_path(output.filename())
            .map_err(|e| StreamError::Config(format!("invalid output format parameters: {e}")))?;

        // Safety: on success avformat_alloc_output_context2 hands us sole
        // ownership of the context, which Output frees on drop.
        let mut octx = unsafe {
            let mut ps: *mut ffi::AVFormatContext = ptr::null_mut();
            let ret = ffi::avformat_alloc_output_context2(
                &mut ps,
                ptr::null(),
                name.as_ptr(),
                path.as_ptr(),
            );
            if ret < 0 || ps.is_null() {
                return Err(StreamError::Config(format!(
                    "invalid output format parameters: {}",
                    ffmpeg_next::Error::from(ret)
                )));
            }
            format::context::Output::wrap(ps)
        };

        let index = match stream {
            Some(params) => {
                let codec = ffmpeg_next::encoder::find(to_codec_id(params.codec_id));
                let mut ost = octx
                    .add_stream(codec)
                    .map_err(|e| StreamError::Config(format!("could not alloc stream: {e}")))?;
                ost.set_time_base(to_rational(params.time_base));
                self.stream_index = ost.index();
                self.time_base = params.time_base;
                Some(self.stream_index)
            }
            None => None,
        };

        self.octx = Some(octx);
        Ok(index)
    }

    fn open_codec(
        &mut self,
        encoder: &EncoderDescriptor,
        params: &CodecParameters,
    ) -> Result<(), StreamError> {
        let stream_index = self.stream_index;
        let octx = self
            .octx
            .as_mut()
            .ok_or_else(|| StreamError::Config("output context is not allocated".into()))?;
        let codec = ffmpeg_next::encoder::find(to_codec_id(params.codec_id))
            .ok_or_else(|| StreamError::Config(format!("codec not found: {}", params.codec_id)))?;

        let global_header = octx
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let mut ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| StreamError::Config(format!("could not open codec: {e}")))?;

        ctx.set_width(params.width);
        ctx.set_height(params.height);
        ctx.set_format(to_pixel(encoder.pixel_format));
        ctx.set_time_base(to_rational(params.time_base));
        ctx.set_frame_rate(Some(to_rational(params.frame_rate)));
        ctx.set_bit_rate(params.bit_rate as usize);
        ctx.set_gop(params.gop_size);
        ctx.set_max_b_frames(params.max_b_frames as usize);
        if global_header {
            ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let opened = ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .map_err(|e| StreamError::Config(format!("could not open codec: {e}")))?;

        let mut ost = octx
            .stream_mut(stream_index)
            .ok_or_else(|| StreamError::Config(format!("no stream at index {stream_index}")))?;
        ost.set_parameters(&opened);

        log::debug!("opened encoder {} ({})", encoder.name, encoder.pixel_format);
        self.encoder = Some(opened);
        self.next_pts = 0;
        self.draining = false;
        Ok(())
    }

    fn open_sink(&mut self, path: &Path) -> io::Result<()> {
        let path = c_path(path).map_err(io::Error::other)?;
        let octx = self.octx_mut()?;
        // Safety: `pb` belongs to the context we own; avio_open stores the
        // new handle there and avio_closep releases it.
        let ret = unsafe {
            ffi::avio_open(
                &mut (*octx.as_mut_ptr()).pb,
                path.as_ptr(),
                ffi::AVIO_FLAG_WRITE as c_int,
            )
        };
        if ret < 0 {
            return Err(io::Error::other(ffmpeg_next::Error::from(ret)));
        }
        Ok(())
    }

    fn write_header(&mut self) -> io::Result<()> {
        self.octx_mut()?.write_header().map_err(io::Error::other)
    }

    fn convert(&mut self, src: &Picture, dst: &mut Picture) -> Result<(), StreamError> {
        let key = (src.format(), dst.format());
        let stale = !matches!(&self.scaler, Some((from, to, _)) if (*from, *to) == key);
        if stale {
            let ctx = scaling::Context::get(
                to_pixel(src.format()),
                src.width(),
                src.height(),
                to_pixel(dst.format()),
                dst.width(),
                dst.height(),
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| StreamError::Encode(format!("cannot initialize the conversion context: {e}")))?;
            self.scaler = Some((key.0, key.1, ctx));
        }
        let Some((_, _, scaler)) = self.scaler.as_mut() else {
            return Err(StreamError::Encode("conversion context missing".into()));
        };

        let input = frame_from_picture(src);
        let mut output = VideoFrame::empty();
        scaler
            .run(&input, &mut output)
            .map_err(|e| StreamError::Encode(format!("pixel conversion failed: {e}")))?;
        picture_from_frame(&output, dst);
        Ok(())
    }

    fn encode_frame(&mut self, picture: &Picture, out: &mut [u8]) -> Result<usize, StreamError> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| StreamError::Encode("codec is not open".into()))?;
        let mut frame = frame_from_picture(picture);
        frame.set_pts(Some(self.next_pts));
        encoder
            .send_frame(&frame)
            .map_err(|e| StreamError::Encode(format!("error sending frame: {e}")))?;
        self.next_pts += 1;
        self.receive_packet(out)
    }

    fn flush_encoder(&mut self, out: &mut [u8]) -> Result<usize, StreamError> {
        if !self.draining {
            if let Some(encoder) = self.encoder.as_mut() {
                encoder
                    .send_eof()
                    .map_err(|e| StreamError::Encode(format!("error flushing encoder: {e}")))?;
            }
            self.draining = true;
        }
        self.receive_packet(out)
    }

    fn frames_emitted(&self) -> u64 {
        self.frames_written
    }

    fn write_frame(&mut self, stream_index: usize, payload: &[u8]) -> io::Result<()> {
        let mut packet = Packet::copy(payload);
        match self.pending.take() {
            Some(timing) => {
                packet.set_pts(timing.pts);
                packet.set_dts(timing.dts);
                if timing.key {
                    packet.set_flags(PacketFlags::KEY);
                }
            }
            None => {
                // Raw pictures bypass the encoder: one picture per tick.
                packet.set_pts(Some(self.raw_pts));
                packet.set_dts(Some(self.raw_pts));
                packet.set_flags(PacketFlags::KEY);
                self.raw_pts += 1;
            }
        }

        let time_base = to_rational(self.time_base);
        let octx = self.octx_mut()?;
        let ost_time_base = octx
            .stream(stream_index)
            .ok_or_else(|| io::Error::other(format!("no stream at index {stream_index}")))?
            .time_base();
        packet.set_stream(stream_index);
        packet.rescale_ts(time_base, ost_time_base);
        packet.write_interleaved(octx).map_err(io::Error::other)?;

        self.frames_written += 1;
        Ok(())
    }

    fn write_trailer(&mut self) -> io::Result<()> {
        self.octx_mut()?.write_trailer().map_err(io::Error::other)
    }

    fn close_codec(&mut self) -> Result<(), StreamError> {
        self.encoder = None;
        self.scaler = None;
        self.pending = None;
        Ok(())
    }

    fn close_sink(&mut self) -> io::Result<()> {
        let Some(octx) = self.octx.as_mut() else {
            return Ok(());
        };
        // Safety: see open_sink. avio_closep nulls `pb`, so the context's own
        // cleanup will not touch the handle again.
        let ret = unsafe { ffi::avio_closep(&mut (*octx.as_mut_ptr()).pb) };
        if ret < 0 {
            return Err(io::Error::other(ffmpeg_next::Error::from(ret)));
        }
        Ok(())
    }

    fn release_context(&mut self) {
        self.octx = None;
    }
}
