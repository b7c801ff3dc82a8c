use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::shared::codec::{CodecId, CodecParameters, EncoderDescriptor};
use crate::shared::container::{ContainerFormat, OutputContext};
use crate::shared::error::StreamError;
use crate::shared::init_guard::InitGuard;
use crate::shared::picture::Picture;
use crate::shared::pixel_format::PixelFormat;
use crate::video::domain::media_backend::MediaBackend;
use crate::video::infrastructure::pixel_convert;

static MEMORY_INIT: InitGuard = InitGuard::new();

/// Size of the packets produced by the in-memory encoder:
/// frame number (u64), picture length (u32), byte checksum (u32).
pub const MEMORY_PACKET_LEN: usize = 16;

/// One unit appended to the in-memory stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenFrame {
    pub stream_index: usize,
    pub payload: Vec<u8>,
}

/// Everything the in-memory library has been asked to do, in the order it
/// happened. Shared with the caller so it stays inspectable after the
/// backend has been moved into a writer.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    pub format: Option<String>,
    pub filename: Option<PathBuf>,
    pub streams: Vec<CodecParameters>,
    pub codec_open: bool,
    pub sink_open: bool,
    pub header_written: bool,
    pub trailer_written: bool,
    pub released: bool,
    pub frames: Vec<WrittenFrame>,
    pub conversions: usize,
    pub encode_calls: usize,
    pub calls: Vec<&'static str>,
}

#[derive(Clone, Debug, Default)]
struct Faults {
    reject_parameters: bool,
    fail_codec_open: bool,
    fail_sink_open: bool,
    fail_write_at: Option<usize>,
    fail_trailer: bool,
}

/// A container/codec library that keeps its output in memory.
///
/// Backs the CLI dry run and the test suite. The encoder emits a small
/// digest per picture rather than a real bitstream, and can be told to hold
/// frames back to behave like an encoder with B-frame reordering.
pub struct MemoryBackend {
    container: Arc<Mutex<MemoryContainer>>,
    formats: Vec<ContainerFormat>,
    missing_encoders: Vec<CodecId>,
    encoder_delay: usize,
    faults: Faults,
    pending: VecDeque<Vec<u8>>,
    pictures_encoded: u64,
    no_file: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            container: Arc::new(Mutex::new(MemoryContainer::default())),
            formats: builtin_formats(),
            missing_encoders: Vec::new(),
            encoder_delay: 0,
            faults: Faults::default(),
            pending: VecDeque::new(),
            pictures_encoded: 0,
            no_file: false,
        }
    }

    /// Handle onto the recorded output.
    pub fn container(&self) -> Arc<Mutex<MemoryContainer>> {
        Arc::clone(&self.container)
    }

    /// The first `frames` encode calls produce no output.
    pub fn with_encoder_delay(mut self, frames: usize) -> Self {
        self.encoder_delay = frames;
        self
    }

    pub fn without_encoder(mut self, codec: CodecId) -> Self {
        self.missing_encoders.push(codec);
        self
    }

    /// Adds a container, replacing any built-in one of the same name.
    pub fn with_format(mut self, format: ContainerFormat) -> Self {
        self.formats.retain(|f| f.name != format.name);
        self.formats.push(format);
        self
    }

    pub fn without_format(mut self, name: &str) -> Self {
        self.formats.retain(|f| f.name != name);
        self
    }

    pub fn reject_parameters(mut self) -> Self {
        self.faults.reject_parameters = true;
        self
    }

    pub fn fail_codec_open(mut self) -> Self {
        self.faults.fail_codec_open = true;
        self
    }

    pub fn fail_sink_open(mut self) -> Self {
        self.faults.fail_sink_open = true;
        self
    }

    /// Fails the write of the frame at `index` (0-based).
    pub fn fail_write_at(mut self, index: usize) -> Self {
        self.faults.fail_write_at = Some(index);
        self
    }

    pub fn fail_trailer(mut self) -> Self {
        self.faults.fail_trailer = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryContainer> {
        self.container
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&mut self, out: &mut [u8]) -> Result<usize, StreamError> {
        let Some(packet) = self.pending.pop_front() else {
            return Ok(0);
        };
        if packet.len() > out.len() {
            return Err(StreamError::Encode(format!(
                "encoded frame of {} bytes exceeds output buffer of {} bytes",
                packet.len(),
                out.len()
            )));
        }
        out[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_formats() -> Vec<ContainerFormat> {
    let format = |name: &str, video_codec, no_file, raw_picture| ContainerFormat {
        name: name.to_string(),
        video_codec,
        no_file,
        raw_picture,
    };
    vec![
        format("mpeg", Some(CodecId::Mpeg1Video), false, false),
        format("vob", Some(CodecId::Mpeg2Video), false, false),
        format("mp4", Some(CodecId::Mpeg4), false, false),
        format("avi", Some(CodecId::Mpeg4), false, false),
        format("h264", Some(CodecId::H264), false, false),
        format("mjpeg", Some(CodecId::Mjpeg), false, false),
        format("rawvideo", Some(CodecId::RawVideo), false, true),
        format("null", Some(CodecId::RawVideo), true, true),
        format("wav", None, false, false),
    ]
}

fn native_pixel_format(codec: CodecId) -> PixelFormat {
    match codec {
        CodecId::Mjpeg => PixelFormat::Yuvj420p,
        CodecId::RawVideo => PixelFormat::Rgb24,
        _ => PixelFormat::Yuv420p,
    }
}

fn digest(frame_number: u64, picture: &Picture) -> Vec<u8> {
    let checksum = picture
        .data()
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
    let mut packet = Vec::with_capacity(MEMORY_PACKET_LEN);
    packet.extend_from_slice(&frame_number.to_le_bytes());
    packet.extend_from_slice(&(picture.len() as u32).to_le_bytes());
    packet.extend_from_slice(&checksum.to_le_bytes());
    packet
}

impl MediaBackend for MemoryBackend {
    fn initialize(&self) -> Result<(), StreamError> {
        MEMORY_INIT.run(|| Ok(()))
    }

    fn guess_format(&self, name: &str) -> Option<ContainerFormat> {
        self.formats.iter().find(|f| f.name == name).cloned()
    }

    fn find_encoder(&self, codec: CodecId) -> Option<EncoderDescriptor> {
        if self.missing_encoders.contains(&codec) {
            return None;
        }
        Some(EncoderDescriptor {
            name: format!("memory-{}", codec.name()),
            pixel_format: native_pixel_format(codec),
        })
    }

    fn set_parameters(
        &mut self,
        output: &OutputContext,
        stream: Option<&CodecParameters>,
    ) -> Result<Option<usize>, StreamError> {
        let reject = self.faults.reject_parameters;
        self.no_file = output.format().no_file;
        let mut state = self.state();
        state.calls.push("set_parameters");
        if reject {
            return Err(StreamError::Config(
                "invalid output format parameters".to_string(),
            ));
        }
        state.format = Some(output.format().name.clone());
        state.filename = Some(output.filename().to_path_buf());
        Ok(stream.map(|params| {
            state.streams.push(params.clone());
            state.streams.len() - 1
        }))
    }

    fn open_codec(
        &mut self,
        encoder: &EncoderDescriptor,
        params: &CodecParameters,
    ) -> Result<(), StreamError> {
        let fail = self.faults.fail_codec_open;
        let mut state = self.state();
        state.calls.push("open_codec");
        if fail {
            return Err(StreamError::Config(format!(
                "could not open codec {} ({})",
                params.codec_id, encoder.name
            )));
        }
        state.codec_open = true;
        Ok(())
    }

    fn open_sink(&mut self, path: &Path) -> io::Result<()> {
        let fail = self.faults.fail_sink_open;
        let mut state = self.state();
        state.calls.push("open_sink");
        if fail {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot create {}", path.display()),
            ));
        }
        state.sink_open = true;
        Ok(())
    }

    fn write_header(&mut self) -> io::Result<()> {
        let no_file = self.no_file;
        let mut state = self.state();
        state.calls.push("write_header");
        if !state.sink_open && !no_file {
            return Err(io::Error::other("sink is not open"));
        }
        state.header_written = true;
        Ok(())
    }

    fn convert(&mut self, src: &Picture, dst: &mut Picture) -> Result<(), StreamError> {
        pixel_convert::convert(src, dst)?;
        self.state().conversions += 1;
        Ok(())
    }

    fn encode_frame(&mut self, picture: &Picture, out: &mut [u8]) -> Result<usize, StreamError> {
        {
            let mut state = self.state();
            if !state.codec_open {
                return Err(StreamError::Encode("codec is not open".to_string()));
            }
            state.encode_calls += 1;
        }
        self.pending
            .push_back(digest(self.pictures_encoded, picture));
        self.pictures_encoded += 1;
        if self.pending.len() > self.encoder_delay {
            self.emit(out)
        } else {
            Ok(0)
        }
    }

    fn flush_encoder(&mut self, out: &mut [u8]) -> Result<usize, StreamError> {
        self.emit(out)
    }

    fn frames_emitted(&self) -> u64 {
        self.state().frames.len() as u64
    }

    fn write_frame(&mut self, stream_index: usize, payload: &[u8]) -> io::Result<()> {
        let fail_at = self.faults.fail_write_at;
        let mut state = self.state();
        state.calls.push("write_frame");
        if !state.header_written {
            return Err(io::Error::other("header not written"));
        }
        if fail_at == Some(state.frames.len()) {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "injected write failure"));
        }
        state.frames.push(WrittenFrame {
            stream_index,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn write_trailer(&mut self) -> io::Result<()> {
        let fail = self.faults.fail_trailer;
        let mut state = self.state();
        state.calls.push("write_trailer");
        if fail {
            return Err(io::Error::other("injected trailer failure"));
        }
        state.trailer_written = true;
        Ok(())
    }

    fn close_codec(&mut self) -> Result<(), StreamError> {
        self.pending.clear();
        let mut state = self.state();
        state.calls.push("close_codec");
        state.codec_open = false;
        Ok(())
    }

    fn close_sink(&mut self) -> io::Result<()> {
        let mut state = self.state();
        state.calls.push("close_sink");
        state.sink_open = false;
        Ok(())
    }

    fn release_context(&mut self) {
        let mut state = self.state();
        state.calls.push("release_context");
        state.streams.clear();
        state.released = true;
    }
}
