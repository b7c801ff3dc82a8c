use crate::shared::codec::{CodecParameters, EncoderDescriptor};
use crate::shared::constants::OUTPUT_BUFFER_CAPACITY;
use crate::shared::container::{ContainerFormat, OutputContext};
use crate::shared::error::StreamError;
use crate::shared::stream_clock::StreamClock;
use crate::shared::stream_config::StreamConfig;
use crate::video::domain::codec_configurator;
use crate::video::domain::format_resolver;
use crate::video::domain::frame_buffers::{FrameBuffers, OutputBuffer};
use crate::video::domain::media_backend::MediaBackend;
use crate::video::domain::parameter_finalizer;

/// The open video stream: negotiated parameters and the buffers reused for
/// every frame.
struct VideoStream {
    index: usize,
    params: CodecParameters,
    encoder: EncoderDescriptor,
    clock: StreamClock,
    buffers: FrameBuffers,
}

/// Writes one video stream into one container.
///
/// Construction runs every setup phase and leaves the container header
/// written. Frames then go through [`encode_frame`](Self::encode_frame);
/// [`close`](Self::close) drains the encoder and writes the trailer.
/// Dropping an unclosed writer performs the same teardown and logs any
/// failure.
pub struct StreamWriter {
    backend: Box<dyn MediaBackend>,
    config: StreamConfig,
    output: OutputContext,
    stream: Option<VideoStream>,
    output_buffer: Option<OutputBuffer>,
    frame_len: usize,
    codec_open: bool,
    sink_open: bool,
    finished: bool,
}

impl StreamWriter {
    pub fn open(config: StreamConfig, mut backend: Box<dyn MediaBackend>) -> Result<Self, StreamError> {
        backend.initialize()?;

        let output = format_resolver::resolve(
            &*backend,
            &config.filename,
            config.format_hint.as_deref(),
        )?;
        let params = codec_configurator::configure(output.format(), &config);
        let index = parameter_finalizer::finalize(&mut *backend, &output, params.as_ref())?;

        let mut writer = Self {
            backend,
            config,
            output,
            stream: None,
            output_buffer: None,
            frame_len: 0,
            codec_open: false,
            sink_open: false,
            finished: false,
        };
        if let Err(e) = writer.allocate(params.zip(index)) {
            writer.abandon();
            return Err(e);
        }
        Ok(writer)
    }

    fn allocate(&mut self, stream: Option<(CodecParameters, usize)>) -> Result<(), StreamError> {
        self.frame_len = self.config.frame_len()?;
        if let Some((params, index)) = stream {
            let encoder = self.backend.find_encoder(params.codec_id).ok_or_else(|| {
                StreamError::Config(format!("codec not found: {}", params.codec_id))
            })?;
            self.backend.open_codec(&encoder, &params)?;
            self.codec_open = true;

            let buffers = FrameBuffers::allocate(
                encoder.pixel_format,
                self.config.source_pixel_format(),
                params.width,
                params.height,
            )?;
            log::debug!(
                "opened {} ({}x{} {}, gop {}, b-frames {}, conversion from {}: {})",
                encoder.name,
                params.width,
                params.height,
                encoder.pixel_format,
                params.gop_size,
                params.max_b_frames,
                self.config.source_pixel_format(),
                buffers.has_scratch()
            );
            self.stream = Some(VideoStream {
                index,
                clock: StreamClock::new(params.time_base),
                params,
                encoder,
                buffers,
            });
        }

        if !self.output.format().no_file {
            let filename = self.output.filename();
            self.backend.open_sink(filename).map_err(|e| {
                StreamError::io(format!("could not open '{}'", filename.display()), e)
            })?;
            self.sink_open = true;
        }

        if !self.output.format().raw_picture {
            self.output_buffer = Some(OutputBuffer::with_capacity(OUTPUT_BUFFER_CAPACITY)?);
        }

        self.backend
            .write_header()
            .map_err(|e| StreamError::io("could not write header", e))
    }

    /// Releases whatever a failed construction managed to open. No trailer
    /// is written since the header never was.
    fn abandon(&mut self) {
        self.finished = true;
        self.stream = None;
        self.output_buffer = None;
        if self.codec_open {
            if let Err(e) = self.backend.close_codec() {
                log::warn!("close codec failed: {e}");
            }
            self.codec_open = false;
        }
        if self.sink_open {
            if let Err(e) = self.backend.close_sink() {
                log::warn!("close sink failed: {e}");
            }
            self.sink_open = false;
        }
        self.backend.release_context();
    }

    /// Encodes one raw frame in the source pixel format and appends the
    /// result to the container.
    ///
    /// Returns the stream's presentation time in seconds, taken before this
    /// frame. Without a video stream the frame is ignored and 0.0 returned.
    pub fn encode_frame(&mut self, frame: &[u8]) -> Result<f64, StreamError> {
        let Some(stream) = self.stream.as_mut() else {
            log::debug!("no video stream; frame ignored");
            return Ok(0.0);
        };
        let pts = stream.clock.seconds(self.backend.frames_emitted());

        let expected = stream.buffers.source_len();
        if frame.len() != expected {
            return Err(StreamError::FrameSize {
                expected,
                actual: frame.len(),
            });
        }

        match stream.buffers.split_mut() {
            (Some(scratch), primary) => {
                scratch.fill_from(frame)?;
                self.backend.convert(scratch, primary)?;
            }
            (None, primary) => primary.fill_from(frame)?,
        }

        if self.output.format().raw_picture {
            self.backend
                .write_frame(stream.index, stream.buffers.primary().data())
                .map_err(write_error)?;
            return Ok(pts);
        }

        let out = self
            .output_buffer
            .as_mut()
            .ok_or_else(|| StreamError::Encode("no output buffer".to_string()))?;
        let len = self
            .backend
            .encode_frame(stream.buffers.primary(), out.as_mut_slice())?;
        if len == 0 {
            log::trace!("frame buffered by encoder");
            return Ok(pts);
        }
        self.backend
            .write_frame(stream.index, out.filled(len))
            .map_err(write_error)?;
        Ok(pts)
    }

    /// Flushes the encoder, writes the trailer and releases everything.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn close(mut self) -> Result<(), StreamError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), StreamError> {
        self.finished = true;
        let mut first_error: Option<StreamError> = None;
        let mut record = |step: &str, result: Result<(), StreamError>| {
            if let Err(e) = result {
                log::warn!("{step} failed: {e}");
                first_error.get_or_insert(e);
            }
        };

        if let Some(stream) = self.stream.take() {
            if let Some(out) = self.output_buffer.as_mut() {
                record(
                    "flush encoder",
                    drain_encoder(&mut *self.backend, stream.index, out),
                );
            }
            record("close codec", self.backend.close_codec());
            self.codec_open = false;
            self.output_buffer = None;
        }

        record(
            "write trailer",
            self.backend
                .write_trailer()
                .map_err(|e| StreamError::io("could not write trailer", e)),
        );

        if self.sink_open {
            record(
                "close sink",
                self.backend
                    .close_sink()
                    .map_err(|e| StreamError::io("could not close output", e)),
            );
            self.sink_open = false;
        }

        self.backend.release_context();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn format(&self) -> &ContainerFormat {
        self.output.format()
    }

    pub fn output(&self) -> &OutputContext {
        &self.output
    }

    pub fn codec_parameters(&self) -> Option<&CodecParameters> {
        self.stream.as_ref().map(|s| &s.params)
    }

    pub fn encoder(&self) -> Option<&EncoderDescriptor> {
        self.stream.as_ref().map(|s| &s.encoder)
    }

    pub fn stream_index(&self) -> Option<usize> {
        self.stream.as_ref().map(|s| s.index)
    }

    pub fn stream_count(&self) -> usize {
        usize::from(self.stream.is_some())
    }

    pub fn has_scratch_buffer(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|s| s.buffers.has_scratch())
    }

    /// Bytes [`encode_frame`](Self::encode_frame) expects per frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn presentation_time(&self) -> f64 {
        self.stream
            .as_ref()
            .map_or(0.0, |s| s.clock.seconds(self.backend.frames_emitted()))
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.teardown() {
                log::error!("stream writer teardown failed: {e}");
            }
        }
    }
}

fn write_error(e: std::io::Error) -> StreamError {
    StreamError::io("error while writing video frame", e)
}

fn drain_encoder(
    backend: &mut dyn MediaBackend,
    stream_index: usize,
    out: &mut OutputBuffer,
) -> Result<(), StreamError> {
    loop {
        let len = backend.flush_encoder(out.as_mut_slice())?;
        if len == 0 {
            return Ok(());
        }
        backend
            .write_frame(stream_index, out.filled(len))
            .map_err(write_error)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::codec::CodecId;
    use crate::shared::pixel_format::{PixelFormat, PixelLayout};
    use crate::video::infrastructure::memory_backend::{MemoryBackend, MemoryContainer};
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    fn config(hint: Option<&str>, layout: PixelLayout) -> StreamConfig {
        StreamConfig {
            filename: PathBuf::from("out.mpg"),
            format_hint: hint.map(str::to_string),
            layout,
            width: 320,
            height: 240,
            bit_rate: 400_000,
            frame_rate: 25,
        }
    }

    fn open(
        config: StreamConfig,
        backend: MemoryBackend,
    ) -> (StreamWriter, Arc<Mutex<MemoryContainer>>) {
        let container = backend.container();
        let writer = StreamWriter::open(config, Box::new(backend)).unwrap();
        (writer, container)
    }

    fn open_err(config: StreamConfig, backend: MemoryBackend) -> (StreamError, Arc<Mutex<MemoryContainer>>) {
        let container = backend.container();
        match StreamWriter::open(config, Box::new(backend)) {
            Ok(_) => panic!("expected open to fail"),
            Err(e) => (e, container),
        }
    }

    // --- Setup ---

    #[test]
    fn test_mpeg_scenario() {
        let (writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), MemoryBackend::new());

        assert!(container.lock().unwrap().header_written);
        assert_eq!(writer.stream_count(), 1);
        assert_eq!(writer.stream_index(), Some(0));
        let params = writer.codec_parameters().unwrap();
        assert_eq!(params.codec_id, CodecId::Mpeg1Video);
        assert_eq!(params.codec_id, writer.format().video_codec.unwrap());
        assert_eq!(params.gop_size, 30);
        assert_eq!(params.max_b_frames, 2);
        assert_eq!(params.bit_rate, 400_000);
        assert_eq!(writer.frame_len(), 320 * 240 * 3);
        assert_eq!(container.lock().unwrap().streams.len(), 1);
    }

    #[rstest]
    #[case::unknown_hint(Some("bogus"))]
    #[case::no_hint(None)]
    fn test_unresolved_hint_uses_default(#[case] hint: Option<&str>) {
        let (writer, _) = open(config(hint, PixelLayout::Rgb), MemoryBackend::new());
        assert_eq!(writer.format().name, "mpeg");
    }

    #[rstest]
    #[case::rgb_to_yuv("mpeg", PixelLayout::Rgb, true)]
    #[case::gray_to_yuv("mpeg", PixelLayout::Gray, true)]
    #[case::rgb_raw("rawvideo", PixelLayout::Rgb, false)]
    #[case::gray_to_rgb_raw("rawvideo", PixelLayout::Gray, true)]
    fn test_scratch_buffer_iff_formats_differ(
        #[case] hint: &str,
        #[case] layout: PixelLayout,
        #[case] expected: bool,
    ) {
        let (writer, _) = open(config(Some(hint), layout), MemoryBackend::new());
        let codec_format = writer.encoder().unwrap().pixel_format;
        assert_eq!(writer.has_scratch_buffer(), expected);
        assert_eq!(
            writer.has_scratch_buffer(),
            codec_format != layout.pixel_format()
        );
    }

    #[rstest]
    #[case::mpeg_rgb("mpeg", PixelLayout::Rgb)]
    #[case::mpeg_gray("mpeg", PixelLayout::Gray)]
    #[case::raw_rgb("rawvideo", PixelLayout::Rgb)]
    #[case::raw_gray("rawvideo", PixelLayout::Gray)]
    fn test_open_then_close_without_frames(#[case] hint: &str, #[case] layout: PixelLayout) {
        let (writer, container) = open(config(Some(hint), layout), MemoryBackend::new());
        writer.close().unwrap();

        let state = container.lock().unwrap();
        assert!(state.header_written);
        assert!(state.trailer_written);
        assert!(state.frames.is_empty());
        assert!(state.released);
        assert!(!state.codec_open);
        assert!(!state.sink_open);
    }

    #[test]
    fn test_no_file_format_skips_sink() {
        let (writer, container) = open(config(Some("null"), PixelLayout::Rgb), MemoryBackend::new());
        writer.close().unwrap();
        let state = container.lock().unwrap();
        assert!(!state.calls.contains(&"open_sink"));
        assert!(!state.calls.contains(&"close_sink"));
        assert!(state.header_written);
    }

    #[test]
    fn test_container_without_video() {
        let (mut writer, container) = open(config(Some("wav"), PixelLayout::Rgb), MemoryBackend::new());
        assert_eq!(writer.stream_count(), 0);
        assert!(writer.codec_parameters().is_none());
        assert!(!writer.has_scratch_buffer());

        // Frames are ignored, whatever their size.
        assert_relative_eq!(writer.encode_frame(&[0u8; 7]).unwrap(), 0.0);
        writer.close().unwrap();

        let state = container.lock().unwrap();
        assert!(state.frames.is_empty());
        assert!(state.trailer_written);
        assert!(!state.calls.contains(&"open_codec"));
        assert!(!state.calls.contains(&"close_codec"));
    }

    #[test]
    fn test_missing_encoder_is_config_error() {
        let backend = MemoryBackend::new().without_encoder(CodecId::Mpeg1Video);
        let (err, container) = open_err(config(Some("mpeg"), PixelLayout::Rgb), backend);
        assert!(matches!(err, StreamError::Config(msg) if msg.contains("codec not found")));
        let state = container.lock().unwrap();
        assert!(state.released);
        assert!(!state.header_written);
    }

    #[test]
    fn test_codec_open_failure_is_config_error() {
        let backend = MemoryBackend::new().fail_codec_open();
        let (err, _) = open_err(config(Some("mpeg"), PixelLayout::Rgb), backend);
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn test_sink_open_failure_releases_codec() {
        let backend = MemoryBackend::new().fail_sink_open();
        let (err, container) = open_err(config(Some("mpeg"), PixelLayout::Rgb), backend);
        assert!(matches!(&err, StreamError::Io { context, .. } if context.contains("could not open 'out.mpg'")));

        let state = container.lock().unwrap();
        assert!(!state.codec_open);
        assert!(state.released);
        assert!(!state.calls.contains(&"write_header"));
        assert!(!state.calls.contains(&"write_trailer"));
    }

    #[test]
    fn test_rejected_parameters_fail_open() {
        let backend = MemoryBackend::new().reject_parameters();
        let (err, _) = open_err(config(Some("mpeg"), PixelLayout::Rgb), backend);
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[rstest]
    #[case::converting("mpeg")]
    #[case::without_video("wav")]
    fn test_oversized_frame_is_allocation_error(#[case] hint: &str) {
        let mut cfg = config(Some(hint), PixelLayout::Rgb);
        cfg.width = u32::MAX;
        cfg.height = u32::MAX;
        let (err, container) = open_err(cfg, MemoryBackend::new());
        assert!(matches!(err, StreamError::Allocation(_)));

        let state = container.lock().unwrap();
        assert!(state.released);
        assert!(!state.codec_open);
        assert!(!state.header_written);
    }

    // --- Frame pipeline ---

    #[test]
    fn test_black_rgb_frame_encodes() {
        let (mut writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), MemoryBackend::new());
        let frame = vec![0u8; writer.frame_len()];
        let pts = writer.encode_frame(&frame).unwrap();
        assert_relative_eq!(pts, 0.0);

        let state = container.lock().unwrap();
        assert_eq!(state.conversions, 1);
        assert_eq!(state.frames.len(), 1);
        assert_eq!(state.frames[0].stream_index, 0);
    }

    #[rstest]
    #[case::short(320 * 240 * 3 - 1)]
    #[case::long(320 * 240 * 3 + 1)]
    #[case::empty(0)]
    fn test_wrong_frame_length_is_rejected(#[case] len: usize) {
        let (mut writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), MemoryBackend::new());
        let err = writer.encode_frame(&vec![0u8; len]).unwrap_err();
        assert!(matches!(
            err,
            StreamError::FrameSize { expected, actual } if expected == 320 * 240 * 3 && actual == len
        ));
        let state = container.lock().unwrap();
        assert!(state.frames.is_empty());
        assert_eq!(state.conversions, 0);
        assert_eq!(state.encode_calls, 0);
    }

    #[test]
    fn test_buffered_frames_are_not_written() {
        const N: usize = 10;
        const K: usize = 3;
        let backend = MemoryBackend::new().with_encoder_delay(K);
        let (mut writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), backend);
        let frame = vec![0u8; writer.frame_len()];
        for _ in 0..N {
            writer.encode_frame(&frame).unwrap();
        }

        {
            let state = container.lock().unwrap();
            assert_eq!(state.encode_calls, N);
            assert_eq!(state.frames.len(), N - K);
            assert!(state.frames.iter().all(|f| f.stream_index == 0));
        }

        // The held-back frames come out on close.
        writer.close().unwrap();
        assert_eq!(container.lock().unwrap().frames.len(), N);
    }

    #[test]
    fn test_raw_picture_written_without_encoder() {
        let (mut writer, container) =
            open(config(Some("rawvideo"), PixelLayout::Rgb), MemoryBackend::new());
        let frame: Vec<u8> = (0..writer.frame_len()).map(|i| (i % 251) as u8).collect();
        writer.encode_frame(&frame).unwrap();

        let state = container.lock().unwrap();
        assert_eq!(state.encode_calls, 0);
        assert_eq!(state.conversions, 0);
        assert_eq!(state.frames.len(), 1);
        assert_eq!(state.frames[0].payload, frame);
    }

    #[test]
    fn test_gray_raw_picture_is_converted() {
        let mut cfg = config(Some("rawvideo"), PixelLayout::Gray);
        cfg.width = 2;
        cfg.height = 1;
        let (mut writer, container) = open(cfg, MemoryBackend::new());
        writer.encode_frame(&[10, 200]).unwrap();

        let state = container.lock().unwrap();
        assert_eq!(state.conversions, 1);
        assert_eq!(state.frames[0].payload, vec![10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn test_presentation_time_advances_with_written_frames() {
        let (mut writer, _) = open(config(Some("mpeg"), PixelLayout::Gray), MemoryBackend::new());
        let frame = vec![0u8; writer.frame_len()];
        let mut last = 0.0;
        for _ in 0..25 {
            last = writer.encode_frame(&frame).unwrap();
        }
        assert_relative_eq!(last, 24.0 / 25.0, epsilon = 1e-9);
        assert_relative_eq!(writer.presentation_time(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let backend = MemoryBackend::new().fail_write_at(1);
        let (mut writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), backend);
        let frame = vec![0u8; writer.frame_len()];
        writer.encode_frame(&frame).unwrap();
        let err = writer.encode_frame(&frame).unwrap_err();
        assert!(err.to_string().starts_with("error while writing video frame"));
        assert_eq!(container.lock().unwrap().frames.len(), 1);
    }

    #[test]
    fn test_buffers_are_reused_across_frames() {
        let mut cfg = config(Some("rawvideo"), PixelLayout::Rgb);
        cfg.width = 1;
        cfg.height = 1;
        let (mut writer, container) = open(cfg, MemoryBackend::new());
        writer.encode_frame(&[1, 2, 3]).unwrap();
        writer.encode_frame(&[4, 5, 6]).unwrap();
        let state = container.lock().unwrap();
        assert_eq!(state.frames[0].payload, vec![1, 2, 3]);
        assert_eq!(state.frames[1].payload, vec![4, 5, 6]);
    }

    // --- Teardown ---

    #[test]
    fn test_teardown_order() {
        let (writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), MemoryBackend::new());
        writer.close().unwrap();
        let state = container.lock().unwrap();
        let tail = &state.calls[state.calls.len() - 4..];
        assert_eq!(
            tail,
            &["close_codec", "write_trailer", "close_sink", "release_context"]
        );
    }

    #[test]
    fn test_teardown_continues_after_trailer_failure() {
        let backend = MemoryBackend::new().fail_trailer();
        let (writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), backend);
        let err = writer.close().unwrap_err();
        assert!(matches!(&err, StreamError::Io { context, .. } if context == "could not write trailer"));

        let state = container.lock().unwrap();
        assert!(state.calls.contains(&"close_sink"));
        assert!(state.released);
    }

    #[test]
    fn test_flush_write_failure_still_writes_trailer() {
        let backend = MemoryBackend::new().with_encoder_delay(2).fail_write_at(0);
        let (mut writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), backend);
        let frame = vec![0u8; writer.frame_len()];
        writer.encode_frame(&frame).unwrap();
        assert!(writer.close().is_err());

        let state = container.lock().unwrap();
        assert!(state.trailer_written);
        assert!(state.released);
    }

    #[test]
    fn test_drop_without_close_tears_down() {
        let (writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), MemoryBackend::new());
        drop(writer);
        let state = container.lock().unwrap();
        assert!(state.trailer_written);
        assert!(state.released);
    }

    #[test]
    fn test_close_runs_teardown_once() {
        let (writer, container) = open(config(Some("mpeg"), PixelLayout::Rgb), MemoryBackend::new());
        writer.close().unwrap();
        let state = container.lock().unwrap();
        let trailers = state.calls.iter().filter(|c| **c == "write_trailer").count();
        assert_eq!(trailers, 1);
    }

    #[test]
    fn test_codec_format_reported() {
        let (writer, _) = open(config(Some("mjpeg"), PixelLayout::Rgb), MemoryBackend::new());
        assert_eq!(writer.encoder().unwrap().pixel_format, PixelFormat::Yuvj420p);
        assert_eq!(writer.codec_parameters().unwrap().max_b_frames, 0);
    }
}
