use std::time::Instant;

use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::StreamError;
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::stream_writer::StreamWriter;

/// What an encode run did.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeSummary {
    pub frames: usize,
    /// Presentation time returned for the last submitted frame, in seconds.
    pub last_pts: f64,
    pub cancelled: bool,
}

/// Feeds every frame of a source into an open writer: read → encode.
///
/// The writer is borrowed; the caller closes it afterwards, so a cancelled
/// or failed run still gets a trailer.
pub struct EncodeFramesUseCase {
    source: Box<dyn FrameSource>,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<Box<dyn Fn(usize, Option<usize>) -> bool>>,
}

impl EncodeFramesUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<Box<dyn Fn(usize, Option<usize>) -> bool>>,
    ) -> Self {
        Self {
            source,
            logger,
            on_progress,
        }
    }

    pub fn execute(&mut self, writer: &mut StreamWriter) -> Result<EncodeSummary, StreamError> {
        let frame_len = writer.frame_len();
        if self.source.frame_len() != frame_len {
            return Err(StreamError::FrameSize {
                expected: frame_len,
                actual: self.source.frame_len(),
            });
        }

        let total = self.source.total_frames();
        self.logger.info(&format!(
            "Encoding into {} ({}) as {}",
            writer.output().filename().display(),
            writer.format().name,
            writer
                .encoder()
                .map_or("no video stream".to_string(), |e| e.name.clone()),
        ));

        let mut frame = vec![0u8; frame_len];
        let mut summary = EncodeSummary {
            frames: 0,
            last_pts: 0.0,
            cancelled: false,
        };

        loop {
            let read_start = Instant::now();
            if !self.source.read_frame(&mut frame)? {
                break;
            }
            self.logger
                .timing("read", read_start.elapsed().as_secs_f64() * 1000.0);

            let encode_start = Instant::now();
            summary.last_pts = writer.encode_frame(&frame)?;
            self.logger
                .timing("encode", encode_start.elapsed().as_secs_f64() * 1000.0);

            summary.frames += 1;
            self.logger.progress(summary.frames, total);

            if let Some(ref cb) = self.on_progress {
                if !cb(summary.frames, total) {
                    self.logger
                        .info(&format!("Cancelled after {} frames", summary.frames));
                    summary.cancelled = true;
                    break;
                }
            }
        }

        self.logger.summary();
        Ok(summary)
    }
}
