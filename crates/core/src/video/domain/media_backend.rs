use std::path::Path;

use crate::shared::codec::{CodecId, CodecParameters, EncoderDescriptor};
use crate::shared::container::{ContainerFormat, OutputContext};
use crate::shared::error::StreamError;
use crate::shared::picture::Picture;

/// The container/codec library the stream writer drives.
///
/// A backend holds the container context, the open codec and the sink for
/// exactly one writer. The writer calls these in a fixed order: setup
/// (`initialize` through `write_header`), then per frame `convert`,
/// `encode_frame` and `write_frame`, then teardown (`flush_encoder`
/// through `release_context`).
pub trait MediaBackend: Send {
    /// Process-wide library setup. Implementations route this through a
    /// static [`InitGuard`](crate::shared::init_guard::InitGuard), so calling
    /// it for every writer is cheap.
    fn initialize(&self) -> Result<(), StreamError>;

    /// Looks up a container by short name.
    fn guess_format(&self, name: &str) -> Option<ContainerFormat>;

    fn find_encoder(&self, codec: CodecId) -> Option<EncoderDescriptor>;

    /// Commits container and stream parameters, allocating the container
    /// context and, when `stream` is given, its single video stream.
    /// Returns the index of that stream.
    fn set_parameters(
        &mut self,
        output: &OutputContext,
        stream: Option<&CodecParameters>,
    ) -> Result<Option<usize>, StreamError>;

    fn open_codec(
        &mut self,
        encoder: &EncoderDescriptor,
        params: &CodecParameters,
    ) -> Result<(), StreamError>;

    fn open_sink(&mut self, path: &Path) -> std::io::Result<()>;

    fn write_header(&mut self) -> std::io::Result<()>;

    /// Converts `src` into `dst`'s pixel format. Both share dimensions.
    fn convert(&mut self, src: &Picture, dst: &mut Picture) -> Result<(), StreamError>;

    /// Encodes one picture into `out`, returning the number of bytes
    /// produced. Zero means the encoder kept the frame for later.
    fn encode_frame(&mut self, picture: &Picture, out: &mut [u8]) -> Result<usize, StreamError>;

    /// Drains one frame the encoder is still holding. Zero once empty.
    fn flush_encoder(&mut self, out: &mut [u8]) -> Result<usize, StreamError>;

    /// Frames committed to the video stream so far.
    fn frames_emitted(&self) -> u64;

    /// Appends one encoded frame, or one raw picture, to the stream.
    fn write_frame(&mut self, stream_index: usize, payload: &[u8]) -> std::io::Result<()>;

    fn write_trailer(&mut self) -> std::io::Result<()>;

    fn close_codec(&mut self) -> Result<(), StreamError>;

    fn close_sink(&mut self) -> std::io::Result<()>;

    /// Frees the per-stream records and the container context.
    fn release_context(&mut self);
}
