use crate::shared::codec::{self, CodecParameters};
use crate::shared::container::ContainerFormat;
use crate::shared::rational::Rational;
use crate::shared::stream_config::StreamConfig;

/// Derives the video stream's codec parameters, or `None` when the
/// container carries no video.
pub fn configure(format: &ContainerFormat, config: &StreamConfig) -> Option<CodecParameters> {
    let Some(codec_id) = format.video_codec else {
        log::debug!("container {} has no video codec; no stream created", format.name);
        return None;
    };

    let frame_rate = Rational::new(config.frame_rate.min(i32::MAX as u32) as i32, 1);
    Some(CodecParameters {
        codec_id,
        bit_rate: config.bit_rate,
        width: config.width,
        height: config.height,
        frame_rate,
        time_base: frame_rate.invert(),
        gop_size: codec::gop_size(),
        max_b_frames: codec::max_b_frames(codec_id),
    })
}
