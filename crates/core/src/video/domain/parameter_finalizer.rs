use crate::shared::codec::CodecParameters;
use crate::shared::container::OutputContext;
use crate::shared::error::StreamError;
use crate::video::domain::media_backend::MediaBackend;

/// Validates the accumulated parameters and commits them to the backend in
/// one step. Returns the index of the video stream, if one was created.
pub fn finalize(
    backend: &mut dyn MediaBackend,
    output: &OutputContext,
    stream: Option<&CodecParameters>,
) -> Result<Option<usize>, StreamError> {
    if let Some(params) = stream {
        validate(params)?;
    }
    let index = backend.set_parameters(output, stream)?;
    if stream.is_some() && index.is_none() {
        return Err(StreamError::Config(format!(
            "{} did not create a video stream",
            output.format().name
        )));
    }
    Ok(index)
}

fn validate(params: &CodecParameters) -> Result<(), StreamError> {
    if params.width == 0 || params.height == 0 {
        return Err(StreamError::Config(format!(
            "invalid output format parameters: {}x{} frame",
            params.width, params.height
        )));
    }
    if params.frame_rate.num <= 0 || params.time_base.den <= 0 {
        return Err(StreamError::Config(format!(
            "invalid output format parameters: frame rate {}",
            params.frame_rate
        )));
    }
    if params.width % 2 != 0 || params.height % 2 != 0 {
        log::warn!(
            "{}x{} is not a multiple of two; some codecs will reject it",
            params.width,
            params.height
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::codec::CodecId;
    use crate::shared::rational::Rational;
    use crate::video::infrastructure::memory_backend::MemoryBackend;
    use rstest::rstest;
    use std::path::Path;

    fn params(width: u32, height: u32, fps: i32) -> CodecParameters {
        CodecParameters {
            codec_id: CodecId::Mpeg1Video,
            bit_rate: 400_000,
            width,
            height,
            frame_rate: Rational::new(fps, 1),
            time_base: Rational::new(1, fps),
            gop_size: 30,
            max_b_frames: 2,
        }
    }

    fn output(backend: &MemoryBackend, name: &str) -> OutputContext {
        OutputContext::new(backend.guess_format(name).unwrap(), Path::new("out.mpg"))
    }

    #[test]
    fn test_commit_creates_stream() {
        let mut backend = MemoryBackend::new();
        let container = backend.container();
        let out = output(&backend, "mpeg");
        let index = finalize(&mut backend, &out, Some(&params(320, 240, 25))).unwrap();
        assert_eq!(index, Some(0));
        assert_eq!(container.lock().unwrap().streams.len(), 1);
    }

    #[test]
    fn test_commit_without_stream() {
        let mut backend = MemoryBackend::new();
        let out = output(&backend, "wav");
        assert_eq!(finalize(&mut backend, &out, None).unwrap(), None);
    }

    #[rstest]
    #[case::zero_width(params(0, 240, 25))]
    #[case::zero_height(params(320, 0, 25))]
    #[case::zero_fps(params(320, 240, 0))]
    fn test_rejects_invalid_parameters(#[case] p: CodecParameters) {
        let mut backend = MemoryBackend::new();
        let container = backend.container();
        let out = output(&backend, "mpeg");
        let err = finalize(&mut backend, &out, Some(&p)).unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
        assert!(container.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn test_odd_dimensions_are_allowed() {
        let mut backend = MemoryBackend::new();
        let out = output(&backend, "mpeg");
        assert!(finalize(&mut backend, &out, Some(&params(321, 241, 25))).is_ok());
    }

    #[test]
    fn test_backend_rejection_is_config_error() {
        let mut backend = MemoryBackend::new().reject_parameters();
        let out = output(&backend, "mpeg");
        let err = finalize(&mut backend, &out, Some(&params(320, 240, 25))).unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }
}
