use thiserror::Error;

/// Every way the stream writer can fail.
///
/// None of these are retried internally; the caller decides whether to
/// abort, restart the writer, or give up on the output file.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("allocation failed: {0}")]
    Allocation(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encode error: {0}")]
    Encode(String),
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
}

impl StreamError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_io_error_keeps_source() {
        let err = StreamError::io(
            "error while writing video frame",
            std::io::Error::other("disk full"),
        );
        assert_eq!(err.to_string(), "error while writing video frame: disk full");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_frame_size_message() {
        let err = StreamError::FrameSize {
            expected: 12,
            actual: 10,
        };
        assert_eq!(err.to_string(), "frame buffer holds 10 bytes, expected 12");
    }
}
