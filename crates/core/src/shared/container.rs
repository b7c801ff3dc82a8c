use std::path::{Path, PathBuf};

use crate::shared::codec::CodecId;

/// Capabilities of an output container, as reported by the media library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerFormat {
    pub name: String,
    /// `None` for containers that carry no video (audio-only or null).
    pub video_codec: Option<CodecId>,
    /// Data is not stored in a file this writer opens.
    pub no_file: bool,
    /// Frames are stored as raw pictures, bypassing the encoder.
    pub raw_picture: bool,
}

/// The container context record: the resolved format plus the output
/// filename it will be written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputContext {
    format: ContainerFormat,
    filename: PathBuf,
}

impl OutputContext {
    pub fn new(format: ContainerFormat, filename: &Path) -> Self {
        Self {
            format,
            filename: filename.to_path_buf(),
        }
    }

    pub fn format(&self) -> &ContainerFormat {
        &self.format
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }
}
