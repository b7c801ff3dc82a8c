#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_backend;
#[cfg(feature = "ffmpeg")]
mod ffmpeg_mapping;
pub mod memory_backend;
pub mod pixel_convert;
pub mod raw_file_source;
pub mod test_pattern_source;
