/// Container used when the requested format hint cannot be resolved.
pub const DEFAULT_FORMAT: &str = "mpeg";

/// Capacity of the scratch buffer holding one encoded frame.
pub const OUTPUT_BUFFER_CAPACITY: usize = 200_000;

/// Keyframe interval applied to every stream.
pub const FIXED_GOP_SIZE: u32 = 30;

pub const MIN_GOP_SIZE: u32 = 3;

/// B-frames enabled for MPEG-1/MPEG-2 video only.
pub const LEGACY_MPEG_B_FRAMES: u32 = 2;
