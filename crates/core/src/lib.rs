//! Single-stream video writer: resolves a container, negotiates an encoder
//! and appends raw frames until closed.

pub mod shared {
    pub mod codec;
    pub mod constants;
    pub mod container;
    pub mod error;
    pub mod init_guard;
    pub mod picture;
    pub mod pixel_format;
    pub mod rational;
    pub mod stream_clock;
    pub mod stream_config;
}

pub mod video {
    pub mod domain {
        pub mod codec_configurator;
        pub mod format_resolver;
        pub mod frame_buffers;
        pub mod frame_source;
        pub mod media_backend;
        pub mod parameter_finalizer;
        pub mod stream_writer;
    }

    pub mod infrastructure;
}

pub mod pipeline {
    pub mod encode_frames_use_case;
    pub mod pipeline_logger;
}
