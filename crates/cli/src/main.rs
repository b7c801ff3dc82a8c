use std::path::PathBuf;
use std::process;

use clap::Parser;

use stream_writer_core::pipeline::encode_frames_use_case::EncodeFramesUseCase;
use stream_writer_core::pipeline::pipeline_logger::LogPipelineLogger;
use stream_writer_core::shared::pixel_format::PixelLayout;
use stream_writer_core::shared::stream_config::StreamConfig;
use stream_writer_core::video::domain::frame_source::FrameSource;
use stream_writer_core::video::domain::media_backend::MediaBackend;
use stream_writer_core::video::domain::stream_writer::StreamWriter;
use stream_writer_core::video::infrastructure::ffmpeg_backend::FfmpegBackend;
use stream_writer_core::video::infrastructure::memory_backend::MemoryBackend;
use stream_writer_core::video::infrastructure::raw_file_source::RawFileSource;
use stream_writer_core::video::infrastructure::test_pattern_source::TestPatternSource;

/// Encodes raw frames into a single-stream video file.
#[derive(Parser)]
#[command(name = "stream-writer")]
struct Cli {
    /// Output file. Its container is taken from --format, or the default.
    output: PathBuf,

    /// Container short name (e.g. mpeg, mp4, avi, null).
    #[arg(long)]
    format: Option<String>,

    /// Target bit rate in bits per second.
    #[arg(long, default_value = "400000")]
    bitrate: u64,

    /// Frames per second.
    #[arg(long, default_value = "25")]
    fps: u32,

    /// Colour channels of the input: 1 for grayscale, 3 for RGB.
    #[arg(long, default_value = "3")]
    colours: u8,

    #[arg(long, default_value = "320")]
    width: u32,

    #[arg(long, default_value = "240")]
    height: u32,

    /// Raw frame file to encode. Without it a synthetic pattern is used.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Number of synthetic frames.
    #[arg(long, default_value = "100")]
    frames: usize,

    /// Encode into memory instead of ffmpeg; nothing is written to disk.
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = StreamConfig {
        filename: cli.output.clone(),
        format_hint: cli.format.clone(),
        layout: PixelLayout::from_colours(cli.colours),
        width: cli.width,
        height: cli.height,
        bit_rate: cli.bitrate,
        frame_rate: cli.fps,
    };

    let source: Box<dyn FrameSource> = match &cli.input {
        Some(path) => Box::new(RawFileSource::open(path, config.frame_len()?)?),
        None => Box::new(TestPatternSource::new(
            config.layout,
            config.width,
            config.height,
            cli.frames,
        )),
    };

    let backend: Box<dyn MediaBackend> = if cli.dry_run {
        Box::new(MemoryBackend::new())
    } else {
        Box::new(FfmpegBackend::new())
    };

    let mut writer = StreamWriter::open(config, backend)?;
    let mut use_case =
        EncodeFramesUseCase::new(source, Box::new(LogPipelineLogger::default()), None);
    let result = use_case.execute(&mut writer);
    let closed = writer.close();

    let summary = result?;
    closed?;

    println!(
        "Wrote {} frames ({:.2}s) to {}",
        summary.frames,
        summary.last_pts,
        cli.output.display()
    );
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(input) = &cli.input {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if cli.width == 0 || cli.height == 0 {
        return Err(format!(
            "Frame size must be non-zero, got {}x{}",
            cli.width, cli.height
        )
        .into());
    }
    if cli.fps == 0 {
        return Err("Frame rate must be at least 1".into());
    }
    if !matches!(cli.colours, 1 | 3) {
        return Err(format!("Colours must be 1 or 3, got {}", cli.colours).into());
    }
    Ok(())
}
