use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chatreel::config::{load_config, RenderConfig, Rgb};
use chatreel::encoding::is_ffmpeg_on_path;
use chatreel::log_parser::{parse_timestamp, read_transcript, ChatRecord, TIMESTAMP_FORMAT};
use chatreel::log_sources::load_range;
use chatreel::pipeline::{render_chat_video, render_frame_at, resolve_timeline};
use chatreel::timeline::{ensure_chronological, Timeline};

#[derive(Debug, Parser)]
#[command(name = "chatreel")]
#[command(about = "Replay a timestamped chat log as a scrolling 1 fps video")]
#[command(version = version_string())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render the whole timeline to a video (requires `ffmpeg` on PATH).
    Render {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        style: StyleArgs,
        #[arg(short = 'o', long = "output", default_value = "output.mp4")]
        output: PathBuf,
        /// Print the render summary as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Render the frame shown at one tick to a PNG.
    Frame {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        style: StyleArgs,
        /// Zero-based tick (seconds from the timeline start).
        #[arg(long, default_value_t = 0)]
        tick: u64,
        #[arg(short = 'o', long = "output", default_value = "frame.png")]
        output: PathBuf,
    },
    /// Parse the input and report what would be rendered.
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// A single transcript file.
    #[arg(short = 'i', long, conflicts_with = "log_dir", required_unless_present = "log_dir")]
    input: Option<PathBuf>,
    /// Directory of dated `YYYY-MM-DD.txt` transcripts; needs --start and --end.
    #[arg(long, requires_all = ["start", "end"])]
    log_dir: Option<PathBuf>,
    /// Timeline start, `YYYY-MM-DD HH:MM:SS` (inclusive).
    #[arg(long, value_parser = parse_cli_timestamp, requires = "end")]
    start: Option<NaiveDateTime>,
    /// Timeline end, `YYYY-MM-DD HH:MM:SS` (exclusive).
    #[arg(long, value_parser = parse_cli_timestamp, requires = "start")]
    end: Option<NaiveDateTime>,
}

#[derive(Debug, Args)]
struct StyleArgs {
    /// YAML file with render settings; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// TrueType/OpenType font used for all text.
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    font_size: Option<f32>,
    #[arg(long, value_parser = parse_cli_color)]
    text_color: Option<Rgb>,
    #[arg(long, value_parser = parse_cli_color)]
    background_color: Option<Rgb>,
    /// Rows kept on screen.
    #[arg(long)]
    capacity: Option<usize>,
    #[arg(long)]
    wrap_width: Option<usize>,
}

fn version_string() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| match option_env!("CHATREEL_GIT_HASH") {
        Some(hash) => format!("{} ({hash})", env!("CARGO_PKG_VERSION")),
        None => env!("CARGO_PKG_VERSION").to_owned(),
    })
}

fn parse_cli_timestamp(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_timestamp(raw).ok_or_else(|| format!("expected {TIMESTAMP_FORMAT}, got '{raw}'"))
}

fn parse_cli_color(raw: &str) -> std::result::Result<Rgb, String> {
    raw.parse::<Rgb>().map_err(|error| error.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Render {
            source,
            style,
            output,
            json,
        } => run_render(&source, &style, &output, json),
        Commands::Frame {
            source,
            style,
            tick,
            output,
        } => run_frame(&source, &style, tick, &output),
        Commands::Check { source } => run_check(&source),
    }
}

fn load_records(source: &SourceArgs) -> Result<(Vec<ChatRecord>, Option<Timeline>)> {
    let range = match (source.start, source.end) {
        (Some(start), Some(end)) => Some(Timeline::new(start, end)?),
        (None, None) => None,
        _ => bail!("--start and --end must be given together"),
    };

    let records = match (&source.input, &source.log_dir) {
        (Some(input), _) => read_transcript(input)
            .with_context(|| format!("failed to load transcript {}", input.display()))?,
        (None, Some(dir)) => {
            let Some(range) = range else {
                bail!("--log-dir needs --start and --end");
            };
            load_range(dir, range.start(), range.end())
                .with_context(|| format!("failed to load logs from {}", dir.display()))?
        }
        (None, None) => bail!("pass --input <file> or --log-dir <dir>"),
    };
    Ok((records, range))
}

fn resolve_config(style: &StyleArgs) -> Result<RenderConfig> {
    let mut config = match &style.config {
        Some(path) => load_config(path)?,
        None => RenderConfig::default(),
    };
    if let Some(font) = &style.font {
        config.font_path = Some(font.clone());
    }
    if let Some(width) = style.width {
        config.width = width;
    }
    if let Some(height) = style.height {
        config.height = height;
    }
    if let Some(font_size) = style.font_size {
        config.font_size = font_size;
    }
    if let Some(color) = style.text_color {
        config.text_color = color;
    }
    if let Some(color) = style.background_color {
        config.background_color = color;
    }
    if let Some(capacity) = style.capacity {
        config.capacity = capacity;
    }
    if let Some(wrap_width) = style.wrap_width {
        config.wrap_width = wrap_width;
    }
    config.validate()?;
    Ok(config)
}

fn run_render(source: &SourceArgs, style: &StyleArgs, output: &Path, json: bool) -> Result<()> {
    let config = resolve_config(style)?;
    let (records, range) = load_records(source)?;
    let summary = match render_chat_video(&records, range, &config, output) {
        Ok(summary) => summary,
        Err(error) if !error.is_pre_pipeline() && output.exists() => {
            return Err(anyhow::Error::new(error).context(format!(
                "render stopped early; partial video left at {}",
                output.display()
            )));
        }
        Err(error) => {
            return Err(anyhow::Error::new(error)
                .context(format!("failed to render {}", output.display())));
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Wrote {} ({} frames, {}x{} @ {} fps)",
            summary.output, summary.frames, summary.width, summary.height, summary.fps
        );
    }
    Ok(())
}

fn run_frame(source: &SourceArgs, style: &StyleArgs, tick: u64, output: &Path) -> Result<()> {
    let config = resolve_config(style)?;
    let (records, range) = load_records(source)?;
    let (instant, frame) = render_frame_at(&records, range, &config, tick)?;

    let digest = frame.sha256_hex();
    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.rgba)
        .context("rendered frame does not match its declared size")?;
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Wrote {} (tick {tick} at {}, sha256={digest})",
        output.display(),
        instant.format(TIMESTAMP_FORMAT)
    );
    Ok(())
}

fn run_check(source: &SourceArgs) -> Result<()> {
    let (records, range) = load_records(source)?;
    ensure_chronological(&records)?;
    let timeline = resolve_timeline(&records, range)?;

    println!(
        "OK: {} records, {} ticks [{}, {})",
        timeline.filter(&records).count(),
        timeline.tick_count(),
        timeline.start().format(TIMESTAMP_FORMAT),
        timeline.end().format(TIMESTAMP_FORMAT)
    );
    if !is_ffmpeg_on_path() {
        println!("note: ffmpeg not found on PATH; `render` will fail until it is installed");
    }
    Ok(())
}
