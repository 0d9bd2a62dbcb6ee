//! Replays a timestamped chat transcript as a fixed 1 fps video.
//!
//! Records flow one tick at a time through parse → window → scroll buffer →
//! render → encode. See [`pipeline::render_chat_video`] for the whole run.

pub mod config;
pub mod encoding;
pub mod error;
pub mod frame_renderer;
pub mod log_parser;
pub mod log_sources;
pub mod pipeline;
pub mod scroll_buffer;
pub mod timeline;

pub use config::{load_config, RenderConfig, Rgb, FRAMES_PER_SECOND};
pub use encoding::{FfmpegSink, FrameSink, VideoEncoder};
pub use error::{ChatReelError, ChatReelResult};
pub use frame_renderer::{compose_lines, wrap_words, Frame, FrameRenderer, RenderFrame};
pub use log_parser::{parse_line, parse_transcript, read_transcript, ChatRecord, LineSkip};
pub use pipeline::{render_chat_video, render_frame_at, RenderSummary};
pub use scroll_buffer::{advance, BufferRow, ScrollBuffer};
pub use timeline::{records_at, Timeline};
