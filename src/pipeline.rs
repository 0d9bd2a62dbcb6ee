use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::{RenderConfig, FRAMES_PER_SECOND};
use crate::encoding::{FrameSink, VideoEncoder};
use crate::error::{ChatReelError, ChatReelResult};
use crate::frame_renderer::{Frame, FrameRenderer, RenderFrame};
use crate::log_parser::{ChatRecord, TIMESTAMP_FORMAT};
use crate::scroll_buffer::{BufferRow, ScrollBuffer};
use crate::timeline::{ensure_chronological, Timeline};

const PROGRESS_EVERY_TICKS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderSummary {
    pub output: String,
    pub frames: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub start: String,
    pub end: String,
    pub records: usize,
}

/// The explicit range when given, otherwise `[min, max)` of the records.
pub fn resolve_timeline(records: &[ChatRecord], range: Option<Timeline>) -> ChatReelResult<Timeline> {
    match range {
        Some(timeline) => Ok(timeline),
        None => Timeline::spanning(records)
            .ok_or_else(|| ChatReelError::config("no chat records to render")),
    }
}

/// Renders and appends one frame per tick, in tick order. The scroll buffer
/// starts full of placeholders and carries over between ticks.
pub fn render_ticks<R, S>(
    timeline: Timeline,
    records: &[ChatRecord],
    capacity: usize,
    renderer: &mut R,
    encoder: &mut VideoEncoder<S>,
) -> ChatReelResult<u64>
where
    R: RenderFrame,
    S: FrameSink,
{
    let total = timeline.tick_count();
    let mut buffer = ScrollBuffer::seeded(capacity);

    for (index, (tick, incoming)) in timeline.windows(records).enumerate() {
        buffer.push_tick(incoming);
        let frame = renderer.render(buffer.rows());
        encoder.append_frame(&frame)?;

        if index % PROGRESS_EVERY_TICKS == 0 {
            tracing::debug!(%tick, frame = index + 1, total, "rendered frame");
        }
    }
    Ok(encoder.frames_written())
}

/// [`render_ticks`] followed by finalize, which also runs when rendering
/// fails part way. The rendering error wins over a finalize error, except that
/// an encoder write failure also carries the diagnostic reported on close.
pub fn encode_timeline<R, S>(
    timeline: Timeline,
    records: &[ChatRecord],
    capacity: usize,
    renderer: &mut R,
    mut encoder: VideoEncoder<S>,
) -> ChatReelResult<u64>
where
    R: RenderFrame,
    S: FrameSink,
{
    let rendered = match check_frame_sizes(renderer, &encoder) {
        Ok(()) => render_ticks(timeline, records, capacity, renderer, &mut encoder),
        Err(error) => Err(error),
    };
    let finalized = encoder.finalize();
    match (rendered, finalized) {
        (Ok(_), finalized) => finalized,
        (Err(error), Ok(frames)) => {
            tracing::warn!(frames, "stopped early; partial output finalized");
            Err(error)
        }
        (Err(ChatReelError::Encoder(write)), Err(ChatReelError::Encoder(close))) if write != close => {
            Err(ChatReelError::Encoder(format!("{write}; on close: {close}")))
        }
        (Err(error), Err(finalize_error)) => {
            tracing::warn!(%finalize_error, "stopped early and could not finalize output");
            Err(error)
        }
    }
}

fn check_frame_sizes<R: RenderFrame, S: FrameSink>(
    renderer: &R,
    encoder: &VideoEncoder<S>,
) -> ChatReelResult<()> {
    let (width, height) = renderer.frame_size();
    let (expected_width, expected_height) = encoder.frame_size();
    if (width, height) != (expected_width, expected_height) {
        return Err(ChatReelError::config(format!(
            "renderer draws {width}x{height} frames but the encoder was opened for \
             {expected_width}x{expected_height}"
        )));
    }
    Ok(())
}

/// Buffer contents shown on tick `index`, replaying every earlier tick.
pub fn snapshot_at(
    timeline: Timeline,
    records: &[ChatRecord],
    capacity: usize,
    index: u64,
) -> ChatReelResult<Vec<BufferRow>> {
    if index >= timeline.tick_count() {
        return Err(ChatReelError::config(format!(
            "tick {index} is outside the timeline ({} ticks)",
            timeline.tick_count()
        )));
    }
    let mut buffer = ScrollBuffer::seeded(capacity);
    let upto = usize::try_from(index)
        .map_err(|_| ChatReelError::config(format!("tick {index} is too large")))?;
    for (_, incoming) in timeline.windows(records).take(upto + 1) {
        buffer.push_tick(incoming);
    }
    Ok(buffer.rows().to_vec())
}

fn prepare(
    records: &[ChatRecord],
    range: Option<Timeline>,
    config: &RenderConfig,
) -> ChatReelResult<Timeline> {
    config.validate()?;
    ensure_chronological(records)?;
    let timeline = resolve_timeline(records, range)?;
    if timeline.is_empty() {
        return Err(ChatReelError::config(format!(
            "timeline [{}, {}) has no ticks; start must be before end",
            timeline.start(),
            timeline.end()
        )));
    }
    Ok(timeline)
}

fn open_renderer(config: &RenderConfig) -> ChatReelResult<FrameRenderer> {
    let renderer = FrameRenderer::new(config)?;
    if config.capacity > renderer.visible_rows() {
        tracing::warn!(
            capacity = config.capacity,
            visible_rows = renderer.visible_rows(),
            "buffer holds more rows than fit on the canvas; the newest lines run off the bottom"
        );
    }
    Ok(renderer)
}

/// Parsed records → video file at `output`, one frame per second of chat.
#[tracing::instrument(skip_all, fields(output = %output.display()))]
pub fn render_chat_video(
    records: &[ChatRecord],
    range: Option<Timeline>,
    config: &RenderConfig,
    output: &Path,
) -> ChatReelResult<RenderSummary> {
    let timeline = prepare(records, range, config)?;
    let mut renderer = open_renderer(config)?;
    let encoder = VideoEncoder::open(output, config.width, config.height)?;

    tracing::info!(
        start = %timeline.start(),
        end = %timeline.end(),
        ticks = timeline.tick_count(),
        "rendering chat video"
    );
    let frames = encode_timeline(timeline, records, config.capacity, &mut renderer, encoder)?;
    tracing::info!(frames, "wrote video");

    Ok(RenderSummary {
        output: output.display().to_string(),
        frames,
        fps: FRAMES_PER_SECOND,
        width: config.width,
        height: config.height,
        start: timeline.start().format(TIMESTAMP_FORMAT).to_string(),
        end: timeline.end().format(TIMESTAMP_FORMAT).to_string(),
        records: timeline.filter(records).count(),
    })
}

/// The frame a video would show at tick `index`, without encoding anything.
pub fn render_frame_at(
    records: &[ChatRecord],
    range: Option<Timeline>,
    config: &RenderConfig,
    index: u64,
) -> ChatReelResult<(NaiveDateTime, Frame)> {
    let timeline = prepare(records, range, config)?;
    let rows = snapshot_at(timeline, records, config.capacity, index)?;
    let tick = timeline
        .tick(index)
        .ok_or_else(|| ChatReelError::config(format!("tick {index} is outside the timeline")))?;
    let mut renderer = open_renderer(config)?;
    Ok((tick, renderer.render(&rows)))
}
