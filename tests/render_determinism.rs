mod common;

use chatreel::config::{RenderConfig, Rgb};
use chatreel::frame_renderer::{Frame, FrameRenderer, RenderFrame};
use chatreel::log_parser::{parse_timestamp, ChatRecord};
use chatreel::scroll_buffer::BufferRow;

fn row(speaker: &str, message: &str) -> BufferRow {
    let ts = parse_timestamp("2021-05-01 12:00:00").unwrap();
    BufferRow::Record(ChatRecord::new(ts, speaker, message).unwrap())
}

fn small_config() -> Option<RenderConfig> {
    let mut config = common::font_config()?;
    config.width = 240;
    config.height = 320;
    Some(config)
}

/// Lowest pixel row that differs from the background, if any.
fn lowest_ink_row(frame: &Frame, background: Rgb) -> Option<u32> {
    let bg = background.rgba();
    (0..frame.height)
        .rev()
        .find(|&y| (0..frame.width).any(|x| frame.pixel(x, y) != Some(bg)))
}

#[test]
fn identical_buffers_render_identical_bytes() {
    let Some(config) = small_config() else {
        eprintln!("skipping: no test font available (set CHATREEL_TEST_FONT)");
        return;
    };
    let rows = vec![
        BufferRow::Placeholder,
        row("alice", "hi there"),
        row("bob", "a somewhat longer message that needs wrapping"),
    ];

    let mut first = FrameRenderer::new(&config).unwrap();
    let mut second = FrameRenderer::new(&config).unwrap();
    let a = first.render(&rows);
    let b = second.render(&rows);
    let c = first.render(&rows);

    assert_eq!(a.sha256_hex(), b.sha256_hex());
    assert_eq!(a, c, "glyph cache must not change output");
    assert_eq!((a.width, a.height), (240, 320));
    assert_eq!(a.rgba.len(), 240 * 320 * 4);
}

#[test]
fn placeholder_rows_leave_only_background() {
    let Some(config) = small_config() else {
        eprintln!("skipping: no test font available (set CHATREEL_TEST_FONT)");
        return;
    };
    let mut renderer = FrameRenderer::new(&config).unwrap();
    let frame = renderer.render(&vec![BufferRow::Placeholder; 5]);
    assert_eq!(
        frame,
        Frame::solid(config.width, config.height, config.background_color.rgba())
    );
}

#[test]
fn text_is_painted_opaque_in_text_area() {
    let Some(config) = small_config() else {
        eprintln!("skipping: no test font available (set CHATREEL_TEST_FONT)");
        return;
    };
    let mut renderer = FrameRenderer::new(&config).unwrap();
    let frame = renderer.render(&[row("alice", "hello")]);

    let ink = lowest_ink_row(&frame, config.background_color).expect("text should paint");
    assert!(ink < config.text_origin.1 + renderer.line_height());
    assert!(frame.rgba.chunks_exact(4).all(|px| px[3] == 255));
    assert_eq!(frame.pixel(config.width - 1, config.height - 1), Some(config.background_color.rgba()));
}

#[test]
fn long_messages_wrap_onto_lower_lines() {
    let Some(config) = small_config() else {
        eprintln!("skipping: no test font available (set CHATREEL_TEST_FONT)");
        return;
    };
    let mut renderer = FrameRenderer::new(&config).unwrap();
    let short = renderer.render(&[row("alice", "short")]);
    let long = renderer.render(&[row(
        "alice",
        "this message is long enough to wrap across several lines of output",
    )]);

    let short_ink = lowest_ink_row(&short, config.background_color).unwrap();
    let long_ink = lowest_ink_row(&long, config.background_color).unwrap();
    assert!(
        long_ink >= short_ink + renderer.line_height(),
        "wrapped text should reach at least one line lower ({long_ink} vs {short_ink})"
    );
}

#[test]
fn overflowing_rows_run_off_canvas_without_error() {
    let Some(mut config) = small_config() else {
        eprintln!("skipping: no test font available (set CHATREEL_TEST_FONT)");
        return;
    };
    config.height = 60;
    let mut renderer = FrameRenderer::new(&config).unwrap();
    assert!(renderer.visible_rows() < 50);

    let rows = vec![row("spam", "word ".repeat(20).trim()); 50];
    let frame = renderer.render(&rows);
    assert_eq!((frame.width, frame.height), (config.width, 60));
    assert_eq!(frame.rgba.len(), config.frame_len());
}

#[test]
fn colors_follow_config() {
    let Some(mut config) = small_config() else {
        eprintln!("skipping: no test font available (set CHATREEL_TEST_FONT)");
        return;
    };
    config.background_color = Rgb([0, 0, 128]);
    let mut renderer = FrameRenderer::new(&config).unwrap();
    let frame = renderer.render(&[]);
    assert_eq!(frame.pixel(0, 0), Some([0, 0, 128, 255]));
}
