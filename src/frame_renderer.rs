use std::collections::HashMap;
use std::fs;
use std::ops::Range;

use fontdue::layout::{CoordinateSystem, GlyphRasterConfig, Layout, LayoutSettings, TextStyle};
use fontdue::Font;
use sha2::{Digest, Sha256};
use tiny_skia::{Color, Pixmap};

use crate::config::RenderConfig;
use crate::error::{ChatReelError, ChatReelResult};
use crate::scroll_buffer::BufferRow;

/// Extra pixels between lines on top of the font's own line advance.
const LINE_SPACING: f32 = 4.0;

/// One rendered RGBA frame, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgba: color.repeat(pixels),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize * self.width as usize) + x as usize) * 4;
        self.rgba
            .get(idx..idx + 4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }

    pub fn sha256_hex(&self) -> String {
        let digest = Sha256::digest(&self.rgba);
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

/// Anything that turns a buffer snapshot into a frame of a fixed size.
pub trait RenderFrame {
    fn frame_size(&self) -> (u32, u32);
    fn render(&mut self, rows: &[BufferRow]) -> Frame;
}

/// Greedy word wrap on whitespace. Words longer than `width` characters are
/// split across lines. Blank input wraps to no lines at all.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word = word;
        loop {
            let word_len = word.chars().count();
            let needed = if current_len == 0 {
                word_len
            } else {
                current_len + 1 + word_len
            };

            if needed <= width {
                if current_len > 0 {
                    current.push(' ');
                    current_len += 1;
                }
                current.push_str(word);
                current_len += word_len;
                break;
            }

            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }

            let split = word
                .char_indices()
                .nth(width)
                .map(|(idx, _)| idx)
                .unwrap_or(word.len());
            lines.push(word[..split].to_owned());
            word = &word[split..];
        }
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Visual lines for a buffer snapshot: `speaker: message`, message wrapped,
/// continuation lines indented, one blank line per placeholder.
pub fn compose_lines(rows: &[BufferRow], wrap_width: usize, indent_width: usize) -> Vec<String> {
    let indent = " ".repeat(indent_width);
    let mut lines = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(record) = row.record() else {
            lines.push(String::new());
            continue;
        };

        let mut wrapped = wrap_words(record.message(), wrap_width).into_iter();
        let first = wrapped.next().unwrap_or_default();
        lines.push(format!("{}: {}", record.speaker(), first));
        lines.extend(wrapped.map(|line| format!("{indent}{line}")));
    }
    lines
}

#[derive(Debug, Clone)]
struct GlyphBitmap {
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

struct TextPainter {
    font: Font,
    font_size: f32,
    layout: Layout,
    glyph_cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl TextPainter {
    fn new(font_bytes: Vec<u8>, font_size: f32) -> ChatReelResult<Self> {
        let font = Font::from_bytes(font_bytes, fontdue::FontSettings::default())
            .map_err(|error| ChatReelError::font(format!("failed to parse font: {error}")))?;
        Ok(Self {
            font,
            font_size,
            layout: Layout::new(CoordinateSystem::PositiveYDown),
            glyph_cache: HashMap::new(),
        })
    }

    fn line_height(&self) -> u32 {
        let advance = self
            .font
            .horizontal_line_metrics(self.font_size)
            .map(|metrics| metrics.new_line_size)
            .unwrap_or(self.font_size * 1.2);
        (advance + LINE_SPACING).ceil().max(1.0) as u32
    }

    fn draw_line(
        &mut self,
        frame: &mut [u8],
        width: u32,
        height: u32,
        x: u32,
        y: u32,
        text: &str,
        ink: [u8; 3],
    ) {
        if text.is_empty() {
            return;
        }
        self.layout.reset(&LayoutSettings {
            x: x as f32,
            y: y as f32,
            max_width: None,
            max_height: None,
            horizontal_align: fontdue::layout::HorizontalAlign::Left,
            vertical_align: fontdue::layout::VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: fontdue::layout::WrapStyle::Letter,
            wrap_hard_breaks: true,
        });
        self.layout
            .append(&[&self.font], &TextStyle::new(text, self.font_size, 0));

        for glyph in self.layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let font = &self.font;
            let glyph_bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (_, bitmap) = font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    bitmap,
                }
            });

            blend_glyph(
                frame,
                width,
                height,
                glyph.x.round() as i32,
                glyph.y.round() as i32,
                glyph_bitmap,
                ink,
            );
        }
    }
}

/// Paints buffer snapshots with a fontdue font onto a solid background.
///
/// Lines that fall below the canvas are laid out but not painted; the
/// renderer never trims the row budget itself.
pub struct FrameRenderer {
    painter: TextPainter,
    background: Pixmap,
    width: u32,
    height: u32,
    origin: (u32, u32),
    text_color: [u8; 3],
    wrap_width: usize,
    indent_width: usize,
}

impl FrameRenderer {
    pub fn new(config: &RenderConfig) -> ChatReelResult<Self> {
        let font_path = config
            .font_path
            .as_deref()
            .ok_or_else(|| ChatReelError::config("no font configured"))?;
        let bytes = fs::read(font_path).map_err(|error| ChatReelError::resource(font_path, error))?;
        Self::from_font_bytes(bytes, config)
    }

    pub fn from_font_bytes(font_bytes: Vec<u8>, config: &RenderConfig) -> ChatReelResult<Self> {
        let painter = TextPainter::new(font_bytes, config.font_size)?;
        let mut background = Pixmap::new(config.width, config.height).ok_or_else(|| {
            ChatReelError::config(format!(
                "cannot allocate a {}x{} canvas",
                config.width, config.height
            ))
        })?;
        let [r, g, b] = config.background_color.0;
        background.fill(Color::from_rgba8(r, g, b, 255));

        Ok(Self {
            painter,
            background,
            width: config.width,
            height: config.height,
            origin: config.text_origin,
            text_color: config.text_color.0,
            wrap_width: config.wrap_width,
            indent_width: config.indent_width,
        })
    }

    pub fn line_height(&self) -> u32 {
        self.painter.line_height()
    }

    /// Lines that fit between the text origin and the bottom edge.
    pub fn visible_rows(&self) -> usize {
        (self.height.saturating_sub(self.origin.1) / self.line_height()) as usize
    }

    pub fn render_lines(&mut self, lines: &[String]) -> Frame {
        let mut canvas = self.background.clone();
        let line_height = self.line_height();
        let (x, top) = self.origin;

        for (row_idx, line) in lines.iter().enumerate() {
            let y = u64::from(top) + row_idx as u64 * u64::from(line_height);
            if y >= u64::from(self.height) {
                break;
            }
            self.painter.draw_line(
                canvas.data_mut(),
                self.width,
                self.height,
                x,
                y as u32,
                line,
                self.text_color,
            );
        }

        Frame {
            width: self.width,
            height: self.height,
            rgba: canvas.take(),
        }
    }
}

impl RenderFrame for FrameRenderer {
    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, rows: &[BufferRow]) -> Frame {
        let lines = compose_lines(rows, self.wrap_width, self.indent_width);
        self.render_lines(&lines)
    }
}

/// Coverage-weighted blend of one glyph over an opaque canvas. Parts of the
/// glyph outside the canvas are skipped.
fn blend_glyph(
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    x: i32,
    y: i32,
    glyph: &GlyphBitmap,
    ink: [u8; 3],
) {
    let cols = clip_span(x, glyph.width, canvas_width);
    for row in clip_span(y, glyph.height, canvas_height) {
        let canvas_row = (i64::from(y) + row as i64) as usize * canvas_width as usize;
        let coverage_row = &glyph.bitmap[row * glyph.width..(row + 1) * glyph.width];
        for col in cols.clone() {
            let coverage = coverage_row[col];
            if coverage == 0 {
                continue;
            }
            let canvas_col = (i64::from(x) + col as i64) as usize;
            let offset = (canvas_row + canvas_col) * 4;
            mix_coverage(&mut canvas[offset..offset + 4], ink, coverage);
        }
    }
}

/// Glyph-local indices `0..len` that land inside `0..limit` when the glyph
/// starts at `origin`.
fn clip_span(origin: i32, len: usize, limit: u32) -> Range<usize> {
    let len = len as i64;
    let start = (-i64::from(origin)).clamp(0, len);
    let end = (i64::from(limit) - i64::from(origin)).clamp(0, len);
    start as usize..end.max(start) as usize
}

fn mix_coverage(pixel: &mut [u8], ink: [u8; 3], coverage: u8) {
    let cover = u16::from(coverage);
    let rest = 255 - cover;
    for (dst, src) in pixel.iter_mut().zip(ink) {
        *dst = ((u16::from(src) * cover + u16::from(*dst) * rest + 127) / 255) as u8;
    }
    pixel[3] = 255;
}
