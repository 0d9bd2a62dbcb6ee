use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChatReelError, ChatReelResult};

pub const DEFAULT_WIDTH: u32 = 400;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_FONT_SIZE: f32 = 18.0;
pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_WRAP_WIDTH: usize = 30;
pub const DEFAULT_INDENT_WIDTH: usize = 4;

/// Output frame rate. One tick is one second of chat and one frame of video.
pub const FRAMES_PER_SECOND: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub fn rgba(self) -> [u8; 4] {
        [self.0[0], self.0[1], self.0[2], 255]
    }
}

impl FromStr for Rgb {
    type Err = ChatReelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let hex = raw.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(ChatReelError::config(format!(
                "invalid color '{raw}'. Hint: use #rrggbb, e.g. #d7d7d7"
            )));
        }
        let channel = |at: usize| {
            u8::from_str_radix(&hex[at..at + 2], 16)
                .map_err(|_| ChatReelError::config(format!("invalid color '{raw}'")))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl TryFrom<String> for Rgb {
    type Error = ChatReelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

/// Static rendering parameters shared by every frame of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub text_origin: (u32, u32),
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub text_color: Rgb,
    pub background_color: Rgb,
    /// Rows kept in the scroll buffer.
    pub capacity: usize,
    /// Characters per wrapped message line.
    pub wrap_width: usize,
    pub indent_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            text_origin: (5, 5),
            font_path: None,
            font_size: DEFAULT_FONT_SIZE,
            text_color: Rgb([215, 215, 215]),
            background_color: Rgb([25, 25, 25]),
            capacity: DEFAULT_CAPACITY,
            wrap_width: DEFAULT_WRAP_WIDTH,
            indent_width: DEFAULT_INDENT_WIDTH,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> ChatReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ChatReelError::config("frame width/height must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ChatReelError::config(
                "frame width/height must be even (required for yuv420p output)",
            ));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(ChatReelError::config("font size must be > 0"));
        }
        if self.capacity == 0 {
            return Err(ChatReelError::config("buffer capacity must be > 0"));
        }
        if self.wrap_width == 0 {
            return Err(ChatReelError::config("wrap width must be > 0"));
        }
        let font_path = self.font_path.as_deref().ok_or_else(|| {
            ChatReelError::config(
                "no font configured. Hint: pass --font <path.ttf> or set font_path in the config file",
            )
        })?;
        if !font_path.is_file() {
            return Err(ChatReelError::config(format!(
                "font file '{}' does not exist",
                font_path.display()
            )));
        }
        Ok(())
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

pub fn load_config(path: &Path) -> ChatReelResult<RenderConfig> {
    let raw = fs::read_to_string(path).map_err(|error| ChatReelError::resource(path, error))?;
    serde_yaml::from_str(&raw).map_err(|error| {
        ChatReelError::config(format!(
            "failed to parse config {}: {error}",
            path.display()
        ))
    })
}
