#![allow(dead_code)]

use std::env;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use chatreel::config::RenderConfig;

const FONT_CANDIDATES: [&str; 7] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A real font for pixel tests: `CHATREEL_TEST_FONT`, else a common system font.
pub fn test_font() -> Option<PathBuf> {
    if let Ok(raw) = env::var("CHATREEL_TEST_FONT") {
        let path = PathBuf::from(raw);
        if path.is_file() {
            return Some(path);
        }
    }
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

pub fn font_config() -> Option<RenderConfig> {
    let font = test_font()?;
    Some(RenderConfig {
        font_path: Some(font),
        ..RenderConfig::default()
    })
}

pub fn command_available(name: &str, version_arg: &str) -> bool {
    Command::new(name)
        .arg(version_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
