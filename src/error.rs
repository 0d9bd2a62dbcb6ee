use std::path::PathBuf;

pub type ChatReelResult<T> = Result<T, ChatReelError>;

#[derive(thiserror::Error, Debug)]
pub enum ChatReelError {
    #[error("config error: {0}")]
    Config(String),

    #[error(
        "frame size mismatch: got {width}x{height}, encoder expects {expected_width}x{expected_height}"
    )]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("resource error: {}: {source}", path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("font error: {0}")]
    Font(String),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("records are not chronological: record {index} is older than the one before it")]
    UnorderedInput { index: usize },
}

impl ChatReelError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font(msg.into())
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    pub fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Resource {
            path: path.into(),
            source,
        }
    }

    /// Errors raised before any frame is produced.
    pub fn is_pre_pipeline(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnorderedInput { .. })
    }
}
