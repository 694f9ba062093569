/// Result alias that carries the custom [`PlayerError`] type.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Common error type for the core crate.
///
/// Configuration variants are raised synchronously while a player or figure is
/// being assembled. Empty packets and degenerate packet sequences are never
/// reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Resolution did not have exactly two elements.
    #[error("resolution must have exactly 2 elements, got {len}")]
    InvalidResolution { len: usize },
    #[error("resolution dimensions must be non-zero")]
    ZeroResolution,
    #[error("invalid view mode `{0}`, use '2d', '3d' or 'hybrid'")]
    UnknownViewMode(String),
    #[error("invalid player backend `{0}`, use 'raster' or 'html'")]
    UnknownBackend(String),
    #[error("unknown stream `{0}`, use 'events', 'frames', 'imus' or 'triggers'")]
    UnknownStream(String),
    #[error("unknown event mode `{0}`, use 'accumulate', 'polar' or 'monopolar'")]
    UnknownEventMode(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The subplot grid or a trace placement is inconsistent.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    /// Free-form message for failures without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl PlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns `true` for errors raised by configuration validation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidResolution { .. }
                | Self::ZeroResolution
                | Self::UnknownViewMode(_)
                | Self::UnknownBackend(_)
                | Self::UnknownStream(_)
                | Self::UnknownEventMode(_)
                | Self::InvalidConfig(_)
        )
    }
}

impl From<&str> for PlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
