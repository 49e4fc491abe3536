/// Result alias that carries the custom [`MusicVizError`] type.
pub type Result<T> = std::result::Result<T, MusicVizError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MusicVizError {
    /// Free-form failure that does not warrant its own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Config or display-list (de)serialisation failed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// The analysis transform rejected its buffers.
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
    /// Microphone permission was denied or no capture device exists. The
    /// engine keeps whatever source it had before the request.
    #[error("audio acquisition failed: {0}")]
    Acquisition(String),
    /// The graphics context backing a 3D mode went away.
    #[error("rendering surface lost")]
    SurfaceLost,
    /// A GPU handle was used after it had been released.
    #[error("unknown gpu resource `{0}`")]
    UnknownResource(String),
    /// Caller-supplied data that a device or buffer cannot accept.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A mode name that does not parse, or a mode missing from the registry.
    #[error("unknown render mode `{0}`")]
    UnknownMode(String),
}

impl MusicVizError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}
