use thiserror::Error;

pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors surfaced by the sink's public operations. Hardware trouble during
/// playback is recovered or logged internally and never reaches callers.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no audio device is open")]
    NotOpen,
    #[error("failed to open audio device '{device}': {reason}")]
    Open { device: String, reason: String },
}
