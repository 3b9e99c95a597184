//! Gapless ALSA output sink.
//!
//! Decoded audio goes into a ring buffer and a pump thread feeds it to the
//! device. Closing a finished track is deferred until its tail has played
//! out, so the next track of the same format continues on the same device
//! without a gap.

pub mod config;
pub mod error;
pub mod format;
pub mod mixer;
pub mod pcm;
mod pump;
mod ring;
pub mod sink;

pub use config::SinkOptions;
pub use error::{Result, SinkError};
pub use format::{SampleFormat, StreamConfig};
pub use mixer::MixerCtl;
pub use pcm::PcmDevice;
pub use sink::{GaplessSink, SinkBackend};

#[cfg(target_os = "linux")]
pub use mixer::AlsaMixer;
#[cfg(target_os = "linux")]
pub use pcm::{AlsaBackend, AlsaPcm, AlsaSink};
