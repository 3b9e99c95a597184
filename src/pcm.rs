#[cfg(target_os = "linux")]
use crate::config::SinkOptions;
#[cfg(target_os = "linux")]
use crate::format::StreamConfig;
#[cfg(target_os = "linux")]
use crate::mixer::AlsaMixer;
#[cfg(target_os = "linux")]
use crate::sink::{GaplessSink, SinkBackend};
#[cfg(target_os = "linux")]
use alsa::pcm::{Access, Frames, HwParams, PCM};
#[cfg(target_os = "linux")]
use alsa::{Direction, ValueOr};
#[cfg(target_os = "linux")]
use tracing::{debug, error};

/// Playback device as the sink sees it. All quantities are bytes at the
/// negotiated stream configuration.
pub trait PcmDevice {
    /// Bytes the device can accept right now without blocking.
    fn avail_bytes(&self) -> Result<usize, String>;
    /// Bytes submitted but not yet audible.
    fn delay_bytes(&self) -> Result<usize, String>;
    /// Writes as much of `data` as the device takes, attempting driver
    /// recovery on transient errors. Returns the bytes accepted; the caller
    /// keeps whatever was not.
    fn write_bytes(&self, data: &[u8]) -> usize;
    /// Pauses or resumes the stream.
    fn pause(&self, paused: bool) -> Result<(), String>;
    /// Returns the device to a writable state.
    fn prepare(&self) -> Result<(), String>;
    /// Discards frames already queued in the device.
    fn drop_queued(&self) -> Result<(), String>;
}

#[cfg(target_os = "linux")]
pub struct AlsaPcm {
    pcm: PCM,
    frame_bytes: usize,
    can_pause: bool,
}

#[cfg(target_os = "linux")]
impl AlsaPcm {
    pub fn open(options: &SinkOptions, config: &StreamConfig) -> Result<Self, String> {
        let device = options.pcm_device.as_str();
        debug!(
            "opening PCM device '{}' for {:?}, {} Hz, {} channels",
            device, config.format, config.rate, config.channels
        );
        let pcm = PCM::new(device, Direction::Playback, false)
            .map_err(|e| format!("snd_pcm_open '{device}' failed: {e}"))?;
        let can_pause = negotiate(&pcm, config, options.small_buffer_ms)?;
        Ok(Self {
            pcm,
            frame_bytes: config.frame_bytes(),
            can_pause,
        })
    }
}

/// Applies hardware and software parameters. Any failure drops `pcm` in the
/// caller, closing the partially configured handle.
#[cfg(target_os = "linux")]
fn negotiate(pcm: &PCM, config: &StreamConfig, min_buffer_ms: u64) -> Result<bool, String> {
    let hwp = HwParams::any(pcm).map_err(|e| e.to_string())?;
    hwp.set_access(Access::RWInterleaved).map_err(|e| e.to_string())?;
    hwp.set_format(config.format.to_alsa())
        .map_err(|e| format!("sample format {:?} rejected: {e}", config.format))?;
    hwp.set_channels(config.channels).map_err(|e| e.to_string())?;
    hwp.set_rate(config.rate, ValueOr::Nearest)
        .map_err(|e| e.to_string())?;
    let min_frames = (config.rate as u64 * min_buffer_ms / 1000).max(1) as Frames;
    hwp.set_buffer_size_near(min_frames)
        .map_err(|e| e.to_string())?;
    pcm.hw_params(&hwp).map_err(|e| e.to_string())?;

    let current = pcm.hw_params_current().map_err(|e| e.to_string())?;
    let buffer = current.get_buffer_size().map_err(|e| e.to_string())?;
    let period = current.get_period_size().map_err(|e| e.to_string())?;
    let can_pause = current.can_pause();
    debug!(
        "negotiated buffer of {buffer} frames ({period} per period), hardware pause: {can_pause}"
    );

    let swp = pcm.sw_params_current().map_err(|e| e.to_string())?;
    // Start on the first queued frame so short track tails play out and the
    // drain check can observe the delay reaching zero.
    swp.set_start_threshold(1).map_err(|e| e.to_string())?;
    swp.set_avail_min(period).map_err(|e| e.to_string())?;
    pcm.sw_params(&swp).map_err(|e| e.to_string())?;
    pcm.prepare().map_err(|e| e.to_string())?;
    Ok(can_pause)
}

#[cfg(target_os = "linux")]
impl PcmDevice for AlsaPcm {
    fn avail_bytes(&self) -> Result<usize, String> {
        let status = self.pcm.status().map_err(|e| e.to_string())?;
        Ok(status.get_avail().max(0) as usize * self.frame_bytes)
    }

    fn delay_bytes(&self) -> Result<usize, String> {
        let status = self.pcm.status().map_err(|e| e.to_string())?;
        Ok(status.get_delay().max(0) as usize * self.frame_bytes)
    }

    fn write_bytes(&self, data: &[u8]) -> usize {
        let io = self.pcm.io_bytes();
        let mut written = 0;
        while written < data.len() {
            match io.writei(&data[written..]) {
                Ok(0) => break,
                Ok(frames) => written += frames * self.frame_bytes,
                Err(e) => {
                    if let Err(e) = self.pcm.try_recover(e, true) {
                        error!("PCM write failed beyond recovery: {e}");
                        break;
                    }
                }
            }
        }
        written
    }

    fn pause(&self, paused: bool) -> Result<(), String> {
        if !self.can_pause {
            return Err("hardware pause not supported".to_string());
        }
        self.pcm.pause(paused).map_err(|e| e.to_string())
    }

    fn prepare(&self) -> Result<(), String> {
        self.pcm.prepare().map_err(|e| e.to_string())
    }

    fn drop_queued(&self) -> Result<(), String> {
        self.pcm.drop().map_err(|e| e.to_string())
    }
}

/// Backend pairing the real ALSA device with the real ALSA mixer.
#[cfg(target_os = "linux")]
#[derive(Debug, Default)]
pub struct AlsaBackend;

#[cfg(target_os = "linux")]
impl SinkBackend for AlsaBackend {
    type Device = AlsaPcm;
    type Mixer = AlsaMixer;

    const LABEL: &'static str = "ALSA";
    const PUMP_THREAD_NAME: &'static str = "alsa-pump";

    fn open_device(
        &self,
        options: &SinkOptions,
        config: &StreamConfig,
    ) -> Result<AlsaPcm, String> {
        AlsaPcm::open(options, config)
    }

    fn open_mixer(&self, options: &SinkOptions) -> Option<AlsaMixer> {
        AlsaMixer::open(options)
    }
}

/// Gapless sink driving ALSA hardware.
#[cfg(target_os = "linux")]
pub type AlsaSink = GaplessSink<AlsaBackend>;
