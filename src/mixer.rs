#[cfg(target_os = "linux")]
use crate::config::SinkOptions;
#[cfg(target_os = "linux")]
use alsa::mixer::{Mixer, Selem, SelemChannelId, SelemId};
#[cfg(target_os = "linux")]
use tracing::{debug, error};

/// Playback volume control. Levels are percentages in 0..=100; failures are
/// logged and leave levels unchanged. Volume never touches the streaming
/// path.
pub trait MixerCtl {
    /// Current (left, right) playback volume.
    fn volume(&mut self) -> (i32, i32);
    /// Sets (left, right) playback volume.
    fn set_volume(&mut self, left: i32, right: i32);
}

#[cfg(target_os = "linux")]
pub struct AlsaMixer {
    mixer: Mixer,
    element: SelemId,
    range: (i64, i64),
}

// The handle is only used behind the sink's mixer lock, one thread at a time.
#[cfg(target_os = "linux")]
unsafe impl Send for AlsaMixer {}

#[cfg(target_os = "linux")]
impl AlsaMixer {
    /// Attaches to the configured mixer element. Returns `None` when the
    /// mixer or element is unavailable; playback works without one.
    pub fn open(options: &SinkOptions) -> Option<Self> {
        match Self::try_open(options) {
            Ok(mixer) => Some(mixer),
            Err(e) => {
                error!(
                    "no volume control '{}' on mixer device '{}': {e}",
                    options.mixer_element, options.mixer_device
                );
                None
            }
        }
    }

    fn try_open(options: &SinkOptions) -> Result<Self, String> {
        let mixer = Mixer::new(&options.mixer_device, false).map_err(|e| e.to_string())?;
        let element = SelemId::new(&options.mixer_element, 0);
        let selem = mixer
            .find_selem(&element)
            .ok_or_else(|| "element not found".to_string())?;
        if !selem.has_playback_volume() {
            return Err("element has no playback volume".to_string());
        }
        let range = selem.get_playback_volume_range();
        debug!(
            "mixer element '{}' attached, raw volume range {}..={}",
            options.mixer_element, range.0, range.1
        );
        drop(selem);
        Ok(Self {
            mixer,
            element,
            range,
        })
    }

    fn percent_from_raw(&self, raw: i64) -> i32 {
        let (min, max) = self.range;
        if max <= min {
            return 0;
        }
        let span = max - min;
        (((raw - min) * 100 + span / 2) / span).clamp(0, 100) as i32
    }

    fn raw_from_percent(&self, percent: i32) -> i64 {
        let (min, max) = self.range;
        min + (max - min) * i64::from(percent.clamp(0, 100)) / 100
    }

    fn channel_volume(&self, selem: &Selem, channel: SelemChannelId) -> i32 {
        match selem.get_playback_volume(channel) {
            Ok(raw) => self.percent_from_raw(raw),
            Err(e) => {
                error!("failed to read playback volume: {e}");
                0
            }
        }
    }
}

#[cfg(target_os = "linux")]
impl MixerCtl for AlsaMixer {
    fn volume(&mut self) -> (i32, i32) {
        if let Err(e) = self.mixer.handle_events() {
            debug!("mixer event handling failed: {e}");
        }
        let Some(selem) = self.mixer.find_selem(&self.element) else {
            error!("mixer element disappeared");
            return (0, 0);
        };
        if selem.is_playback_mono() {
            let level = self.channel_volume(&selem, SelemChannelId::mono());
            (level, level)
        } else {
            (
                self.channel_volume(&selem, SelemChannelId::FrontLeft),
                self.channel_volume(&selem, SelemChannelId::FrontRight),
            )
        }
    }

    fn set_volume(&mut self, left: i32, right: i32) {
        let Some(selem) = self.mixer.find_selem(&self.element) else {
            error!("mixer element disappeared");
            return;
        };
        let result = if selem.is_playback_mono() {
            selem.set_playback_volume(
                SelemChannelId::mono(),
                self.raw_from_percent(left.max(right)),
            )
        } else {
            selem
                .set_playback_volume(SelemChannelId::FrontLeft, self.raw_from_percent(left))
                .and_then(|()| {
                    selem.set_playback_volume(
                        SelemChannelId::FrontRight,
                        self.raw_from_percent(right),
                    )
                })
        };
        if let Err(e) = result {
            error!("failed to set playback volume: {e}");
        }
    }
}
