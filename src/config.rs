use serde::{Deserialize, Serialize};

pub const PCM_DEVICE_ENV: &str = "GAPLESS_ALSA_PCM_DEVICE";
pub const MIXER_DEVICE_ENV: &str = "GAPLESS_ALSA_MIXER_DEVICE";
pub const MIXER_ELEMENT_ENV: &str = "GAPLESS_ALSA_MIXER_ELEMENT";
pub const SMALL_BUFFER_ENV: &str = "GAPLESS_ALSA_SMALL_BUFFER_MS";
pub const LARGE_BUFFER_ENV: &str = "GAPLESS_ALSA_LARGE_BUFFER_MS";
pub const DRAIN_POLL_ENV: &str = "GAPLESS_ALSA_DRAIN_POLL_MS";

/// Tunables read once when a sink is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkOptions {
    /// ALSA PCM device name.
    pub pcm_device: String,
    /// ALSA mixer device name.
    pub mixer_device: String,
    /// Simple mixer element controlling playback volume.
    pub mixer_element: String,
    /// Minimum hardware buffer duration; the pump wakes at half this.
    pub small_buffer_ms: u64,
    /// Ring buffer duration allocated per open device.
    pub large_buffer_ms: u64,
    /// How often a deferred close re-checks whether playback has drained.
    pub drain_poll_ms: u64,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            pcm_device: "default".to_string(),
            mixer_device: "default".to_string(),
            mixer_element: "PCM".to_string(),
            small_buffer_ms: 100,
            large_buffer_ms: 1000,
            drain_poll_ms: 300,
        }
    }
}

impl SinkOptions {
    /// Defaults with any `GAPLESS_ALSA_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(v) = env_string(PCM_DEVICE_ENV) {
            options.pcm_device = v;
        }
        if let Some(v) = env_string(MIXER_DEVICE_ENV) {
            options.mixer_device = v;
        }
        if let Some(v) = env_string(MIXER_ELEMENT_ENV) {
            options.mixer_element = v;
        }
        if let Some(v) = env_ms(SMALL_BUFFER_ENV) {
            options.small_buffer_ms = v;
        }
        if let Some(v) = env_ms(LARGE_BUFFER_ENV) {
            options.large_buffer_ms = v;
        }
        if let Some(v) = env_ms(DRAIN_POLL_ENV) {
            options.drain_poll_ms = v;
        }
        options
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_ms(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&v| v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = SinkOptions::default();
        assert_eq!(options.pcm_device, "default");
        assert_eq!(options.mixer_device, "default");
        assert_eq!(options.mixer_element, "PCM");
        assert_eq!(options.small_buffer_ms, 100);
        assert_eq!(options.large_buffer_ms, 1000);
        assert_eq!(options.drain_poll_ms, 300);
    }

    #[test]
    fn env_overrides_apply() {
        unsafe {
            std::env::set_var(PCM_DEVICE_ENV, "plughw:2");
            std::env::set_var(SMALL_BUFFER_ENV, "250");
        }
        let options = SinkOptions::from_env();
        unsafe {
            std::env::remove_var(PCM_DEVICE_ENV);
            std::env::remove_var(SMALL_BUFFER_ENV);
        }
        assert_eq!(options.pcm_device, "plughw:2");
        assert_eq!(options.small_buffer_ms, 250);
        assert_eq!(options.large_buffer_ms, 1000);
    }

    #[test]
    fn env_ms_rejects_garbage_and_zero() {
        unsafe {
            std::env::set_var("GAPLESS_ALSA_TEST_MS", "abc");
        }
        assert_eq!(env_ms("GAPLESS_ALSA_TEST_MS"), None);
        unsafe {
            std::env::set_var("GAPLESS_ALSA_TEST_MS", "0");
        }
        assert_eq!(env_ms("GAPLESS_ALSA_TEST_MS"), None);
        unsafe {
            std::env::set_var("GAPLESS_ALSA_TEST_MS", " 40 ");
        }
        assert_eq!(env_ms("GAPLESS_ALSA_TEST_MS"), Some(40));
        unsafe {
            std::env::remove_var("GAPLESS_ALSA_TEST_MS");
        }
    }

    #[test]
    fn env_string_ignores_blank_values() {
        unsafe {
            std::env::set_var("GAPLESS_ALSA_TEST_DEV", "  ");
        }
        assert_eq!(env_string("GAPLESS_ALSA_TEST_DEV"), None);
        unsafe {
            std::env::remove_var("GAPLESS_ALSA_TEST_DEV");
        }
    }

    #[test]
    fn options_survive_serde_round_trip() {
        let options = SinkOptions {
            pcm_device: "hw:1,0".to_string(),
            ..SinkOptions::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: SinkOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pcm_device, "hw:1,0");
        assert_eq!(back.mixer_element, options.mixer_element);
        assert_eq!(back.large_buffer_ms, options.large_buffer_ms);
    }
}
