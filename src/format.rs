#[cfg(target_os = "linux")]
use alsa::pcm::Format;

/// Sample encodings accepted by the sink. `Ne` variants are native-endian;
/// 24-bit samples travel in the low bytes of a 32-bit container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Float,
    S8,
    U8,
    S16Ne,
    S16Le,
    S16Be,
    U16Ne,
    U16Le,
    U16Be,
    S24Ne,
    S24Le,
    S24Be,
    U24Ne,
    U24Le,
    U24Be,
    S32Ne,
    S32Le,
    S32Be,
    U32Ne,
    U32Le,
    U32Be,
}

impl SampleFormat {
    /// Bytes one sample occupies in the stream.
    pub fn sample_bytes(self) -> usize {
        match self {
            SampleFormat::S8 | SampleFormat::U8 => 1,
            SampleFormat::S16Ne
            | SampleFormat::S16Le
            | SampleFormat::S16Be
            | SampleFormat::U16Ne
            | SampleFormat::U16Le
            | SampleFormat::U16Be => 2,
            _ => 4,
        }
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn to_alsa(self) -> Format {
        match self {
            SampleFormat::Float => Format::float(),
            SampleFormat::S8 => Format::S8,
            SampleFormat::U8 => Format::U8,
            SampleFormat::S16Ne => Format::s16(),
            SampleFormat::S16Le => Format::S16LE,
            SampleFormat::S16Be => Format::S16BE,
            SampleFormat::U16Ne => Format::u16(),
            SampleFormat::U16Le => Format::U16LE,
            SampleFormat::U16Be => Format::U16BE,
            SampleFormat::S24Ne => Format::s24(),
            SampleFormat::S24Le => Format::S24LE,
            SampleFormat::S24Be => Format::S24BE,
            SampleFormat::U24Ne => Format::u24(),
            SampleFormat::U24Le => Format::U24LE,
            SampleFormat::U24Be => Format::U24BE,
            SampleFormat::S32Ne => Format::s32(),
            SampleFormat::S32Le => Format::S32LE,
            SampleFormat::S32Be => Format::S32BE,
            SampleFormat::U32Ne => Format::u32(),
            SampleFormat::U32Le => Format::U32LE,
            SampleFormat::U32Be => Format::U32BE,
        }
    }
}

/// One negotiated stream shape. Two configurations being equal is what makes
/// a still-open device reusable for the next track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u32,
}

impl StreamConfig {
    pub fn frame_bytes(&self) -> usize {
        self.format.sample_bytes() * self.channels as usize
    }

    /// Microseconds of playback `bytes` represents, rounded down to whole
    /// frames.
    pub fn bytes_to_us(&self, bytes: usize) -> i64 {
        let frame = self.frame_bytes();
        if frame == 0 || self.rate == 0 {
            return 0;
        }
        (bytes / frame) as i64 * 1_000_000 / self.rate as i64
    }

    /// Bytes covering `ms` milliseconds of playback.
    pub fn duration_bytes(&self, ms: u64) -> usize {
        (self.rate as u64 * ms / 1000) as usize * self.frame_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_widths() {
        assert_eq!(SampleFormat::U8.sample_bytes(), 1);
        assert_eq!(SampleFormat::S16Le.sample_bytes(), 2);
        assert_eq!(SampleFormat::S24Be.sample_bytes(), 4);
        assert_eq!(SampleFormat::U32Ne.sample_bytes(), 4);
        assert_eq!(SampleFormat::Float.sample_bytes(), 4);
    }

    #[test]
    fn frame_and_duration_math() {
        let config = StreamConfig {
            format: SampleFormat::S16Ne,
            rate: 44_100,
            channels: 2,
        };
        assert_eq!(config.frame_bytes(), 4);
        assert_eq!(config.duration_bytes(1000), 176_400);
        assert_eq!(config.duration_bytes(100), 17_640);
    }

    #[test]
    fn bytes_to_us_floors_partial_frames() {
        let config = StreamConfig {
            format: SampleFormat::S16Ne,
            rate: 1000,
            channels: 2,
        };
        // 4-byte frames at 1 kHz: one frame per millisecond.
        assert_eq!(config.bytes_to_us(400), 100_000);
        assert_eq!(config.bytes_to_us(403), 100_000);
        assert_eq!(config.bytes_to_us(0), 0);
    }

    #[test]
    fn degenerate_configs_do_not_divide_by_zero() {
        let config = StreamConfig {
            format: SampleFormat::S16Ne,
            rate: 0,
            channels: 0,
        };
        assert_eq!(config.bytes_to_us(1024), 0);
        assert_eq!(config.duration_bytes(1000), 0);
    }
}
