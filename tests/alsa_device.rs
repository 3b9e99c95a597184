#![cfg(target_os = "linux")]

use gapless_alsa::{AlsaSink, SampleFormat, SinkOptions};
use std::time::Duration;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn tone(frames: usize, rate: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(frames * 4);
    for i in 0..frames {
        let phase = i as f32 * 440.0 * 2.0 * std::f32::consts::PI / rate as f32;
        let sample = (phase.sin() * 8_000.0) as i16;
        data.extend_from_slice(&sample.to_ne_bytes());
        data.extend_from_slice(&sample.to_ne_bytes());
    }
    data
}

#[test]
#[ignore = "requires ALSA hardware"]
fn short_tone_plays_and_advances_clock() {
    init_logging();
    let sink = AlsaSink::new(SinkOptions::from_env());
    sink.open_audio(SampleFormat::S16Ne, 44_100, 2)
        .expect("open ALSA device");

    // 200 ms of a 440 Hz tone.
    let data = tone(44_100 / 5, 44_100);
    sink.write_audio(&data).expect("write audio");
    assert_eq!(sink.written_time(), 200_000);

    std::thread::sleep(Duration::from_millis(50));
    assert!(sink.buffer_playing() || sink.output_time() > 0);
    sink.close_audio();
}

#[test]
#[ignore = "requires ALSA hardware"]
fn reopen_in_same_format_is_accepted() {
    init_logging();
    let sink = AlsaSink::new(SinkOptions::from_env());
    sink.open_audio(SampleFormat::S16Ne, 44_100, 2)
        .expect("open ALSA device");
    sink.write_audio(&tone(4_410, 44_100)).expect("write audio");
    assert!(sink.buffer_playing());
    sink.close_audio();
    sink.open_audio(SampleFormat::S16Ne, 44_100, 2)
        .expect("reopen ALSA device");
    assert_eq!(sink.written_time(), 0);
    sink.close_audio();
}

#[test]
#[ignore = "requires ALSA hardware"]
fn mixer_reports_percent_volume() {
    init_logging();
    let sink = AlsaSink::new(SinkOptions::from_env());
    let (left, right) = sink.get_volume();
    assert!((0..=100).contains(&left));
    assert!((0..=100).contains(&right));
}
