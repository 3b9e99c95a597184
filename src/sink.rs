use crate::config::SinkOptions;
use crate::error::SinkError;
use crate::format::{SampleFormat, StreamConfig};
use crate::mixer::MixerCtl;
use crate::pcm::PcmDevice;
use crate::pump::{self, PumpTiming};
use crate::ring::RingBuffer;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

/// Reported free space. Deliberately oversized so producers never throttle
/// on this number; `write_audio` blocks for real space instead.
const REPORTED_FREE_BYTES: usize = 1024 * 1024;

/// Everything the generic sink needs from a concrete audio stack.
///
/// `open_device` negotiates a playback handle for one stream configuration.
/// `open_mixer` is called once per sink; returning `None` simply disables
/// volume control.
pub trait SinkBackend: Send + Sync + 'static {
    type Device: PcmDevice + Send + 'static;
    type Mixer: MixerCtl + Send + 'static;

    const LABEL: &'static str;
    const PUMP_THREAD_NAME: &'static str;

    fn open_device(
        &self,
        options: &SinkOptions,
        config: &StreamConfig,
    ) -> Result<Self::Device, String>;

    fn open_mixer(&self, options: &SinkOptions) -> Option<Self::Mixer>;
}

pub(crate) struct Shared<D> {
    pub(crate) session: Mutex<Session<D>>,
    pub(crate) cond: Condvar,
}

pub(crate) struct Session<D> {
    pub(crate) open: Option<OpenSession<D>>,
    pub(crate) pump: PumpFlags,
}

#[derive(Default)]
pub(crate) struct PumpFlags {
    pub(crate) alive: bool,
    pub(crate) quit: bool,
}

/// State that exists only while a device is open. Dropping it closes the
/// device.
pub(crate) struct OpenSession<D> {
    pub(crate) device: D,
    pub(crate) config: StreamConfig,
    pub(crate) ring: RingBuffer,
    /// Microseconds of audio accepted since the last open or flush.
    pub(crate) written_us: i64,
    pub(crate) paused: bool,
    /// Position snapshot reported while paused.
    pub(crate) paused_time_ms: i64,
    /// Set once the producer starts polling `buffer_playing`; makes the next
    /// close a deferred one.
    pub(crate) leave_open: bool,
    /// A deferred close is pending; the pump closes the device once playback
    /// drains.
    pub(crate) draining: bool,
}

struct ControlState {
    pump: Option<JoinHandle<()>>,
}

/// Ring-buffered playback sink that keeps the device open across same-format
/// track changes, so consecutive tracks play back to back without a close
/// and reopen click.
///
/// A pump thread owned by the sink moves buffered audio into the device
/// whenever it has room. `open_audio`, `write_audio` and `close_audio`
/// serialize on an internal lock, as when one producer thread drives them;
/// every other operation is safe from any thread and never waits behind a
/// blocked write.
pub struct GaplessSink<B: SinkBackend> {
    backend: B,
    options: SinkOptions,
    control: Mutex<ControlState>,
    shared: Arc<Shared<B::Device>>,
    mixer: Mutex<Option<B::Mixer>>,
}

impl<B: SinkBackend + Default> GaplessSink<B> {
    pub fn new(options: SinkOptions) -> Self {
        Self::with_backend(B::default(), options)
    }
}

impl<B: SinkBackend> GaplessSink<B> {
    pub fn with_backend(backend: B, options: SinkOptions) -> Self {
        let mixer = backend.open_mixer(&options);
        debug!("{} sink ready", B::LABEL);
        Self {
            backend,
            options,
            control: Mutex::new(ControlState { pump: None }),
            shared: Arc::new(Shared {
                session: Mutex::new(Session {
                    open: None,
                    pump: PumpFlags::default(),
                }),
                cond: Condvar::new(),
            }),
            mixer: Mutex::new(mixer),
        }
    }

    /// Opens the device for the given stream shape, or adopts the already
    /// open device when it matches.
    ///
    /// On a match the written-time clock restarts and any buffered tail from
    /// the previous track keeps playing ahead of the new one. On a mismatch
    /// the call blocks until the old audio has played out, then reopens.
    pub fn open_audio(
        &self,
        format: SampleFormat,
        rate: u32,
        channels: u32,
    ) -> Result<(), SinkError> {
        let config = StreamConfig {
            format,
            rate,
            channels,
        };
        let mut control = self.control.lock().expect("control mutex poisoned");
        let mut s = self.shared.session.lock().expect("session mutex poisoned");

        match s.open.as_mut() {
            Some(open) if open.config == config => {
                debug!("audio already open and in requested format");
                open.draining = false;
                open.written_us = 0;
                open.leave_open = false;
                return Ok(());
            }
            Some(open) => {
                debug!("audio already open but not in requested format; draining");
                open.draining = false;
            }
            None => {}
        }

        if s.open.is_some() {
            self.ensure_pump(&mut control, &mut s);
            loop {
                let drained = match s.open.as_ref() {
                    None => true,
                    Some(open) => open.paused || !still_playing(open),
                };
                if drained {
                    break;
                }
                s = self.shared.cond.wait(s).expect("session condvar failed");
            }
            drop(s);
            self.close_now(&mut control);
            s = self.shared.session.lock().expect("session mutex poisoned");
        }

        let device = self
            .backend
            .open_device(&self.options, &config)
            .map_err(|reason| SinkError::Open {
                device: self.options.pcm_device.clone(),
                reason,
            })?;
        s.open = Some(OpenSession {
            device,
            config,
            ring: RingBuffer::new(config.duration_bytes(self.options.large_buffer_ms)),
            written_us: 0,
            paused: false,
            paused_time_ms: 0,
            leave_open: false,
            draining: false,
        });
        Ok(())
    }

    /// Buffers `data` for playback, blocking until all of it is accepted.
    /// The written-time clock advances by exactly the buffered duration.
    pub fn write_audio(&self, data: &[u8]) -> Result<(), SinkError> {
        let mut control = self.control.lock().expect("control mutex poisoned");
        let mut s = self.shared.session.lock().expect("session mutex poisoned");
        let mut offset = 0;
        loop {
            let Some(open) = s.open.as_mut() else {
                return Err(SinkError::NotOpen);
            };
            let copied = open.ring.write(&data[offset..]);
            open.written_us += open.config.bytes_to_us(copied);
            offset += copied;
            if offset == data.len() {
                return Ok(());
            }
            self.ensure_pump(&mut control, &mut s);
            s = self.shared.cond.wait(s).expect("session condvar failed");
        }
    }

    /// Closes the device, or arms a deferred close when the producer marked
    /// the current track as ending via `buffer_playing`. A deferred close
    /// lets buffered audio play out and is cancelled by reopening in time.
    pub fn close_audio(&self) {
        debug!("close requested");
        let mut control = self.control.lock().expect("control mutex poisoned");
        let mut s = self.shared.session.lock().expect("session mutex poisoned");
        let deferred = match s.open.as_mut() {
            Some(open) if open.leave_open && !open.paused => {
                open.draining = true;
                true
            }
            _ => false,
        };
        if deferred {
            debug!("deferring close until playback drains");
            self.ensure_pump(&mut control, &mut s);
        } else {
            drop(s);
            self.close_now(&mut control);
        }
    }

    /// Discards everything buffered and restarts the clocks at `time_ms`.
    /// Frames already inside the device are dropped as well.
    pub fn flush(&self, time_ms: i64) {
        debug!("flushing buffered audio, clock moves to {time_ms} ms");
        let mut s = self.shared.session.lock().expect("session mutex poisoned");
        let Some(open) = s.open.as_mut() else {
            return;
        };
        open.written_us = time_ms.saturating_mul(1000);
        open.ring.clear();
        if open.paused {
            open.paused_time_ms = time_ms;
        }
        if let Err(e) = open
            .device
            .drop_queued()
            .and_then(|()| open.device.prepare())
        {
            error!("failed to reset device after flush: {e}");
        }
    }

    /// Pauses or resumes playback. The pump stops feeding the device while
    /// paused, so devices without hardware pause still go silent once their
    /// buffer runs dry.
    pub fn pause(&self, paused: bool) {
        let mut s = self.shared.session.lock().expect("session mutex poisoned");
        let Some(open) = s.open.as_mut() else {
            return;
        };
        debug!(
            "{}",
            if paused {
                "pausing playback"
            } else {
                "resuming playback"
            }
        );
        open.paused = paused;
        if paused {
            open.paused_time_ms = audible_position_ms(open);
        }
        if let Err(e) = open.device.pause(paused) {
            if paused {
                debug!("hardware pause unavailable, pausing in software: {e}");
            } else if let Err(e2) = open.device.prepare() {
                error!("failed to restart device after resume: {e2} (pause error: {e})");
            }
        }
        if !paused {
            drop(s);
            self.shared.cond.notify_all();
        }
    }

    /// Microseconds of audio accepted since the last open or flush,
    /// independent of how much has actually played.
    pub fn written_time(&self) -> i64 {
        let s = self.shared.session.lock().expect("session mutex poisoned");
        s.open.as_ref().map_or(0, |open| open.written_us)
    }

    /// Estimated audible position in milliseconds: written time minus
    /// everything still queued in the ring and the device, never negative.
    /// Frozen at the pause snapshot while paused; 0 when nothing is open.
    pub fn output_time(&self) -> i64 {
        let s = self.shared.session.lock().expect("session mutex poisoned");
        match s.open.as_ref() {
            None => 0,
            Some(open) if open.paused => open.paused_time_ms,
            Some(open) => audible_position_ms(open),
        }
    }

    /// Free buffer space as reported to producers: a constant 1 MiB, so no
    /// producer throttles on this number. `write_audio` does the real
    /// throttling.
    pub fn buffer_free(&self) -> usize {
        REPORTED_FREE_BYTES
    }

    /// Whether buffered audio is still pending, in the ring or the device.
    ///
    /// Calling this also marks the current track as ending, which makes a
    /// following `close_audio` deferred instead of immediate.
    pub fn buffer_playing(&self) -> bool {
        let mut s = self.shared.session.lock().expect("session mutex poisoned");
        let Some(open) = s.open.as_mut() else {
            return false;
        };
        if !open.leave_open {
            debug!("track ending, leaving device open for the next one");
            open.leave_open = true;
        }
        still_playing(open)
    }

    /// Current (left, right) playback volume, or (0, 0) without a mixer.
    pub fn get_volume(&self) -> (i32, i32) {
        let mut mixer = self.mixer.lock().expect("mixer mutex poisoned");
        mixer.as_mut().map_or((0, 0), |m| m.volume())
    }

    pub fn set_volume(&self, left: i32, right: i32) {
        let mut mixer = self.mixer.lock().expect("mixer mutex poisoned");
        if let Some(m) = mixer.as_mut() {
            m.set_volume(left, right);
        }
    }

    /// Stops the pump, joins it and closes the device.
    fn close_now(&self, control: &mut ControlState) {
        {
            let mut s = self.shared.session.lock().expect("session mutex poisoned");
            if s.pump.alive {
                s.pump.quit = true;
                self.shared.cond.notify_all();
            }
        }
        if let Some(handle) = control.pump.take() {
            let _ = handle.join();
        }
        let mut s = self.shared.session.lock().expect("session mutex poisoned");
        s.pump.quit = false;
        if s.open.take().is_some() {
            debug!("closed audio device");
        }
        drop(s);
        self.shared.cond.notify_all();
    }

    /// Starts the pump thread unless one is already running. A finished pump
    /// that closed the device on its own is joined here before respawning.
    fn ensure_pump(&self, control: &mut ControlState, session: &mut Session<B::Device>) {
        if session.pump.alive {
            return;
        }
        if let Some(handle) = control.pump.take() {
            let _ = handle.join();
        }
        session.pump.alive = true;
        session.pump.quit = false;
        let shared = Arc::clone(&self.shared);
        let timing = PumpTiming {
            tick: Duration::from_millis((self.options.small_buffer_ms / 2).max(1)),
            drain_poll: Duration::from_millis(self.options.drain_poll_ms.max(1)),
        };
        control.pump = Some(thread::spawn(move || {
            pump::run(shared, timing, B::LABEL, B::PUMP_THREAD_NAME);
        }));
    }
}

impl<B: SinkBackend> Drop for GaplessSink<B> {
    fn drop(&mut self) {
        if let Ok(mut control) = self.control.lock() {
            self.close_now(&mut control);
        }
    }
}

/// True while unplayed audio remains in the ring or the device. A device
/// whose delay cannot be read counts as drained, like a device that died.
pub(crate) fn still_playing<D: PcmDevice>(open: &OpenSession<D>) -> bool {
    if !open.ring.is_empty() {
        return true;
    }
    match open.device.delay_bytes() {
        Ok(delay) => delay > 0,
        Err(e) => {
            debug!("PCM delay query failed: {e}");
            false
        }
    }
}

fn audible_position_ms<D: PcmDevice>(open: &OpenSession<D>) -> i64 {
    let delay = open.device.delay_bytes().unwrap_or_else(|e| {
        debug!("PCM delay query failed: {e}");
        0
    });
    let backlog_us = open.config.bytes_to_us(open.ring.len() + delay);
    ((open.written_us - backlog_us) / 1000).max(0)
}
