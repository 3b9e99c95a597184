use crate::pcm::PcmDevice;
use crate::sink::{self, Shared};
#[cfg(unix)]
use nix::libc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

#[cfg(unix)]
const RT_POLICY: i32 = libc::SCHED_FIFO;
const RT_PRIORITY_PUMP: i32 = 12;

pub(crate) struct PumpTiming {
    /// Wait between pump cycles, half the minimum hardware buffer duration.
    pub(crate) tick: Duration,
    /// Interval between drained checks while a deferred close is pending.
    pub(crate) drain_poll: Duration,
}

/// Pump thread body. Moves ring audio into the device each cycle, wakes
/// blocked writers and, when a deferred close is pending, closes the device
/// itself once playback drains.
///
/// Exits when asked to quit or when the device is gone; the sink joins the
/// finished thread before spawning another.
pub(crate) fn run<D: PcmDevice>(
    shared: Arc<Shared<D>>,
    timing: PumpTiming,
    label: &'static str,
    thread_name: &'static str,
) {
    if let Err(e) = configure_rt_thread(thread_name, RT_PRIORITY_PUMP) {
        error!("{} pump realtime priority not enabled: {}", label, e);
    }
    debug!("{} pump running", label);
    let mut last_drain_check = Instant::now();
    let mut s = shared.session.lock().expect("session mutex poisoned");
    loop {
        if s.pump.quit {
            break;
        }
        let mut close_device = false;
        match s.open.as_mut() {
            None => break,
            Some(open) if open.paused => {}
            Some(open) => {
                match open.device.avail_bytes() {
                    Ok(avail) => {
                        let frame = open.config.frame_bytes().max(1);
                        let writable = avail.min(open.ring.len()) / frame * frame;
                        if writable > 0 {
                            let device = &open.device;
                            open.ring
                                .read_into(writable, |chunk| device.write_bytes(chunk));
                        }
                    }
                    Err(e) => error!("PCM status query failed: {e}"),
                }
                if open.draining && last_drain_check.elapsed() >= timing.drain_poll {
                    last_drain_check = Instant::now();
                    close_device = !sink::still_playing(open);
                }
            }
        }
        if close_device {
            s.open = None;
            debug!("playback drained, closing audio device");
            break;
        }
        shared.cond.notify_all();
        let (guard, _) = shared
            .cond
            .wait_timeout(s, timing.tick)
            .expect("session condvar failed");
        s = guard;
    }
    s.pump.alive = false;
    debug!("{} pump stopped", label);
    drop(s);
    shared.cond.notify_all();
}

fn configure_rt_thread(name: &str, priority: i32) -> Result<(), String> {
    #[cfg(unix)]
    {
        let thread = unsafe { libc::pthread_self() };
        #[cfg(any(target_os = "linux", target_os = "freebsd"))]
        let c_name = std::ffi::CString::new(name).map_err(|e| e.to_string())?;
        #[cfg(target_os = "linux")]
        unsafe {
            let _ = libc::pthread_setname_np(thread, c_name.as_ptr());
        }
        #[cfg(target_os = "freebsd")]
        unsafe {
            let _ = libc::pthread_set_name_np(thread, c_name.as_ptr());
        }

        let param = unsafe {
            let mut p = std::mem::zeroed::<libc::sched_param>();
            p.sched_priority = priority;
            p
        };
        let rc = unsafe { libc::pthread_setschedparam(thread, RT_POLICY, &param) };
        if rc != 0 {
            return Err(format!(
                "pthread_setschedparam({}, prio {}) failed with errno {}",
                name, priority, rc
            ));
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = name;
        let _ = priority;
        Err("Realtime thread priority is not supported on this platform".to_string())
    }
}
