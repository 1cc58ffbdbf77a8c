//! Monotonic clock and lightweight profiling.

use std::{
    fmt, mem,
    sync::{Mutex, OnceLock},
    time::{Duration, Instant},
};

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Returns the number of milliseconds elapsed on a monotonic, process-wide clock.
///
/// Frame timestamps submitted in live-stream mode and the latency computed from them use this
/// clock. It never goes backwards.
pub fn uptime_millis() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// Accumulates how long a recurring operation takes.
///
/// Formatting a `Timer` with `{}` prints the number of samples and their mean duration, and starts
/// a new measurement window.
pub struct Timer {
    name: &'static str,
    window: Mutex<Window>,
}

#[derive(Default)]
struct Window {
    elapsed: Duration,
    samples: u32,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            window: Mutex::new(Window::default()),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs `op` and records its duration.
    pub fn time<T>(&self, op: impl FnOnce() -> T) -> T {
        let _sample = self.start();
        op()
    }

    /// Records the time until the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            timer: self,
            since: Instant::now(),
        }
    }

    /// Number of samples in the current window.
    pub fn count(&self) -> u32 {
        self.lock().samples
    }

    fn record(&self, elapsed: Duration) {
        let mut window = self.lock();
        window.elapsed += elapsed;
        window.samples += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Window> {
        // The window holds plain counters, so a poisoned lock is still usable.
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let window = mem::take(&mut *self.lock());
        let mean_ms = match window.samples {
            0 => 0.0,
            n => (window.elapsed / n).as_secs_f32() * 1000.0,
        };
        write!(f, "{}: {}x{mean_ms:.01}ms", self.name, window.samples)
    }
}

/// A clone shares the name but starts with an empty window.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

/// Returned by [`Timer::start`].
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    since: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.since.elapsed());
    }
}

/// Counts events and logs their rate about once per second.
pub struct FpsCounter {
    name: String,
    events: u32,
    window_start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            events: 0,
            window_start: Instant::now(),
        }
    }

    /// Counts one event.
    pub fn tick(&mut self) {
        self.events += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.events as f32 / elapsed.as_secs_f32();
            log::debug!("{}: {fps:.1} FPS", self.name);
            self.events = 0;
            self.window_start = Instant::now();
        }
    }
}
