use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::error;
use thiserror::Error;

/// Fatal simulation failure; terminates the loop.
#[derive(Debug, Error)]
#[error("simulation error at tick {tick}: {message}")]
pub struct SimulationError {
    pub tick: u64,
    pub message: String,
}

impl SimulationError {
    pub fn new(tick: u64, message: impl Into<String>) -> Self {
        Self {
            tick,
            message: message.into(),
        }
    }
}

/// The three callbacks the facade hangs off the loop.
///
/// Failure policy: an `on_simulate` error is fatal and stops the loop;
/// `on_input` and `on_broadcast` errors are logged and the loop carries
/// on, because a bad packet or one failed send must not kill the world.
pub trait LoopHooks {
    fn on_input(&mut self) -> Result<(), String>;
    fn on_simulate(&mut self, tick: u64) -> Result<(), SimulationError>;
    fn on_broadcast(&mut self, tick: u64) -> Result<(), String>;
}

/// Cloneable stop signal, safe to trigger from another thread or a
/// signal handler.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    running: Arc<AtomicBool>,
}

impl LoopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopStats {
    pub actual_simulation_hz: f64,
    pub actual_broadcast_hz: f64,
    /// Exponential moving average of simulate-callback duration, ms.
    pub average_tick_ms: f64,
    pub total_simulation_ticks: u64,
    pub total_broadcasts: u64,
}

/// Shared view of the loop's statistics, readable while the loop runs
/// (the console's `status` command reads it from inside a hook).
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<LoopStats>>,
}

impl StatsHandle {
    pub fn get(&self) -> LoopStats {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, apply: impl FnOnce(&mut LoopStats)) {
        let mut stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        apply(&mut stats);
    }
}

/// Fixed-timestep driver: simulation at `simulation_hz` with catch-up,
/// broadcast at `broadcast_hz`, sleep to the next tick boundary when
/// ahead of schedule.
pub struct ServerLoop {
    simulation_hz: u32,
    broadcast_hz: u32,
    tick: u64,
    running: Arc<AtomicBool>,
    stats: StatsHandle,
}

const TICK_EMA_ALPHA: f64 = 0.1;
/// Ceiling on the per-frame accumulator so one long host stall does not
/// trigger an unbounded burst of catch-up ticks.
const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

impl ServerLoop {
    pub fn new(simulation_hz: u32, broadcast_hz: u32) -> Self {
        Self {
            simulation_hz,
            broadcast_hz,
            tick: 0,
            running: Arc::new(AtomicBool::new(false)),
            stats: StatsHandle::default(),
        }
    }

    pub fn simulation_hz(&self) -> u32 {
        self.simulation_hz
    }

    pub fn broadcast_hz(&self) -> u32 {
        self.broadcast_hz
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> LoopStats {
        self.stats.get()
    }

    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Run until the handle stops the loop or a simulation error occurs.
    /// Blocks the calling thread.
    pub fn run<H: LoopHooks>(&mut self, hooks: &mut H) -> Result<(), SimulationError> {
        self.running.store(true, Ordering::SeqCst);

        let timestep = Duration::from_secs_f64(1.0 / self.simulation_hz as f64);
        let broadcast_interval = Duration::from_secs_f64(1.0 / self.broadcast_hz as f64);

        let mut accumulator = Duration::ZERO;
        let mut last_frame = Instant::now();
        let mut last_broadcast = last_frame;
        let mut last_stats = last_frame;
        let mut ticks_since_stats: u64 = 0;
        let mut broadcasts_since_stats: u64 = 0;

        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }

            if let Err(message) = hooks.on_input() {
                error!("input processing failed: {}", message);
            }

            let now = Instant::now();
            accumulator += (now - last_frame).min(MAX_FRAME_DELTA);
            last_frame = now;

            // Catch up: run as many fixed steps as the accumulator holds.
            let mut failed = None;
            while accumulator >= timestep {
                accumulator -= timestep;

                let tick_start = Instant::now();
                if let Err(e) = hooks.on_simulate(self.tick) {
                    failed = Some(e);
                    break;
                }
                let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
                self.stats.update(|stats| {
                    stats.average_tick_ms = TICK_EMA_ALPHA * tick_ms
                        + (1.0 - TICK_EMA_ALPHA) * stats.average_tick_ms;
                    stats.total_simulation_ticks += 1;
                });

                self.tick += 1;
                ticks_since_stats += 1;
            }
            if let Some(e) = failed {
                self.running.store(false, Ordering::SeqCst);
                break Err(e);
            }

            if now.duration_since(last_broadcast) >= broadcast_interval {
                if let Err(message) = hooks.on_broadcast(self.tick) {
                    error!("broadcast failed: {}", message);
                }
                // Advance by the interval, not to `now`, so frame
                // quantization does not erode the broadcast rate. After a
                // long stall, snap forward instead of bursting.
                last_broadcast += broadcast_interval;
                if now.duration_since(last_broadcast) > broadcast_interval * 2 {
                    last_broadcast = now;
                }
                self.stats.update(|stats| stats.total_broadcasts += 1);
                broadcasts_since_stats += 1;
            }

            let since_stats = now.duration_since(last_stats);
            if since_stats >= Duration::from_secs(1) {
                let seconds = since_stats.as_secs_f64();
                self.stats.update(|stats| {
                    stats.actual_simulation_hz = ticks_since_stats as f64 / seconds;
                    stats.actual_broadcast_hz = broadcasts_since_stats as f64 / seconds;
                });
                ticks_since_stats = 0;
                broadcasts_since_stats = 0;
                last_stats = now;
            }

            // Sleep to the next simulation boundary; never sleep when
            // behind schedule.
            let next_tick_in = timestep.saturating_sub(last_frame.elapsed() + accumulator);
            if !next_tick_in.is_zero() {
                std::thread::sleep(next_tick_in);
            }
        };

        self.running.store(false, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHooks {
        inputs: u64,
        simulates: u64,
        broadcasts: u64,
        stop_after_ticks: Option<u64>,
        fail_simulate_at: Option<u64>,
        fail_broadcast: bool,
        handle: Option<LoopHandle>,
    }

    impl CountingHooks {
        fn new() -> Self {
            Self {
                inputs: 0,
                simulates: 0,
                broadcasts: 0,
                stop_after_ticks: None,
                fail_simulate_at: None,
                fail_broadcast: false,
                handle: None,
            }
        }
    }

    impl LoopHooks for CountingHooks {
        fn on_input(&mut self) -> Result<(), String> {
            self.inputs += 1;
            Ok(())
        }

        fn on_simulate(&mut self, tick: u64) -> Result<(), SimulationError> {
            self.simulates += 1;
            if let Some(fail_at) = self.fail_simulate_at {
                if tick >= fail_at {
                    return Err(SimulationError::new(tick, "invariant breach"));
                }
            }
            if let Some(limit) = self.stop_after_ticks {
                if self.simulates >= limit {
                    if let Some(handle) = &self.handle {
                        handle.stop();
                    }
                }
            }
            Ok(())
        }

        fn on_broadcast(&mut self, _tick: u64) -> Result<(), String> {
            self.broadcasts += 1;
            if self.fail_broadcast {
                return Err("send failed".into());
            }
            Ok(())
        }
    }

    #[test]
    fn cadence_over_one_second() {
        let mut looper = ServerLoop::new(60, 20);
        let handle = looper.handle();

        let stopper = handle.clone();
        let timer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(1000));
            stopper.stop();
        });

        let mut hooks = CountingHooks::new();
        looper.run(&mut hooks).unwrap();
        timer.join().unwrap();

        assert!(
            (58..=62).contains(&hooks.simulates),
            "simulate count {} out of range",
            hooks.simulates
        );
        assert!(
            (18..=22).contains(&hooks.broadcasts),
            "broadcast count {} out of range",
            hooks.broadcasts
        );
        assert!(hooks.inputs > 0);
    }

    #[test]
    fn simulate_failure_is_fatal() {
        let mut looper = ServerLoop::new(60, 20);
        let mut hooks = CountingHooks::new();
        hooks.fail_simulate_at = Some(3);

        let result = looper.run(&mut hooks);
        assert!(result.is_err());
        assert!(!looper.handle().is_running());
        assert_eq!(result.unwrap_err().tick, 3);
    }

    #[test]
    fn broadcast_failure_is_survivable() {
        let mut looper = ServerLoop::new(120, 60);
        let handle = looper.handle();

        let mut hooks = CountingHooks::new();
        hooks.fail_broadcast = true;
        hooks.stop_after_ticks = Some(30);
        hooks.handle = Some(handle);

        // The loop must reach the stop condition despite broadcast errors.
        looper.run(&mut hooks).unwrap();
        assert!(hooks.broadcasts > 0);
        // Catch-up may squeeze in a tick or two after stop is requested.
        assert!((30..=33).contains(&hooks.simulates));
    }

    #[test]
    fn tick_counter_is_monotone() {
        let mut looper = ServerLoop::new(100, 50);
        let handle = looper.handle();
        let mut hooks = CountingHooks::new();
        hooks.stop_after_ticks = Some(10);
        hooks.handle = Some(handle);

        looper.run(&mut hooks).unwrap();
        assert_eq!(looper.tick(), hooks.simulates);
        assert_eq!(looper.stats().total_simulation_ticks, hooks.simulates);
        assert!(hooks.simulates >= 10);
    }
}
