//! Timer resolution probing.
//!
//! Measures how finely the monotonic clock ticks and how far short sleeps and spin waits
//! overshoot their target. All measurements use [`std::time::Instant`].

use std::thread;
use std::time::{Duration, Instant};

use hwprobe_cpuid::ProcessorTopology;
use tracing::{debug, warn};

use crate::stats::{RunningStat, Samples, Summary};

/// Default wait measured by [`TimerReport::probe`].
pub const DEFAULT_WAIT: Duration = Duration::from_millis(2);

/// Default number of samples per measurement.
pub const DEFAULT_RUNS: usize = 200;

/// How a spin wait spends time between clock reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SpinMode {
    /// Re-read the clock immediately.
    Hot,
    /// Yield the time slice between reads.
    Yield,
}

/// Busy-waits until at least `duration` has elapsed and returns the actual elapsed time.
pub fn spin_wait(duration: Duration, mode: SpinMode) -> Duration {
    let start = Instant::now();
    loop {
        let elapsed = start.elapsed();
        if elapsed >= duration {
            return elapsed;
        }
        match mode {
            SpinMode::Hot => std::hint::spin_loop(),
            SpinMode::Yield => thread::yield_now(),
        }
    }
}

/// Smallest non-zero step between consecutive clock readings over `samples` reads.
///
/// Returns `None` if the clock never advanced.
pub fn clock_granularity(samples: usize) -> Option<Duration> {
    let mut best: Option<Duration> = None;
    let mut prev = Instant::now();
    for _ in 0..samples {
        let now = Instant::now();
        let step = now.duration_since(prev);
        if !step.is_zero() && best.map_or(true, |b| step < b) {
            best = Some(step);
        }
        prev = now;
    }
    best
}

fn nanos(d: Duration) -> f64 {
    d.as_nanos() as f64
}

/// Elapsed nanoseconds of `runs` calls to `thread::sleep(duration)`.
pub fn measure_sleep(duration: Duration, runs: usize) -> Option<Summary> {
    let mut samples = Samples::with_capacity(runs);
    for _ in 0..runs {
        let start = Instant::now();
        thread::sleep(duration);
        samples.push(nanos(start.elapsed()));
    }
    samples.summary()
}

/// Elapsed nanoseconds of `runs` spin waits of `duration`.
pub fn measure_spin(duration: Duration, mode: SpinMode, runs: usize) -> Option<Summary> {
    let mut samples = Samples::with_capacity(runs);
    for _ in 0..runs {
        samples.push(nanos(spin_wait(duration, mode)));
    }
    samples.summary()
}

/// Mean elapsed nanoseconds of `runs` spin waits on each of `threads` concurrent threads.
///
/// The summary is taken over the per-thread means, so its `count` is the number of threads
/// that completed. `None` when no thread ran a wait.
pub fn measure_spin_threads(
    duration: Duration,
    mode: SpinMode,
    runs: usize,
    threads: usize,
) -> Option<Summary> {
    if runs == 0 {
        return None;
    }
    let means: Vec<f64> = thread::scope(|s| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(move || {
                    let stat: RunningStat = (0..runs)
                        .map(|_| nanos(spin_wait(duration, mode)))
                        .collect();
                    stat.mean()
                })
            })
            .collect();
        workers
            .into_iter()
            .filter_map(|worker| match worker.join() {
                Ok(mean) => Some(mean),
                Err(_) => {
                    warn!("spin worker panicked");
                    None
                }
            })
            .collect()
    });
    means.into_iter().collect::<Samples>().summary()
}

/// One worker per logical thread the topology reports, or per unit of
/// [`thread::available_parallelism`] when the topology is only a guess.
pub fn worker_threads(topology: &ProcessorTopology) -> usize {
    if topology.reliable {
        return usize::try_from(topology.logical_thread_count)
            .unwrap_or(1)
            .max(1);
    }
    thread::available_parallelism().map_or(1, |n| n.get())
}

/// Parameters for [`TimerReport::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub wait: Duration,
    pub runs: usize,
    pub granularity_samples: usize,
    /// Concurrent threads for the multi-threaded spin measurement.
    pub threads: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            wait: DEFAULT_WAIT,
            runs: DEFAULT_RUNS,
            granularity_samples: 10_000,
            threads: worker_threads(hwprobe_cpuid::host_topology()),
        }
    }
}

/// Clock granularity plus sleep and spin overshoot for one wait duration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimerReport {
    pub wait_ns: u64,
    pub granularity_ns: Option<u64>,
    pub sleep: Option<Summary>,
    pub spin_hot: Option<Summary>,
    pub spin_yield: Option<Summary>,
    pub threads: usize,
    /// Per-thread mean of yielding spin waits, one sample per thread.
    pub spin_threads: Option<Summary>,
}

impl TimerReport {
    pub fn probe(config: TimerConfig) -> Self {
        let granularity = clock_granularity(config.granularity_samples);
        debug!(?granularity, "clock granularity");

        let report = Self {
            wait_ns: u64::try_from(config.wait.as_nanos()).unwrap_or(u64::MAX),
            granularity_ns: granularity
                .map(|g| u64::try_from(g.as_nanos()).unwrap_or(u64::MAX)),
            sleep: measure_sleep(config.wait, config.runs),
            spin_hot: measure_spin(config.wait, SpinMode::Hot, config.runs),
            spin_yield: measure_spin(config.wait, SpinMode::Yield, config.runs),
            threads: config.threads,
            spin_threads: measure_spin_threads(
                config.wait,
                SpinMode::Yield,
                config.runs,
                config.threads,
            ),
        };
        debug!(?report, "timer report");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_wait_waits_at_least_the_target() {
        let target = Duration::from_micros(200);
        assert!(spin_wait(target, SpinMode::Hot) >= target);
        assert!(spin_wait(target, SpinMode::Yield) >= target);
    }

    #[test]
    fn zero_wait_returns_immediately() {
        assert!(spin_wait(Duration::ZERO, SpinMode::Hot) < Duration::from_secs(1));
    }

    #[test]
    fn zero_runs_produce_no_summary() {
        assert!(measure_sleep(Duration::from_micros(1), 0).is_none());
        assert!(measure_spin(Duration::from_micros(1), SpinMode::Hot, 0).is_none());
        assert!(measure_spin_threads(Duration::from_micros(1), SpinMode::Yield, 0, 4).is_none());
    }

    #[test]
    fn threaded_spin_has_one_sample_per_thread() {
        let wait = Duration::from_micros(100);
        let s = measure_spin_threads(wait, SpinMode::Yield, 10, 3).unwrap();
        assert_eq!(s.count, 3);
        assert!(s.min >= wait.as_nanos() as f64);
        assert!(measure_spin_threads(wait, SpinMode::Hot, 10, 0).is_none());
    }

    #[test]
    fn worker_threads_follow_reliable_topology() {
        let mut topo = ProcessorTopology::single(Default::default(), true, true);
        topo.logical_thread_count = 6;
        assert_eq!(worker_threads(&topo), 6);

        topo.reliable = false;
        let fallback = thread::available_parallelism().map_or(1, |n| n.get());
        assert_eq!(worker_threads(&topo), fallback);
    }
}
