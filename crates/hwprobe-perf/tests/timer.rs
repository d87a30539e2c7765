use std::time::Duration;

use hwprobe_cpuid::host_topology;
use hwprobe_perf::timer::{clock_granularity, measure_spin, measure_spin_threads, worker_threads};
use hwprobe_perf::{SpinMode, TimerConfig, TimerReport};

#[test]
fn clock_advances() {
    let granularity = clock_granularity(100_000).expect("clock never advanced");
    assert!(granularity < Duration::from_millis(100));
}

#[test]
fn spin_summary_never_undershoots() {
    let wait = Duration::from_micros(100);
    let s = measure_spin(wait, SpinMode::Hot, 20).unwrap();
    assert_eq!(s.count, 20);
    assert!(s.min >= wait.as_nanos() as f64);
}

#[test]
fn report_covers_every_measurement() {
    let report = TimerReport::probe(TimerConfig {
        wait: Duration::from_micros(50),
        runs: 5,
        granularity_samples: 1_000,
        threads: 2,
    });
    assert_eq!(report.wait_ns, 50_000);
    assert_eq!(report.threads, 2);
    assert_eq!(report.spin_threads.unwrap().count, 2);
    for summary in [report.sleep, report.spin_hot, report.spin_yield] {
        let summary = summary.unwrap();
        assert_eq!(summary.count, 5);
        assert!(summary.min >= 50_000.0);
    }
}

#[test]
fn threaded_spin_runs_one_worker_per_host_thread() {
    let threads = worker_threads(host_topology());
    assert!(threads >= 1);
    let s = measure_spin_threads(Duration::from_micros(50), SpinMode::Yield, 4, threads).unwrap();
    assert_eq!(s.count, threads as u64);
    assert!(s.min >= 50_000.0);
}
