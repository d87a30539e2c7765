use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hwprobe_cpuid::{host_topology, ProcessorTopology};
use hwprobe_perf::stats::Summary;
use hwprobe_perf::timer::{self, DEFAULT_RUNS, DEFAULT_WAIT};
use hwprobe_perf::{TimerConfig, TimerReport};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const DEFAULT_WAIT_US: u64 = DEFAULT_WAIT.as_micros() as u64;

#[derive(Parser, Debug)]
#[command(
    name = "hwprobe",
    about = "Report processor topology (cores, threads, SMT layout) and timer resolution."
)]
struct Args {
    /// Print the report as JSON
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,

    /// Print every decoded topology level
    #[arg(long, action = clap::ArgAction::SetTrue)]
    levels: bool,

    /// Also measure clock granularity and sleep/spin overshoot
    #[arg(long, action = clap::ArgAction::SetTrue)]
    timers: bool,

    /// Samples per timer measurement
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RUNS)]
    timer_runs: usize,

    /// Wait duration measured by the timer probe, in microseconds
    #[arg(long, value_name = "MICROS", default_value_t = DEFAULT_WAIT_US)]
    timer_wait_us: u64,

    /// Threads for the concurrent spin measurement [default: one per logical thread]
    #[arg(long, value_name = "N")]
    timer_threads: Option<usize>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    topology: &'a ProcessorTopology,
    #[serde(skip_serializing_if = "Option::is_none")]
    timers: Option<TimerReport>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Topology detection degrades instead of failing; only output errors end up here.
    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
    }
    ExitCode::SUCCESS
}

fn run(args: &Args) -> anyhow::Result<()> {
    let topology = host_topology();
    let timers = args.timers.then(|| {
        TimerReport::probe(TimerConfig {
            wait: Duration::from_micros(args.timer_wait_us),
            runs: args.timer_runs,
            threads: args
                .timer_threads
                .unwrap_or_else(|| timer::worker_threads(topology)),
            ..TimerConfig::default()
        })
    });

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let report = Report { topology, timers };
        serde_json::to_writer_pretty(&mut out, &report).context("serialize report")?;
        writeln!(out)?;
    } else {
        write_topology(&mut out, topology, args.levels)?;
        if let Some(timers) = &timers {
            write_timers(&mut out, timers)?;
        }
    }
    out.flush().context("flush stdout")?;
    Ok(())
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

fn write_topology(
    out: &mut impl Write,
    topo: &ProcessorTopology,
    levels: bool,
) -> io::Result<()> {
    writeln!(out, "vendor:           {}", topo.vendor)?;
    writeln!(out, "hyperthreading:   {}", yes_no(topo.hyperthreading))?;
    writeln!(out, "physical cores:   {}", topo.physical_core_count)?;
    writeln!(out, "logical threads:  {}", topo.logical_thread_count)?;
    writeln!(out, "smt mask width:   {}", topo.smt_mask_width)?;
    writeln!(out, "core mask width:  {}", topo.core_mask_width)?;
    writeln!(out, "reliable:         {}", yes_no(topo.reliable))?;
    if let Some(leaf) = topo.leaf {
        writeln!(out, "topology leaf:    {:#x}", leaf.leaf())?;
    }
    if let Some(issue) = &topo.issue {
        writeln!(out, "note:             {issue}")?;
    }
    if levels {
        for level in &topo.levels {
            writeln!(
                out,
                "  level {}: type={} shift={} logical={} x2apic_id={:#x}",
                level.subleaf,
                level.level_type,
                level.shift_width,
                level.logical_count,
                level.x2apic_id
            )?;
        }
    }
    Ok(())
}

fn write_summary(out: &mut impl Write, label: &str, summary: Option<&Summary>) -> io::Result<()> {
    let Some(s) = summary else {
        return writeln!(out, "{label}: no samples");
    };
    let ms = |ns: f64| ns / 1_000_000.0;
    writeln!(
        out,
        "{label}: mean {:.3}ms, std dev {:.1}us, median {:.3}ms, quartiles {:.3}ms / {:.3}ms ({:?})",
        ms(s.mean),
        s.std_dev / 1_000.0,
        ms(s.median),
        ms(s.first_quartile),
        ms(s.third_quartile),
        s.shape
    )
}

fn write_timers(out: &mut impl Write, timers: &TimerReport) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "timer wait:       {:.3}ms",
        timers.wait_ns as f64 / 1_000_000.0
    )?;
    match timers.granularity_ns {
        Some(ns) => writeln!(out, "clock step:       {ns}ns")?,
        None => writeln!(out, "clock step:       not observed")?,
    }
    write_summary(out, "sleep     ", timers.sleep.as_ref())?;
    write_summary(out, "spin      ", timers.spin_hot.as_ref())?;
    write_summary(out, "spin/yield", timers.spin_yield.as_ref())?;
    writeln!(out, "spin threads:     {}", timers.threads)?;
    write_summary(out, "per thread", timers.spin_threads.as_ref())?;
    Ok(())
}
