//! Running the full probe and memoizing its result.

use std::sync::OnceLock;

use tracing::{info, warn};

use crate::source::{CpuidSource, HostCpuid};
use crate::topology::{ProcessorTopology, TopologyIssue};
use crate::vendor::BasicInfo;
use crate::walk;

/// Probes `source` from scratch.
///
/// Never fails: anything the decoder cannot make sense of produces the 1 core / 1 thread
/// topology flagged as unreliable.
pub fn probe<S: CpuidSource + ?Sized>(source: &S) -> ProcessorTopology {
    let basic = BasicInfo::read(source);

    if !source.is_available() || basic.max_basic_leaf == 0 {
        return degrade(basic, TopologyIssue::PlatformUnsupported);
    }

    if !basic.hyperthreading {
        // Without HTT the package has exactly one logical processor.
        let topo = ProcessorTopology::single(basic.vendor, false, true);
        info!(vendor = %topo.vendor, "single logical processor package");
        return topo;
    }

    let leaf = match walk::select_leaf(source, &basic) {
        Ok(leaf) => leaf,
        Err(issue) => return degrade(basic, issue),
    };

    let outcome = walk::walk(source, leaf);
    if let Some(issue) = outcome.issue {
        warn!(%issue, "processor topology decoded partially");
    }

    let topo = ProcessorTopology {
        vendor: basic.vendor,
        hyperthreading: true,
        physical_core_count: outcome.physical_core_count,
        logical_thread_count: outcome.logical_thread_count,
        smt_mask_width: outcome.smt_mask_width,
        core_mask_width: outcome.core_mask_width,
        reliable: outcome.issue.is_none(),
        leaf: Some(leaf),
        levels: outcome.levels,
        issue: outcome.issue,
    };
    info!(
        vendor = %topo.vendor,
        cores = topo.physical_core_count,
        threads = topo.logical_thread_count,
        reliable = topo.reliable,
        "processor topology"
    );
    topo
}

fn degrade(basic: BasicInfo, issue: TopologyIssue) -> ProcessorTopology {
    warn!(%issue, "falling back to a single-core topology");
    ProcessorTopology::degraded(basic.vendor, basic.hyperthreading, issue)
}

/// A register source plus its lazily computed topology.
///
/// The first call to [`CpuProbe::topology`] runs the probe; concurrent first callers wait
/// for that single run. Afterwards the topology is shared read-only.
#[derive(Debug)]
pub struct CpuProbe<S> {
    source: S,
    topology: OnceLock<ProcessorTopology>,
}

impl<S: CpuidSource> CpuProbe<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            topology: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn topology(&self) -> &ProcessorTopology {
        self.topology.get_or_init(|| probe(&self.source))
    }

    /// The topology if it has already been computed.
    pub fn cached(&self) -> Option<&ProcessorTopology> {
        self.topology.get()
    }
}

/// The process-wide probe of the host processor.
pub fn host_probe() -> &'static CpuProbe<HostCpuid> {
    static HOST: OnceLock<CpuProbe<HostCpuid>> = OnceLock::new();
    HOST.get_or_init(|| CpuProbe::new(HostCpuid))
}

/// Shorthand for `host_probe().topology()`.
pub fn host_topology() -> &'static ProcessorTopology {
    host_probe().topology()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CpuidResult, SyntheticCpuid};

    #[test]
    fn topology_is_computed_once() {
        let cpu = CpuProbe::new(SyntheticCpuid::new().with(0, 0, CpuidResult::new(1, 0, 0, 0)));
        assert!(cpu.cached().is_none());

        let first = cpu.topology().clone();
        let queries = cpu.source().queries().len();
        let second = cpu.topology();

        assert_eq!(&first, second);
        assert_eq!(cpu.source().queries().len(), queries);
        assert!(cpu.cached().is_some());
    }

    #[test]
    fn concurrent_first_callers_share_one_probe() {
        let cpu = CpuProbe::new(SyntheticCpuid::new().with(0, 0, CpuidResult::new(1, 0, 0, 0)));
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    assert_eq!(cpu.topology().physical_core_count, 1);
                });
            }
        });
        // Leaf 0 and leaf 1, once.
        assert_eq!(cpu.source().queries(), vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn host_probe_is_a_singleton() {
        assert!(std::ptr::eq(host_probe(), host_probe()));
        let topo = host_topology();
        assert!(topo.physical_core_count >= 1);
        assert!(topo.logical_thread_count >= 1);
    }
}
