//! x86 processor topology detection via CPUID.
//!
//! The crate reads the vendor string and HTT flag from the basic leaves, then walks the
//! extended topology leaf (1Fh, falling back to 0Bh) to count physical cores and logical
//! threads of the package the calling thread runs on:
//!
//! - [`CpuidSource`]: register query abstraction ([`HostCpuid`] for the real processor,
//!   [`SyntheticCpuid`] for canned register tables)
//! - [`bits`]: bit-field extraction over raw register values
//! - [`walk`]: topology leaf selection and the two-pass level walk
//! - [`ProcessorTopology`]: the decoded, immutable result
//! - [`CpuProbe`]: a source paired with its memoized topology
//!
//! Detection never fails hard. Unsupported leaves, malformed level sequences and platforms
//! without CPUID all yield a conservative 1 core / 1 thread topology marked unreliable.

pub mod bits;
pub mod walk;

mod probe;
mod source;
mod topology;
mod vendor;

pub use probe::{host_probe, host_topology, probe, CpuProbe};
pub use source::{CpuidResult, CpuidSource, HostCpuid, Register, SyntheticCpuid};
pub use topology::{LevelType, ProcessorTopology, TopologyIssue, TopologyLeaf, TopologyLevel};
pub use vendor::{BasicInfo, VendorId};
