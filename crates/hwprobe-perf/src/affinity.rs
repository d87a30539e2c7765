//! Thread placement.
//!
//! Placement is currently a no-op: the core index is validated against the topology and the
//! thread is left wherever the scheduler put it.

use std::thread::Thread;

use hwprobe_cpuid::ProcessorTopology;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AffinityError {
    #[error("core index {index} out of range (topology has {cores} physical cores)")]
    CoreOutOfRange { index: u32, cores: u32 },
}

/// Requests that `thread` run on physical core `core_index`.
pub fn set_thread_affinity(
    topology: &ProcessorTopology,
    core_index: u32,
    thread: &Thread,
) -> Result<(), AffinityError> {
    if core_index >= topology.physical_core_count {
        return Err(AffinityError::CoreOutOfRange {
            index: core_index,
            cores: topology.physical_core_count,
        });
    }
    debug!(core_index, thread = ?thread.id(), "thread affinity request ignored");
    Ok(())
}
