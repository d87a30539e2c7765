//! Extended topology enumeration (CPUID leaves 1Fh and 0Bh).
//!
//! Each subleaf of the topology leaf describes one level of the x2APIC ID hierarchy. The
//! sequence has a vendor-defined length and ends at the first subleaf reporting a zero shift
//! and a zero logical processor count.
//!
//! Decoding takes two passes over the sequence. The first finds the package shift (the
//! shift of the last valid level); it bounds the x2APIC ID bits each level owns, so no level
//! can be decoded before it is known. The second pass classifies the levels and accumulates
//! core and thread counts.

use tracing::debug;

use crate::bits;
use crate::source::{CpuidResult, CpuidSource};
use crate::topology::{LevelType, TopologyIssue, TopologyLeaf, TopologyLevel};
use crate::vendor::BasicInfo;

/// Upper bound on subleaves visited per pass (ECX[7:0] is an 8-bit level number).
pub const MAX_SUBLEAVES: u32 = 256;

/// True for the subleaf that terminates a topology sequence.
///
/// Both the shift and the logical processor count must be zero; either one alone can
/// legitimately be zero on a valid level.
pub fn is_terminal(result: CpuidResult) -> bool {
    bits::topology_shift(result.eax) == 0 && bits::topology_logical_count(result.ebx) == 0
}

/// States of topology leaf selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeafSelection {
    TryExtendedLeaf,
    TryLegacyLeaf,
    Unsupported,
}

/// Picks the topology leaf to walk: 1Fh when it is populated, else 0Bh.
///
/// A leaf above the processor's maximum basic leaf is never queried; Intel parts answer such
/// queries with the data of the highest basic leaf.
pub fn select_leaf<S: CpuidSource + ?Sized>(
    source: &S,
    info: &BasicInfo,
) -> Result<TopologyLeaf, TopologyIssue> {
    let mut state = LeafSelection::TryExtendedLeaf;
    loop {
        let candidate = match state {
            LeafSelection::TryExtendedLeaf => TopologyLeaf::V2Extended,
            LeafSelection::TryLegacyLeaf => TopologyLeaf::Extended,
            LeafSelection::Unsupported => {
                return Err(TopologyIssue::UnsupportedLeaf {
                    leaf: TopologyLeaf::Extended.leaf(),
                });
            }
        };

        let leaf = candidate.leaf();
        if info.supports_leaf(leaf) && !is_terminal(source.cpuid(leaf, 0)) {
            debug!("selected topology leaf {leaf:#x}");
            return Ok(candidate);
        }
        debug!("topology leaf {leaf:#x} unsupported");

        state = match state {
            LeafSelection::TryExtendedLeaf => LeafSelection::TryLegacyLeaf,
            LeafSelection::TryLegacyLeaf | LeafSelection::Unsupported => {
                LeafSelection::Unsupported
            }
        };
    }
}

/// Counts accumulated by [`walk`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WalkOutcome {
    pub physical_core_count: u32,
    pub logical_thread_count: u32,
    pub smt_mask_width: u32,
    pub core_mask_width: u32,
    pub package_shift: u32,
    pub levels: Vec<TopologyLevel>,
    /// Set when the sequence was incomplete or inconsistent; counts are partial.
    pub issue: Option<TopologyIssue>,
}

impl WalkOutcome {
    pub fn reliable(&self) -> bool {
        self.issue.is_none()
    }
}

/// Pass 1: the shift of the last level before the terminator.
///
/// Returns `None` when no terminator shows up within [`MAX_SUBLEAVES`].
fn package_shift<S: CpuidSource + ?Sized>(source: &S, leaf: u32) -> Option<u32> {
    let mut shift = 0;
    for subleaf in 0..MAX_SUBLEAVES {
        let result = source.cpuid(leaf, subleaf);
        if is_terminal(result) {
            return Some(shift);
        }
        shift = bits::topology_shift(result.eax);
    }
    None
}

fn decode_level(subleaf: u32, result: CpuidResult, package_shift: u32) -> TopologyLevel {
    let shift_width = bits::topology_shift(result.eax);
    let x2apic_id = if shift_width >= 32 || shift_width > package_shift {
        0
    } else {
        bits::low_bits(result.edx >> shift_width, package_shift - shift_width)
    };
    TopologyLevel {
        subleaf,
        level_type: LevelType::from_raw(bits::topology_level_type(result.ecx)),
        shift_width,
        logical_count: bits::topology_logical_count(result.ebx),
        x2apic_id,
    }
}

/// Walks `leaf` and accumulates the topology of the querying package.
///
/// Unknown level types are recorded and skipped. A sequence without SMT and core levels, or
/// whose SMT shift exceeds the core shift, yields partial counts with an issue attached.
pub fn walk<S: CpuidSource + ?Sized>(source: &S, leaf: TopologyLeaf) -> WalkOutcome {
    let leaf = leaf.leaf();
    let mut out = WalkOutcome::default();

    let Some(package_shift) = package_shift(source, leaf) else {
        out.physical_core_count = 1;
        out.logical_thread_count = 1;
        out.issue = Some(TopologyIssue::MalformedTopology {
            reason: "topology leaf never terminates",
        });
        return out;
    };
    out.package_shift = package_shift;

    let mut saw_smt = false;
    let mut saw_core = false;
    for subleaf in 0..MAX_SUBLEAVES {
        let result = source.cpuid(leaf, subleaf);
        if is_terminal(result) {
            break;
        }

        let level = decode_level(subleaf, result, package_shift);
        debug!(
            subleaf,
            level_type = %level.level_type,
            shift = level.shift_width,
            logical = level.logical_count,
            x2apic_id = level.x2apic_id,
            "topology level"
        );

        match level.level_type {
            LevelType::Smt => {
                saw_smt = true;
                out.smt_mask_width = level.shift_width;
            }
            LevelType::Core => {
                saw_core = true;
                out.core_mask_width = level.shift_width;
                let cores = level
                    .shift_width
                    .checked_sub(out.smt_mask_width)
                    .and_then(|width| 1u32.checked_shl(width))
                    .unwrap_or(0);
                out.physical_core_count = out.physical_core_count.saturating_add(cores);
                out.logical_thread_count = out
                    .logical_thread_count
                    .saturating_add(level.logical_count);
            }
            LevelType::Package | LevelType::Unknown(_) => {}
        }
        out.levels.push(level);
    }

    out.issue = if !saw_core {
        Some(TopologyIssue::MalformedTopology {
            reason: "no core level reported",
        })
    } else if !saw_smt {
        Some(TopologyIssue::MalformedTopology {
            reason: "no SMT level reported",
        })
    } else if out.smt_mask_width > out.core_mask_width {
        Some(TopologyIssue::MalformedTopology {
            reason: "SMT shift exceeds core shift",
        })
    } else {
        None
    };

    out.physical_core_count = out.physical_core_count.max(1);
    out.logical_thread_count = out.logical_thread_count.max(1);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::leaf;
    use crate::source::SyntheticCpuid;

    fn level(
        shift: u32,
        count: u32,
        level_number: u32,
        level_type: u32,
        x2apic: u32,
    ) -> CpuidResult {
        CpuidResult::new(shift, count, level_number | (level_type << 8), x2apic)
    }

    fn info(max_basic_leaf: u32) -> BasicInfo {
        BasicInfo {
            vendor: Default::default(),
            max_basic_leaf,
            hyperthreading: true,
            legacy_logical_count: 0,
        }
    }

    #[test]
    fn terminal_requires_both_fields_zero() {
        assert!(is_terminal(CpuidResult::ZERO));
        assert!(is_terminal(CpuidResult::new(0xFFFF_FFE0, 0xFFFF_0000, 0x0000_0002, 5)));
        assert!(!is_terminal(CpuidResult::new(0, 1, 0x100, 0)));
        assert!(!is_terminal(CpuidResult::new(1, 0, 0x100, 0)));
    }

    #[test]
    fn prefers_v2_leaf_when_populated() {
        let src = SyntheticCpuid::new()
            .with(leaf::V2_EXTENDED_TOPOLOGY, 0, level(1, 2, 0, 1, 0))
            .with(leaf::EXTENDED_TOPOLOGY, 0, level(1, 2, 0, 1, 0));
        assert_eq!(select_leaf(&src, &info(0x1F)), Ok(TopologyLeaf::V2Extended));
    }

    #[test]
    fn falls_back_to_legacy_leaf() {
        let src = SyntheticCpuid::new().with(leaf::EXTENDED_TOPOLOGY, 0, level(1, 2, 0, 1, 0));
        assert_eq!(select_leaf(&src, &info(0x1F)), Ok(TopologyLeaf::Extended));
        assert_eq!(src.subleaves_queried(leaf::V2_EXTENDED_TOPOLOGY), vec![0]);
    }

    #[test]
    fn leaves_above_max_basic_leaf_are_not_queried() {
        let src = SyntheticCpuid::new()
            .with(leaf::V2_EXTENDED_TOPOLOGY, 0, level(1, 2, 0, 1, 0))
            .with(leaf::EXTENDED_TOPOLOGY, 0, level(1, 2, 0, 1, 0));
        assert_eq!(select_leaf(&src, &info(0x0D)), Ok(TopologyLeaf::Extended));
        assert!(src.subleaves_queried(leaf::V2_EXTENDED_TOPOLOGY).is_empty());

        assert_eq!(
            select_leaf(&src, &info(0x0A)),
            Err(TopologyIssue::UnsupportedLeaf { leaf: 0xB })
        );
    }

    #[test]
    fn x2apic_id_is_masked_by_package_shift() {
        // x2APIC ID 0b1_0110_1: thread 1, core 0b0110, package bit above shift 5.
        let id = 0b1011_01;
        let smt = decode_level(0, level(1, 2, 0, 1, id), 5);
        let core = decode_level(1, level(5, 32, 1, 2, id), 5);
        assert_eq!(smt.x2apic_id, 0b0110);
        assert_eq!(core.x2apic_id, 0);
    }

    #[test]
    fn never_terminating_sequence_is_malformed() {
        let mut src = SyntheticCpuid::new();
        for subleaf in 0..MAX_SUBLEAVES {
            src.set(leaf::EXTENDED_TOPOLOGY, subleaf, level(1, 2, subleaf, 1, 0));
        }
        let out = walk(&src, TopologyLeaf::Extended);
        assert!(!out.reliable());
        assert_eq!(out.physical_core_count, 1);
        assert_eq!(src.subleaves_queried(leaf::EXTENDED_TOPOLOGY).len(), MAX_SUBLEAVES as usize);
    }

    #[test]
    fn missing_core_level_keeps_partial_counts() {
        let src = SyntheticCpuid::new().with(leaf::EXTENDED_TOPOLOGY, 0, level(1, 2, 0, 1, 0));
        let out = walk(&src, TopologyLeaf::Extended);
        assert_eq!(
            out.issue,
            Some(TopologyIssue::MalformedTopology {
                reason: "no core level reported"
            })
        );
        assert_eq!(out.smt_mask_width, 1);
        assert_eq!(out.physical_core_count, 1);
        assert_eq!(out.logical_thread_count, 1);
    }

    #[test]
    fn inverted_shifts_are_malformed() {
        let src = SyntheticCpuid::new()
            .with(leaf::EXTENDED_TOPOLOGY, 0, level(4, 2, 0, 1, 0))
            .with(leaf::EXTENDED_TOPOLOGY, 1, level(2, 4, 1, 2, 0));
        let out = walk(&src, TopologyLeaf::Extended);
        assert!(!out.reliable());
        assert_eq!(out.physical_core_count, 1);
        assert_eq!(out.logical_thread_count, 4);
    }
}
