//! The decoded processor topology.

use std::fmt;

use thiserror::Error;

use crate::vendor::VendorId;

/// Topology level type, from CPUID.(0Bh|1Fh):ECX[15:8].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LevelType {
    Smt,
    Core,
    Package,
    /// Reserved or not-yet-understood level type (raw encoding kept).
    Unknown(u8),
}

impl LevelType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => LevelType::Smt,
            2 => LevelType::Core,
            3 => LevelType::Package,
            other => LevelType::Unknown(other as u8),
        }
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelType::Smt => f.write_str("SMT"),
            LevelType::Core => f.write_str("Core"),
            LevelType::Package => f.write_str("Package"),
            LevelType::Unknown(raw) => write!(f, "Unknown({raw})"),
        }
    }
}

/// One subleaf of the extended topology leaf, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TopologyLevel {
    pub subleaf: u32,
    pub level_type: LevelType,
    pub shift_width: u32,
    pub logical_count: u32,
    /// x2APIC ID bits belonging to this level (masked by the package shift).
    pub x2apic_id: u32,
}

/// Extended topology leaf that produced a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TopologyLeaf {
    /// Leaf 1Fh.
    V2Extended,
    /// Leaf 0Bh.
    Extended,
}

impl TopologyLeaf {
    pub const fn leaf(self) -> u32 {
        match self {
            TopologyLeaf::V2Extended => crate::bits::leaf::V2_EXTENDED_TOPOLOGY,
            TopologyLeaf::Extended => crate::bits::leaf::EXTENDED_TOPOLOGY,
        }
    }
}

/// Why a topology is less informative than it could be.
///
/// None of these abort detection: they are recorded on the result and the counts fall back
/// to conservative values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TopologyIssue {
    #[error("cpuid leaf {leaf:#x} does not enumerate topology")]
    UnsupportedLeaf { leaf: u32 },

    #[error("malformed topology: {reason}")]
    MalformedTopology { reason: &'static str },

    #[error("cpuid is not available on this platform")]
    PlatformUnsupported,
}

/// Processor topology as seen from the probing thread's package.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProcessorTopology {
    pub vendor: VendorId,
    /// CPUID.1:EDX[HTT].
    pub hyperthreading: bool,
    pub physical_core_count: u32,
    pub logical_thread_count: u32,
    pub smt_mask_width: u32,
    pub core_mask_width: u32,
    /// False when the counts are a conservative guess rather than decoded values.
    pub reliable: bool,
    pub leaf: Option<TopologyLeaf>,
    pub levels: Vec<TopologyLevel>,
    pub issue: Option<TopologyIssue>,
}

impl ProcessorTopology {
    /// The 1 core / 1 thread topology.
    pub fn single(vendor: VendorId, hyperthreading: bool, reliable: bool) -> Self {
        Self {
            vendor,
            hyperthreading,
            physical_core_count: 1,
            logical_thread_count: 1,
            smt_mask_width: 0,
            core_mask_width: 0,
            reliable,
            leaf: None,
            levels: Vec::new(),
            issue: None,
        }
    }

    /// Conservative fallback used whenever topology cannot be decoded.
    pub fn degraded(vendor: VendorId, hyperthreading: bool, issue: TopologyIssue) -> Self {
        Self {
            issue: Some(issue),
            ..Self::single(vendor, hyperthreading, false)
        }
    }

    /// Logical threads per physical core, rounded down and never below 1.
    pub fn threads_per_core(&self) -> u32 {
        (self.logical_thread_count / self.physical_core_count.max(1)).max(1)
    }

    pub fn smt_active(&self) -> bool {
        self.logical_thread_count > self.physical_core_count
    }
}
