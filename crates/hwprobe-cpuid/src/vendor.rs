//! Leaf 0 / leaf 1 identification.

use std::fmt;

use crate::bits::{self, leaf};
use crate::source::{CpuidResult, CpuidSource};

/// The 12-byte vendor identification string from CPUID leaf 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VendorId([u8; 12]);

impl VendorId {
    pub const INTEL: VendorId = VendorId(*b"GenuineIntel");
    pub const AMD: VendorId = VendorId(*b"AuthenticAMD");

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Assembles the vendor string from leaf 0. The byte order is EBX, EDX, ECX.
    pub fn from_leaf0(result: CpuidResult) -> Self {
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&result.ebx.to_le_bytes());
        bytes[4..8].copy_from_slice(&result.edx.to_le_bytes());
        bytes[8..12].copy_from_slice(&result.ecx.to_le_bytes());
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// The vendor string, if it is printable ASCII.
    pub fn as_str(&self) -> Option<&str> {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            std::str::from_utf8(&self.0).ok()
        } else {
            None
        }
    }

    pub fn is_intel(&self) -> bool {
        *self == Self::INTEL
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => f.write_str("unknown"),
        }
    }
}

impl fmt::Debug for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "VendorId({s:?})"),
            None => write!(f, "VendorId({:02x?})", self.0),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for VendorId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identification read from leaves 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicInfo {
    pub vendor: VendorId,
    /// Highest basic leaf, CPUID.0:EAX.
    pub max_basic_leaf: u32,
    /// CPUID.1:EDX[HTT].
    pub hyperthreading: bool,
    /// CPUID.1:EBX[23:16].
    pub legacy_logical_count: u32,
}

impl BasicInfo {
    pub fn read<S: CpuidSource + ?Sized>(source: &S) -> Self {
        let leaf0 = source.cpuid(leaf::VENDOR_AND_MAX_BASIC, 0);
        let vendor = VendorId::from_leaf0(leaf0);
        let max_basic_leaf = leaf0.eax;

        let (hyperthreading, legacy_logical_count) =
            if max_basic_leaf >= leaf::VERSION_AND_FEATURES {
                let leaf1 = source.cpuid(leaf::VERSION_AND_FEATURES, 0);
                (
                    bits::bits_set(leaf1.edx, bits::LEAF1_EDX_HTT),
                    bits::leaf1_logical_count(leaf1.ebx),
                )
            } else {
                (false, 0)
            };

        Self {
            vendor,
            max_basic_leaf,
            hyperthreading,
            legacy_logical_count,
        }
    }

    pub fn supports_leaf(&self, leaf: u32) -> bool {
        leaf <= self.max_basic_leaf
    }
}
