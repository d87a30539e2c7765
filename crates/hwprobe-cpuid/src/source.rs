//! CPUID register sources.
//!
//! Everything above this module talks to a [`CpuidSource`] rather than to the instruction
//! directly, so the topology decoder can be driven from canned register tables in tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// A CPUID result tuple (EAX, EBX, ECX, EDX).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl CpuidResult {
    pub const ZERO: Self = Self {
        eax: 0,
        ebx: 0,
        ecx: 0,
        edx: 0,
    };

    pub const fn new(eax: u32, ebx: u32, ecx: u32, edx: u32) -> Self {
        Self { eax, ebx, ecx, edx }
    }

    /// Registers in positional order (0 = EAX .. 3 = EDX).
    pub const fn regs(self) -> [u32; 4] {
        [self.eax, self.ebx, self.ecx, self.edx]
    }

    pub const fn reg(self, reg: Register) -> u32 {
        match reg {
            Register::Eax => self.eax,
            Register::Ebx => self.ebx,
            Register::Ecx => self.ecx,
            Register::Edx => self.edx,
        }
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

impl From<[u32; 4]> for CpuidResult {
    fn from(regs: [u32; 4]) -> Self {
        Self::new(regs[0], regs[1], regs[2], regs[3])
    }
}

/// Positional register names for a [`CpuidResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Eax = 0,
    Ebx = 1,
    Ecx = 2,
    Edx = 3,
}

/// Something that can answer CPUID(leaf, subleaf).
///
/// Each call is an independent read: implementations must not coalesce or cache queries.
pub trait CpuidSource {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult;

    /// Whether the source is backed by a working CPUID implementation.
    ///
    /// Sources that only ever return zero (the non-x86 stub) report `false`.
    fn is_available(&self) -> bool {
        true
    }
}

impl<T: CpuidSource + ?Sized> CpuidSource for &T {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        (**self).cpuid(leaf, subleaf)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<T: CpuidSource + ?Sized> CpuidSource for Box<T> {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        (**self).cpuid(leaf, subleaf)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// The processor this process is running on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCpuid;

impl CpuidSource for HostCpuid {
    #[cfg(target_arch = "x86_64")]
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        // SAFETY: CPUID is architecturally guaranteed on x86_64 and only reads
        // processor identification state.
        let r = unsafe { core::arch::x86_64::__cpuid_count(leaf, subleaf) };
        CpuidResult::new(r.eax, r.ebx, r.ecx, r.edx)
    }

    #[cfg(target_arch = "x86")]
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        if !core::arch::x86::has_cpuid() {
            return CpuidResult::ZERO;
        }
        // SAFETY: `has_cpuid` confirmed the instruction exists; it only reads
        // processor identification state.
        let r = unsafe { core::arch::x86::__cpuid_count(leaf, subleaf) };
        CpuidResult::new(r.eax, r.ebx, r.ecx, r.edx)
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn cpuid(&self, _leaf: u32, _subleaf: u32) -> CpuidResult {
        CpuidResult::ZERO
    }

    fn is_available(&self) -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            true
        }
        #[cfg(target_arch = "x86")]
        {
            core::arch::x86::has_cpuid()
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        {
            false
        }
    }
}

/// A canned CPUID table.
///
/// Unprogrammed (leaf, subleaf) pairs read as zero, which is what real hardware reports for
/// out-of-range topology subleaves. Every query is logged so tests can assert exactly which
/// subleaves a walk touched.
#[derive(Debug, Default)]
pub struct SyntheticCpuid {
    leaves: BTreeMap<(u32, u32), CpuidResult>,
    queries: Mutex<Vec<(u32, u32)>>,
}

impl SyntheticCpuid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs a (leaf, subleaf) pair, replacing all four registers of any previous entry.
    pub fn set(&mut self, leaf: u32, subleaf: u32, result: CpuidResult) -> &mut Self {
        self.leaves.insert((leaf, subleaf), result);
        self
    }

    pub fn with(mut self, leaf: u32, subleaf: u32, result: CpuidResult) -> Self {
        self.set(leaf, subleaf, result);
        self
    }

    /// All queries issued so far, in order.
    pub fn queries(&self) -> Vec<(u32, u32)> {
        match self.queries.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Subleaves of `leaf` queried so far, in order (duplicates kept).
    pub fn subleaves_queried(&self, leaf: u32) -> Vec<u32> {
        self.queries()
            .into_iter()
            .filter(|&(l, _)| l == leaf)
            .map(|(_, s)| s)
            .collect()
    }
}

impl CpuidSource for SyntheticCpuid {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        match self.queries.lock() {
            Ok(mut log) => log.push((leaf, subleaf)),
            Err(poisoned) => poisoned.into_inner().push((leaf, subleaf)),
        }
        self.leaves
            .get(&(leaf, subleaf))
            .copied()
            .unwrap_or(CpuidResult::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_returns_zero_for_unprogrammed_leaves() {
        let src = SyntheticCpuid::new().with(1, 0, CpuidResult::new(1, 2, 3, 4));
        assert_eq!(src.cpuid(1, 0), CpuidResult::new(1, 2, 3, 4));
        assert_eq!(src.cpuid(1, 1), CpuidResult::ZERO);
        assert_eq!(src.cpuid(7, 0), CpuidResult::ZERO);
        assert_eq!(src.queries(), vec![(1, 0), (1, 1), (7, 0)]);
    }

    #[test]
    fn reprogramming_replaces_all_registers() {
        let mut src = SyntheticCpuid::new();
        src.set(0xB, 0, CpuidResult::new(1, 2, 0x100, 7));
        src.set(0xB, 0, CpuidResult::new(4, 0, 0, 0));
        assert_eq!(src.cpuid(0xB, 0), CpuidResult::new(4, 0, 0, 0));
    }

    #[test]
    fn register_accessors_are_positional() {
        let r = CpuidResult::from([10, 11, 12, 13]);
        assert_eq!(r.reg(Register::Eax), 10);
        assert_eq!(r.reg(Register::Ebx), 11);
        assert_eq!(r.reg(Register::Ecx), 12);
        assert_eq!(r.reg(Register::Edx), 13);
        assert_eq!(r.regs(), [10, 11, 12, 13]);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn host_leaf0_reports_at_least_one_basic_leaf() {
        assert!(HostCpuid.is_available());
        assert!(HostCpuid.cpuid(0, 0).eax >= 1);
    }
}
