//! Bit-field helpers over plain register values.
//!
//! Ranges use the `[MSB:LSB]` notation of the Intel SDM, with both ends inclusive.

/// Extracts `reg[end:start]`.
///
/// `start <= end <= 31` is required. The full-width range `[31:0]` returns `reg` unchanged
/// instead of overflowing the mask shift.
pub fn extract_field(reg: u32, start: u32, end: u32) -> u32 {
    debug_assert!(
        start <= end && end <= 31,
        "invalid bit range [{end}:{start}]"
    );
    let end = end.min(31);
    if start > end {
        return 0;
    }
    let width = end - start + 1;
    if width == 32 {
        return reg;
    }
    (reg >> start) & ((1u32 << width) - 1)
}

/// Returns the low `width` bits of `value`. Widths of 32 or more keep every bit.
pub fn low_bits(value: u32, width: u32) -> u32 {
    match width {
        0 => 0,
        1..=31 => value & ((1u32 << width) - 1),
        _ => value,
    }
}

/// True when *any* bit of `mask` is set in `reg`.
pub fn bits_set(reg: u32, mask: u32) -> bool {
    (reg & mask) != 0
}

/// True when *every* bit of `mask` is set in `reg`.
pub fn all_bits_set(reg: u32, mask: u32) -> bool {
    (reg & mask) == mask
}

/// CPUID leaf numbers used by the probe.
pub mod leaf {
    pub const VENDOR_AND_MAX_BASIC: u32 = 0x0000_0000;
    pub const VERSION_AND_FEATURES: u32 = 0x0000_0001;
    pub const EXTENDED_TOPOLOGY: u32 = 0x0000_000B;
    pub const V2_EXTENDED_TOPOLOGY: u32 = 0x0000_001F;
}

/// CPUID.1:EDX[28] - the package may report more than one logical processor.
pub const LEAF1_EDX_HTT: u32 = 1 << 28;

/// CPUID.1:EBX[23:16] - maximum addressable logical processor IDs in the package.
pub fn leaf1_logical_count(ebx: u32) -> u32 {
    extract_field(ebx, 16, 23)
}

/// CPUID.(0Bh|1Fh):EAX[4:0] - x2APIC ID shift to reach the next level.
pub fn topology_shift(eax: u32) -> u32 {
    extract_field(eax, 0, 4)
}

/// CPUID.(0Bh|1Fh):EBX[15:0] - logical processors at this level.
pub fn topology_logical_count(ebx: u32) -> u32 {
    extract_field(ebx, 0, 15)
}

/// CPUID.(0Bh|1Fh):ECX[7:0] - level number (echoes the subleaf).
pub fn topology_level_number(ecx: u32) -> u32 {
    extract_field(ecx, 0, 7)
}

/// CPUID.(0Bh|1Fh):ECX[15:8] - level type.
pub fn topology_level_type(ecx: u32) -> u32 {
    extract_field(ecx, 8, 15)
}
