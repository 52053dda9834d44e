use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Condition flags of the virtualized architecture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VmFlags: u8 {
        const OVERFLOW = 1 << 0;
        const CARRY = 1 << 1;
        const ZERO = 1 << 2;
        const SIGN = 1 << 3;
        const UNSIGNED = 1 << 4;
        const BEHAV1 = 1 << 5;
        const BEHAV2 = 1 << 6;
        const BEHAV3 = 1 << 7;
    }
}

impl fmt::Display for VmFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Bit position of every architecture flag in the target flag register.
///
/// Each build of the virtual machine shuffles these positions, so the
/// layout is part of the per-architecture constant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagLayout {
    pub overflow: u8,
    pub carry: u8,
    pub zero: u8,
    pub sign: u8,
    pub unsigned: u8,
    pub behav1: u8,
    pub behav2: u8,
    pub behav3: u8,
}

impl FlagLayout {
    /// Target-format bit mask for a set of architecture flags.
    pub fn mask(&self, flags: VmFlags) -> u8 {
        let positions = [
            (VmFlags::OVERFLOW, self.overflow),
            (VmFlags::CARRY, self.carry),
            (VmFlags::ZERO, self.zero),
            (VmFlags::SIGN, self.sign),
            (VmFlags::UNSIGNED, self.unsigned),
            (VmFlags::BEHAV1, self.behav1),
            (VmFlags::BEHAV2, self.behav2),
            (VmFlags::BEHAV3, self.behav3),
        ];
        positions
            .iter()
            .filter(|(flag, _)| flags.contains(*flag))
            .fold(0u8, |mask, (_, bit)| mask | 1u8.wrapping_shl(u32::from(*bit)))
    }
}

impl Default for FlagLayout {
    fn default() -> Self {
        Self {
            overflow: 0,
            carry: 1,
            zero: 2,
            sign: 3,
            unsigned: 4,
            behav1: 5,
            behav2: 6,
            behav3: 7,
        }
    }
}
