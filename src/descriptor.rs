// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Hardware-facing bit layouts: page-flags, RBAR/RASR, and the region pair
//! written to the MPU.

use bitflags::bitflags;
use zerocopy::{FromBytes, Immutable, IntoBytes};

bitflags! {
    /// Permission and attribute bits carried by a terminal page-table entry.
    ///
    /// Set once by the first page mapped into a node and fixed for the
    /// node's lifetime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PageFlags: u32 {
        /// Readable.
        const READ = 1 << 0;
        /// Writable; absence maps to the MPU's read-only access permission.
        const WRITE = 1 << 1;
        /// Executable; absence sets the MPU's execute-never bit.
        const EXECUTE = 1 << 2;
        /// Cacheable (MPU RASR `C` bit).
        const CACHEABLE = 1 << 3;
        /// Bufferable (MPU RASR `B` bit).
        const BUFFERABLE = 1 << 4;
        /// Static: admitted into the MPU ahead of time and never evicted by
        /// dynamic refill.
        const STATIC = 1 << 5;
    }
}

/// Region Base Address Register: region start address, validity, and the
/// MPU slot (region number) it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rbar(u32);

impl Rbar {
    const ADDR_MASK: u32 = 0xFFFF_FFE0;
    const VALID: u32 = 1 << 4;
    const REGION_MASK: u32 = 0xF;

    /// Builds an RBAR value addressing `start` (rounded down to the 32-byte
    /// region-base alignment) through MPU slot `region`.
    pub fn new(start: u32, region: u8) -> Self {
        Self((start & Self::ADDR_MASK) | Self::VALID | (u32::from(region) & Self::REGION_MASK))
    }

    /// Reinterprets a raw register value as an `Rbar`.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The region base address this descriptor carries.
    pub fn addr(self) -> u32 {
        self.0 & Self::ADDR_MASK
    }

    /// The MPU slot (region number) this descriptor targets.
    pub fn region(self) -> u8 {
        (self.0 & Self::REGION_MASK) as u8
    }

    /// Raw register value, ready to write to `MPU_RBAR`.
    pub fn bits(self) -> u32 {
        self.0
    }
}

bitflags! {
    /// Region Attribute and Size Register: enable, size, subregion-disable,
    /// memory attributes, access permission and execute-never.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Rasr: u32 {
        /// Region enable.
        const ENABLE = 1 << 0;
        /// Bufferable (`B`).
        const BUFFERABLE = 1 << 16;
        /// Cacheable (`C`).
        const CACHEABLE = 1 << 17;
        /// Shareable.
        const SHAREABLE = 1 << 18;
        /// Read-write access permission (`AP = 0b011`).
        const AP_RW = 0b011 << 24;
        /// Read-only access permission (`AP = 0b010`).
        const AP_RO = 0b010 << 24;
        /// Execute-never.
        const XN = 1 << 28;
    }
}

impl Rasr {
    const SIZE_SHIFT: u32 = 1;
    const SIZE_MASK: u32 = 0b1_1111 << Self::SIZE_SHIFT;
    const SRD_SHIFT: u32 = 8;
    const SRD_MASK: u32 = 0xFF << Self::SRD_SHIFT;

    /// Builds the SIZE field for a region covering `2^(region_size_field + 1)`
    /// bytes, i.e. callers pass `size_order - 1`.
    pub fn region_size(region_size_field: u32) -> Self {
        Self::from_bits_retain((region_size_field << Self::SIZE_SHIFT) & Self::SIZE_MASK)
    }

    /// Builds the subregion-disable field from a bitmask of disabled subregions.
    pub fn subregion_disable(mask: u8) -> Self {
        Self::from_bits_retain((u32::from(mask) << Self::SRD_SHIFT) & Self::SRD_MASK)
    }

    /// `size_order` recovered from this RASR's SIZE field.
    pub fn size_order(self) -> u32 {
        ((self.bits() & Self::SIZE_MASK) >> Self::SIZE_SHIFT) + 1
    }
}

/// The RBAR/RASR pair written verbatim to one hardware MPU region.
///
/// `FromBytes`/`IntoBytes`/`Immutable` let this struct be reinterpreted as
/// the two consecutive registers `MPU_RBAR`/`MPU_RASR` describe, via
/// `zerocopy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, Immutable)]
#[repr(C)]
pub struct RegionDescriptor {
    /// Raw RBAR bits.
    pub rbar: u32,
    /// Raw RASR bits.
    pub rasr: u32,
}

impl RegionDescriptor {
    /// A disabled, unoccupied region descriptor.
    pub const EMPTY: Self = Self { rbar: 0, rasr: 0 };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rbar_round_trips_addr_and_region() {
        let rbar = Rbar::new(0x2000_1234, 3);
        assert_eq!(rbar.addr(), 0x2000_1220);
        assert_eq!(rbar.region(), 3);
    }

    #[test]
    fn rasr_size_order_round_trips() {
        let rasr = Rasr::region_size(7 - 1);
        assert_eq!(rasr.size_order(), 7);
    }

    #[test]
    fn rasr_subregion_disable_masks_to_eight_bits() {
        let rasr = Rasr::subregion_disable(0xFF);
        assert_eq!((rasr.bits() >> 8) & 0xFF, 0xFF);
    }
}
