// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The MPU Shadow Table: a software-side cache of the hardware's 8 MPU
//! regions, kept in sync by [`crate::refill`].

use crate::config::round_down;
use crate::descriptor::{Rasr, Rbar, RegionDescriptor};
use crate::error::{PgtblError, PgtblResult};
use crate::platform::MpuHardware;

/// Number of MPU regions on the platforms this crate targets, and the
/// default slot count for [`MpuShadowTable`].
pub const DEFAULT_MPU_SLOTS: usize = 8;

/// An 8-slot (by default) cache of hardware MPU region descriptors.
///
/// `SLOTS` is the `mpu_slots` configuration point: changing it changes only
/// this table's width and the capacity check in [`MpuShadowTable::add`],
/// never the replacement algorithm. Slot 0 is reserved for dynamic refill
/// and is never evicted by a static add.
///
/// `State` packs two bitfields, one bit per slot: the low `SLOTS` bits mark
/// which slots are occupied, the bits at offset 16 mark which occupied
/// slots are static. This assumes `SLOTS <= 16`, matching every Cortex-M
/// MPU variant in practice (8 or 16 regions).
pub struct MpuShadowTable<const SLOTS: usize = DEFAULT_MPU_SLOTS> {
    state: u32,
    data: [RegionDescriptor; SLOTS],
}

impl<const SLOTS: usize> MpuShadowTable<SLOTS> {
    const STATIC_SHIFT: u32 = 16;

    /// An empty shadow table: no region occupied.
    pub const fn empty() -> Self {
        Self {
            state: 0,
            data: [RegionDescriptor::EMPTY; SLOTS],
        }
    }

    fn occupied(&self, slot: usize) -> bool {
        self.state & (1 << slot) != 0
    }

    fn is_static(&self, slot: usize) -> bool {
        self.state & (1 << (Self::STATIC_SHIFT + slot as u32)) != 0
    }

    fn set_occupied(&mut self, slot: usize, value: bool) {
        let bit = 1 << slot;
        if value {
            self.state |= bit;
        } else {
            self.state &= !bit;
        }
    }

    fn set_static(&mut self, slot: usize, value: bool) {
        let bit = 1 << (Self::STATIC_SHIFT + slot as u32);
        if value {
            self.state |= bit;
        } else {
            self.state &= !bit;
        }
    }

    fn matches(&self, slot: usize, start_addr: u32, size_order: u32) -> bool {
        let aligned = round_down(start_addr, size_order);
        self.data[slot].rbar == Rbar::new(aligned, slot as u8).bits()
            && self.data[slot].rasr.rasr_size_order() == size_order
    }

    /// Admits (or refreshes) a region covering `start_addr`/`size_order`
    /// with attributes `rasr`, marking it static or dynamic per `is_static`.
    ///
    /// If a slot already describes the same region it is refreshed in
    /// place. Otherwise a victim slot is chosen in one pass: the
    /// highest-indexed empty slot, or failing that the highest-indexed
    /// occupied dynamic slot; slot 0 is skipped as a candidate when the
    /// incoming region is static, since slot 0 is reserved for dynamic
    /// refill.
    pub fn add(
        &mut self,
        start_addr: u32,
        size_order: u32,
        rasr: Rasr,
        is_static: bool,
    ) -> PgtblResult<()> {
        for slot in 0..SLOTS {
            if self.occupied(slot) && self.matches(slot, start_addr, size_order) {
                self.data[slot].rasr = rasr.bits();
                self.set_static(slot, is_static);
                log::trace!("mpu shadow slot {slot} refreshed in place");
                return Ok(());
            }
        }

        let mut last_empty = None;
        let mut last_dynamic = None;
        for slot in 0..SLOTS {
            if slot == 0 && is_static {
                continue;
            }
            if self.occupied(slot) {
                if !self.is_static(slot) {
                    last_dynamic = Some(slot);
                }
            } else {
                last_empty = Some(slot);
            }
        }

        let slot = last_empty.or(last_dynamic).ok_or(PgtblError::Capacity)?;
        let aligned = round_down(start_addr, size_order);
        self.data[slot] = RegionDescriptor {
            rbar: Rbar::new(aligned, slot as u8).bits(),
            rasr: rasr.bits(),
        };
        self.set_occupied(slot, true);
        self.set_static(slot, is_static);
        log::debug!("mpu shadow slot {slot} admitted region {aligned:#x} (static={is_static})");
        Ok(())
    }

    /// Evicts the slot describing `start_addr`/`size_order`, if any.
    pub fn clear(&mut self, start_addr: u32, size_order: u32) {
        for slot in 0..SLOTS {
            if self.occupied(slot) && self.matches(slot, start_addr, size_order) {
                self.data[slot] = RegionDescriptor::EMPTY;
                self.set_occupied(slot, false);
                self.set_static(slot, false);
                log::trace!("mpu shadow slot {slot} cleared");
                return;
            }
        }
    }

    /// Publishes every slot to the hardware MPU, enabled or not.
    pub fn set_hardware(&self, hardware: &mut impl MpuHardware) {
        for slot in 0..SLOTS {
            hardware.write_region(
                slot,
                Rbar::from_bits(self.data[slot].rbar),
                Rasr::from_bits_retain(self.data[slot].rasr),
            );
        }
    }
}

impl<const SLOTS: usize> Default for MpuShadowTable<SLOTS> {
    fn default() -> Self {
        Self::empty()
    }
}

trait RasrExt {
    fn rasr_size_order(self) -> u32;
}

impl RasrExt for u32 {
    fn rasr_size_order(self) -> u32 {
        Rasr::from_bits_retain(self).size_order()
    }
}
