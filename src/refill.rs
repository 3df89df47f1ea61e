// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The MPU Refill Algorithm: turning a node's entry array into an RASR and
//! keeping the owning MPU Shadow Table in sync.

use crate::config::MPU_REPRESENTABLE_NUM_ORDER;
use crate::descriptor::{PageFlags, Rasr};
use crate::error::{PgtblError, PgtblResult};
use crate::node::{Entry, NodeRef};

/// Whether [`update`] should admit or evict a node's region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillOp {
    /// Recompute and admit the node's region descriptor.
    Add,
    /// Evict the node's region descriptor unconditionally.
    Clear,
}

/// Computes the RASR a node's current entries call for, or `None` if no
/// entry is present (the region should not be in the MPU at all).
///
/// Every present, terminal entry in `entries` clears that index's bit in
/// the subregion-disable field; access permission is read-write unless
/// `flags` lacks [`PageFlags::WRITE`]; execute-never is set unless `flags`
/// has [`PageFlags::EXECUTE`]; `C`/`B` pass through from `flags` directly.
/// `size_order` is the node's own `size_order`; the MPU RASR SIZE field
/// encodes `size_order - 1`.
pub fn compute_rasr(entries: &[Entry], flags: PageFlags, size_order: u32) -> Option<Rasr> {
    let mut present_mask: u8 = 0;
    for (index, entry) in entries.iter().enumerate().take(8) {
        if entry.is_present() && entry.is_terminal() {
            present_mask |= 1 << index;
        }
    }
    if present_mask == 0 {
        return None;
    }

    let mut rasr = Rasr::ENABLE | Rasr::region_size(size_order - 1) | Rasr::subregion_disable(!present_mask);
    rasr |= if flags.contains(PageFlags::WRITE) {
        Rasr::AP_RW
    } else {
        Rasr::AP_RO
    };
    if !flags.contains(PageFlags::EXECUTE) {
        rasr |= Rasr::XN;
    }
    if flags.contains(PageFlags::CACHEABLE) {
        rasr |= Rasr::CACHEABLE;
    }
    if flags.contains(PageFlags::BUFFERABLE) {
        rasr |= Rasr::BUFFERABLE;
    }
    Some(rasr)
}

/// Recomputes or evicts `node`'s descriptor in its owning MPU Shadow Table.
///
/// Only legal on an MPU-representable node (`num_order == 3`) that is
/// attached to a top-level address space, directly or as a child.
/// [`RefillOp::Add`] with no entries present behaves as a clear, since an
/// empty region has nothing to admit.
pub fn update(mut node: NodeRef, op: RefillOp) -> PgtblResult<()> {
    if node.header().num_order() != MPU_REPRESENTABLE_NUM_ORDER {
        return Err(PgtblError::Shape);
    }
    let start = node.header().start();
    let size_order = node.header().size_order();
    let flags = node.header().page_flags();

    if op == RefillOp::Clear {
        let shadow = node.owning_shadow_table().ok_or(PgtblError::Shape)?;
        shadow.clear(start, size_order);
        log::trace!("mpu refill: cleared region start={start:#x}");
        return Ok(());
    }

    let rasr = compute_rasr(node.entries(), flags, size_order);
    let shadow = node.owning_shadow_table().ok_or(PgtblError::Shape)?;
    match rasr {
        None => {
            shadow.clear(start, size_order);
            Ok(())
        }
        Some(rasr) => {
            let result = shadow.add(start, size_order, rasr, flags.contains(PageFlags::STATIC));
            if result.is_ok() {
                log::debug!("mpu refill: admitted region start={start:#x} size_order={size_order}");
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Entry;

    #[test]
    fn compute_rasr_is_none_when_no_entry_present() {
        let entries = [Entry::EMPTY; 8];
        assert!(compute_rasr(&entries, PageFlags::READ, 12).is_none());
    }

    #[test]
    fn compute_rasr_subregion_disable_is_complement_of_presence() {
        let mut entries = [Entry::EMPTY; 8];
        entries[1] = Entry::page(0x1000, 12);
        entries[5] = Entry::page(0x5000, 12);
        let rasr = compute_rasr(&entries, PageFlags::READ, 12).unwrap();
        // Present at bits 1 and 5, so those bits are enabled (0), the rest
        // disabled (1): SRD = !0b0010_0010 & 0xFF.
        assert_eq!((rasr.bits() >> 8) & 0xFF, (!0b0010_0010u32) & 0xFF);
    }

    #[test]
    fn compute_rasr_sets_xn_without_execute_flag() {
        let mut entries = [Entry::EMPTY; 8];
        entries[0] = Entry::page(0x1000, 12);
        let rasr = compute_rasr(&entries, PageFlags::READ, 12).unwrap();
        assert!(rasr.contains(Rasr::XN));
        let rasr = compute_rasr(&entries, PageFlags::READ | PageFlags::EXECUTE, 12).unwrap();
        assert!(!rasr.contains(Rasr::XN));
    }

    #[test]
    fn compute_rasr_picks_ap_from_write_flag() {
        let mut entries = [Entry::EMPTY; 8];
        entries[0] = Entry::page(0x1000, 12);
        let rasr = compute_rasr(&entries, PageFlags::READ, 12).unwrap();
        assert!(rasr.contains(Rasr::AP_RO));
        let rasr = compute_rasr(&entries, PageFlags::READ | PageFlags::WRITE, 12).unwrap();
        assert!(rasr.contains(Rasr::AP_RW));
    }
}
