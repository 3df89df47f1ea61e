// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! External collaborators this crate consumes: raw MPU register writes,
//! fault-endpoint delivery, and the critical-section primitive every masked
//! operation in this crate runs inside.
//!
//! This crate never implements these itself — it is a core consumed by a
//! capability layer, scheduler, and platform support crate that own the
//! hardware. `MpuHardware` and `FaultEndpoint` are the seams at which that
//! outer kernel plugs in, modeled as traits rather than a concrete
//! implementation.

use crate::descriptor::{Rasr, Rbar};
use core::cell::RefCell;
use percore::{Cores, ExceptionLock, PerCore};

pub use percore::exception_free;

/// Number of CPU cores this crate supports: exactly one. Multi-core MPU
/// sharing is out of scope.
pub const CORE_COUNT: usize = 1;

/// Per-core state guarded by [`exception_free`]'s masked critical section.
pub type PerCoreState<T> = PerCore<[ExceptionLock<RefCell<T>>; CORE_COUNT], CoresImpl>;

/// [`Cores`] implementation for this crate's single supported core.
///
/// Kept, rather than special-cased away, so [`PerCoreState`] stays `Send`/
/// `Sync` correct through the same mechanism a genuinely multi-core
/// implementation would use, instead of an `unsafe impl` carve-out.
pub struct CoresImpl;

// SAFETY: this crate targets a single core only, so core 0 is the only
// valid index and is always returned.
unsafe impl Cores for CoresImpl {
    fn core_index() -> usize {
        0
    }
}

/// Raw MPU register access.
///
/// [`crate::mpu_table::MpuShadowTable::set_hardware`] calls this once per
/// slot on a context switch; this crate never reads hardware MPU state
/// back, only ever writes the Shadow Table's cached view of it.
pub trait MpuHardware {
    /// Writes one hardware MPU region's RBAR/RASR pair.
    fn write_region(&mut self, slot: usize, rbar: Rbar, rasr: Rasr);
}

/// Delivers an asynchronous fault signal to a thread's configured fault
/// endpoint and triggers a reschedule; the faulting thread is not resumed
/// until user-level policy decides.
///
/// An external collaborator: the capability layer owns endpoints and
/// scheduling, both out of scope for this crate.
pub trait FaultEndpoint {
    /// Enqueues `reason` to the fault endpoint, if any, configured for the
    /// thread that faulted.
    fn deliver_fault(&mut self, reason: FaultReason);
}

/// Why [`crate::fault::handle_memory_fault`] gave up on resolving a fault by
/// dynamic MPU refill and handed it to [`FaultEndpoint::deliver_fault`]
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    /// The fault is fatal in nature (a stacking fault, an unaligned access,
    /// a divide-by-zero, ...), or the fault address register does not hold
    /// a valid address.
    Fatal,
    /// An instruction fetch took a permission fault. The fault path never
    /// installs a dynamic region to satisfy an execute fault.
    InstructionFetch,
    /// Walking the current address space found no mapping for the
    /// faulting address.
    WalkFailed,
    /// The walked entry names a static page. A static page's region should
    /// already be MPU-resident, so a miss against it means the kernel's own
    /// Shadow Table state is inconsistent.
    StaticPageMiss,
    /// [`crate::refill::update`] had no admissible Shadow Table slot to
    /// install the dynamic region into.
    RefillCapacity,
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::descriptor::RegionDescriptor;

    /// A fake [`MpuHardware`] that records every write, for assertions in tests.
    #[derive(Default)]
    pub struct FakeMpu {
        pub regions: [RegionDescriptor; 8],
    }

    impl MpuHardware for FakeMpu {
        fn write_region(&mut self, slot: usize, rbar: Rbar, rasr: Rasr) {
            self.regions[slot] = RegionDescriptor {
                rbar: rbar.bits(),
                rasr: rasr.bits(),
            };
        }
    }

    /// A fake [`FaultEndpoint`] that records the last delivered reason, if any.
    #[derive(Default)]
    pub struct FakeFaultEndpoint {
        pub delivered: Option<FaultReason>,
    }

    impl FaultEndpoint for FakeFaultEndpoint {
        fn deliver_fault(&mut self, reason: FaultReason) {
            self.delivered = Some(reason);
        }
    }
}
