// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The one piece of process-lifetime global state this crate needs: the
//! current thread's address space root, per core. Exposed as an explicit
//! [`KernelState`] handed by reference into
//! [`crate::fault::handle_memory_fault`], not as an ambient `static mut`,
//! built from `percore::ExceptionLock<RefCell<T>>`.

use crate::node::NodeRef;
use crate::platform::{PerCoreState, exception_free};
use core::cell::RefCell;
use percore::{ExceptionLock, PerCore};

/// Per-core kernel state the Fault Path reads and the scheduler (an
/// external collaborator) writes on every context switch.
pub struct KernelState {
    current_top_level: PerCoreState<Option<NodeRef>>,
}

impl KernelState {
    /// A fresh kernel state with no address space current on any core.
    pub const fn new() -> Self {
        Self {
            current_top_level: PerCore::new([ExceptionLock::new(RefCell::new(None))]),
        }
    }

    /// Records `top` as the address space now active on this core, called
    /// by the scheduler's context switch alongside
    /// [`crate::mpu_table::MpuShadowTable::set_hardware`].
    pub fn set_current_top_level(&self, top: NodeRef) {
        exception_free(|token| {
            *self.current_top_level.get().borrow_mut(token) = Some(top);
        });
    }

    /// The address space the Fault Path should walk for a fault on this
    /// core, if a context switch has ever installed one.
    pub fn current_top_level(&self) -> Option<NodeRef> {
        exception_free(|token| *self.current_top_level.get().borrow_mut(token))
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TOP_LEVEL_FLAG;
    use crate::node::{init, size_for};
    use core::ptr::NonNull;

    #[test]
    fn current_top_level_round_trips() {
        let state = KernelState::new();
        assert!(state.current_top_level().is_none());

        let len = size_for(3, true);
        let mut storage = vec![0u8; len];
        let ptr = NonNull::new(storage.as_mut_ptr()).unwrap();
        // SAFETY: `storage` is a fresh, zeroed allocation sized by `size_for`
        // for this `num_order`/top flag.
        let node = unsafe { init(ptr, 0x1000 | TOP_LEVEL_FLAG, 12, 3) };
        state.set_current_top_level(node);
        assert_eq!(state.current_top_level(), Some(node));
    }
}
