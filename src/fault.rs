// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The Fault Path: classifies a memory fault taken from user mode and, for
//! a recoverable permission fault caused by a missing dynamic region, walks
//! the current address space and installs the backing region via
//! [`crate::refill`].

use crate::context::KernelState;
use crate::descriptor::PageFlags;
use crate::ops;
use crate::platform::{FaultEndpoint, FaultReason};
use crate::refill::{self, RefillOp};

/// The hardware's fault status, already decoded by the exception entry
/// trampoline (an external collaborator: interrupt dispatch and the
/// system-call trampoline live outside this crate; only the decoded bits
/// this classification needs are passed in).
///
/// Field names follow the Cortex-M fault status registers this crate
/// targets: `nmi_or_vector_table` is HFSR.VECTTBL (or an NMI), `debug_event`
/// is HFSR.DEBUGEVT, `fatal` covers every MemManage/BusFault/UsageFault
/// condition besides a plain data-access permission violation, and
/// `instruction_fetch` is MMFSR.IACCVIOL.
#[derive(Debug, Clone, Copy)]
pub struct FaultStatus {
    /// The fault escalated from the vector table itself, or is an NMI,
    /// rather than a fault taken while already running user code.
    pub nmi_or_vector_table: bool,
    /// The hard fault is an escalated debug event.
    pub debug_event: bool,
    /// The fault is fatal in nature: a stacking/unstacking fault, an
    /// unaligned access, a divide-by-zero, or any condition other than a
    /// plain data-access permission violation.
    pub fatal: bool,
    /// The fault was taken on an instruction fetch.
    pub instruction_fetch: bool,
    /// The faulting virtual address, if the fault address register holds
    /// a valid value.
    pub fault_addr: Option<u32>,
}

/// What the exception entry trampoline should do after
/// [`handle_memory_fault`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// An unrecoverable condition; the caller must not return to user mode.
    ///
    /// This crate does not itself halt the system — the external collaborator
    /// owns cold/warm reset and crash reporting.
    Panic,
    /// An escalated debug event; acknowledge and return to user mode
    /// without touching any page-table state.
    DebugAcknowledge,
    /// The fault was handed to [`FaultEndpoint::deliver_fault`]; the
    /// faulting thread must not be resumed until user-level policy
    /// decides.
    Delivered,
    /// A dynamic region was installed; the caller should clear the
    /// fault-status registers and return to user mode, which will retry
    /// the faulting instruction.
    Resolved,
}

/// Classifies and, where possible, resolves a memory fault.
///
/// `state` supplies the current address space; `endpoint` is the external
/// fault-endpoint collaborator. Runs entirely inside the caller's masked
/// critical section expectations: this function itself never blocks or
/// yields.
pub fn handle_memory_fault(
    status: FaultStatus,
    state: &KernelState,
    endpoint: &mut impl FaultEndpoint,
) -> FaultOutcome {
    if status.nmi_or_vector_table {
        return FaultOutcome::Panic;
    }
    if status.debug_event {
        return FaultOutcome::DebugAcknowledge;
    }

    let Some(fault_addr) = (!status.fatal).then_some(status.fault_addr).flatten() else {
        endpoint.deliver_fault(FaultReason::Fatal);
        return FaultOutcome::Delivered;
    };

    if status.instruction_fetch {
        endpoint.deliver_fault(FaultReason::InstructionFetch);
        return FaultOutcome::Delivered;
    }

    let Some(top) = state.current_top_level() else {
        endpoint.deliver_fault(FaultReason::WalkFailed);
        return FaultOutcome::Delivered;
    };

    let Ok(walked) = ops::walk(top, fault_addr) else {
        endpoint.deliver_fault(FaultReason::WalkFailed);
        return FaultOutcome::Delivered;
    };

    if walked.flags.contains(PageFlags::STATIC) {
        endpoint.deliver_fault(FaultReason::StaticPageMiss);
        return FaultOutcome::Delivered;
    }

    if refill::update(walked.node, RefillOp::Add).is_err() {
        endpoint.deliver_fault(FaultReason::RefillCapacity);
        return FaultOutcome::Delivered;
    }

    FaultOutcome::Resolved
}
