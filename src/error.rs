// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Error kinds returned by page-table and MPU operations.

use core::fmt;

/// Failure modes of the page-table and MPU-refill operations.
///
/// Every fallible operation in this crate returns one of these kinds rather
/// than a bare negative status code, so callers can match on the failure
/// instead of re-deriving it from a magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgtblError {
    /// A structural parameter (an order, a position, a node's `num_order`)
    /// is outside the range an operation requires.
    Shape,
    /// The target slot, entry, or region is already occupied.
    Occupancy,
    /// A page was mapped with flags that disagree with the node's existing
    /// `Page_Flags`, which are set by the first page mapped and fixed
    /// thereafter.
    Consistency,
    /// The node is still attached to a parent directory or has attached
    /// children, and so cannot be deleted or detached.
    Attachment,
    /// The MPU Shadow Table has no admissible victim slot left.
    Capacity,
    /// A memory fault could not be resolved by dynamic MPU refill and must
    /// be delivered to the faulting thread (or is unrecoverable).
    FaultIrrecoverable,
}

impl fmt::Display for PgtblError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::Shape => "operand shape is invalid for this operation",
            Self::Occupancy => "target slot or entry is already occupied",
            Self::Consistency => "flags are inconsistent with the node's existing mapping",
            Self::Attachment => "node is still attached to a parent or child",
            Self::Capacity => "no admissible MPU shadow slot is available",
            Self::FaultIrrecoverable => "memory fault could not be resolved dynamically",
        };
        f.write_str(message)
    }
}

impl core::error::Error for PgtblError {}

/// Shorthand for the common `Result<T, PgtblError>` return type.
pub type PgtblResult<T = ()> = Result<T, PgtblError>;
