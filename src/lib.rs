// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The address-translation and protection subsystem of a capability-based
//! microkernel for Cortex-M class microcontrollers with an 8-region MPU.
//!
//! This crate is the core: a multi-level software page table
//! ([`node`]/[`ops`]), an 8-slot cache of hardware MPU regions attached to
//! each address space ([`mpu_table`]), the algorithm that keeps that cache
//! in sync with a node's mappings ([`refill`]), and the fault-driven
//! dynamic refill path that reconciles the two on a miss ([`fault`]).
//!
//! It is a `#![no_std]` library with no entry point of its own, consumed by
//! an out-of-tree capability layer, scheduler, and syscall trampoline; see
//! [`platform`] for the traits at that boundary.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
mod context;
pub mod debug;
pub mod descriptor;
pub mod error;
pub mod fault;
pub mod logger;
pub mod mpu_table;
pub mod node;
pub mod ops;
pub mod platform;
pub mod refill;

pub use context::KernelState;
