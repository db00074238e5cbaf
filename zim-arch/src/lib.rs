//! # zim-arch
//!
//! The x86-64 task context for Zim, following the Windows x64 calling
//! convention: arguments in RCX/RDX/R8/R9, a 32-byte shadow space above
//! the return address, and `RSP ≡ 8 (mod 16)` at function entry.
//!
//! The kernel core drives this through the
//! [`TaskContext`](zim_common::task::TaskContext) contract; nothing in the
//! core knows the register image layout.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod context;
pub mod regs;

#[cfg(target_arch = "x86_64")]
pub mod switch;

pub use context::{ExitStub, Win64TaskContext, SHADOW_SPACE};
pub use regs::SavedRegs;
