//! # zim-common
//!
//! Shared types and contracts for the Zim kernel and its embedders.
//!
//! This crate defines the ABI between the platform layer, the image loader
//! and the kernel core:
//! - [`BootRecord`](boot::BootRecord): boot handoff structure passed to the kernel
//! - [`zimg`]: the on-disk `ZImg` container format
//! - [`Message`](message::Message): the bus message envelope
//! - [`TaskContext`](task::TaskContext): the platform task-context contract
//!
//! All wire-facing types use `#[repr(C)]` for stable layout across
//! compilation units.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod align;
pub mod boot;
pub mod message;
pub mod resource;
pub mod task;
pub mod zimg;

// Re-export the types nearly every consumer needs.
pub use message::{Message, MessageType};
pub use resource::HardwareResource;
pub use task::{TaskContext, TaskContextFactory, TaskEntry, TaskPriority, TaskState};
