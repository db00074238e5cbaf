//! # zim-kernel
//!
//! The Zim cooperative micro-kernel core.
//!
//! The kernel owns a single slab of physical RAM and multiplexes it across
//! a small set of cooperating tasks joined by a typed publish/subscribe
//! bus. Control flow at steady state is signal-driven: every yield, trap
//! and interrupt arrives as a [`SignalPacket`](signal::SignalPacket) and is
//! routed to the [`Kernel`](kernel::Kernel), which consults the scheduling
//! strategy and performs a context transit.
//!
//! # Bootstrap
//!
//! [`Kernel::install`](kernel::Kernel::install) places the kernel facade at
//! the head of the RAM region; everything else is funded by the arena
//! behind it. See the [`kernel`] module for the three-phase bootstrap
//! sequence.
//!
//! # Concurrency model
//!
//! Single CPU, cooperative, signal-driven. Mutable kernel structures are
//! touched either in task context with signals disabled or inside a signal
//! handler; the dispatcher's deactivate/activate bracket is the critical
//! section discipline.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod bus;
pub mod collections;
pub mod config;
pub mod error;
pub mod hooks;
pub mod ids;
pub mod inspect;
pub mod kernel;
pub mod logging;
pub mod proxy;
pub mod resource;
pub mod sched;
pub mod service;
pub mod signal;
pub mod stack;
pub mod task;

use zim_alloc::ObjectBuilder;

pub use error::{BusError, KernelError, SpawnError};
pub use kernel::{Kernel, MemoryRegion};

/// The kernel's object builder. Post-bootstrap, every builder lives in
/// arena- or heap-backed memory whose lifetime matches the RAM region the
/// kernel was installed into, hence `'static`.
pub type KernelBuilder = ObjectBuilder<'static>;
