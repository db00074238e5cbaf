//! Platform hooks: the record of everything the core consumes from its
//! embedder.
//!
//! Filled in by the platform layer (simulator or bare machine) before the
//! kernel is installed. All hook references are `&'static`, so hook
//! presence is a type-level fact and needs no runtime assertion at
//! bootstrap.

use zim_common::resource::HardwareResource;
use zim_common::task::TaskContextFactory;

use crate::signal::SignalDispatcher;

/// Cooperative scheduling entry points the platform exposes to task-side
/// code. Implementations raise the corresponding trap through the
/// dispatcher.
pub trait SchedulingControl {
    /// The running task offers the CPU (raises `Trap(Yield)`).
    fn yield_current_task(&self);
    /// The running task is finished (raises `Trap(Terminate)`).
    fn terminate_current_task(&self);
}

/// Named lookup of platform hardware resources.
pub trait ResourceRegistry {
    /// The resource registered under `name`, if any.
    fn query(&self, name: &str) -> Option<HardwareResource>;
}

/// The platform abstraction set, injected at kernel installation.
pub struct PlatformHooks {
    /// Yield/terminate entry points.
    pub sched_control: &'static dyn SchedulingControl,
    /// The signal gate.
    pub dispatcher: &'static dyn SignalDispatcher,
    /// Producer of per-architecture task contexts.
    pub task_context_factory: &'static dyn TaskContextFactory,
    /// Hardware resource lookup.
    pub resource_manager: &'static dyn ResourceRegistry,
    /// Called by the idle task between iterations.
    pub halt: fn(),
    /// Called when the frame buffer changed.
    pub refresh_display: fn(),
    /// Optional platform reboot.
    pub reboot: Option<fn()>,
}
