//! Kernel proxy: the runtime handle a task talks to the kernel through.
//!
//! Tasks receive the proxy as their first (opaque) argument. Beyond
//! forwarding publishes to the bus and yields to the platform's scheduling
//! control, the proxy intercepts exactly two message types:
//!
//! - `REQUEST_HARDWARE_INFO` is answered synchronously from the resource
//!   registry;
//! - `EVENT_VRAM_UPDATED` invokes the platform's display-refresh hook.

use core::ptr::NonNull;

use zim_common::message::{Message, MessageType};

use crate::bus::MessageBus;
use crate::error::BusError;
use crate::hooks::{ResourceRegistry, SchedulingControl};

/// Longest resource name the hardware-info intercept will read.
const MAX_RESOURCE_NAME: usize = 64;

/// The handle given to every task.
pub struct KernelProxy {
    bus: NonNull<MessageBus>,
    sched_control: &'static dyn SchedulingControl,
    resources: &'static dyn ResourceRegistry,
    refresh_display: fn(),
}

impl KernelProxy {
    /// Proxy forwarding into `bus` and the given hooks.
    pub(crate) fn new(
        bus: NonNull<MessageBus>,
        sched_control: &'static dyn SchedulingControl,
        resources: &'static dyn ResourceRegistry,
        refresh_display: fn(),
    ) -> Self {
        Self {
            bus,
            sched_control,
            resources,
            refresh_display,
        }
    }

    /// Recover a proxy reference from the opaque runtime argument handed
    /// to a task entry.
    ///
    /// # Safety
    ///
    /// `raw` must be the runtime pointer the kernel passed to this task,
    /// and the kernel must still be alive.
    #[must_use]
    pub unsafe fn from_raw<'a>(raw: *mut ()) -> &'a KernelProxy {
        // SAFETY: Caller guarantees `raw` is the proxy the kernel armed
        // the task with.
        unsafe { &*(raw as *const KernelProxy) }
    }

    /// Publish a message on the kernel bus (or satisfy one of the two
    /// intercepts synchronously).
    pub fn publish(&self, msg: &Message) -> Result<(), BusError> {
        match msg.ty {
            MessageType::RequestHardwareInfo => {
                self.answer_hardware_info(msg);
                Ok(())
            }
            MessageType::EventVramUpdated => {
                (self.refresh_display)();
                Ok(())
            }
            _ => {
                // SAFETY: The bus lives in kernel memory for the kernel's
                // lifetime; cooperative single-core discipline means no
                // concurrent mutation.
                unsafe { (*self.bus.as_ptr()).publish(*msg) }
            }
        }
    }

    /// Give up the CPU; returns when the task is scheduled again.
    pub fn yield_now(&self) {
        self.sched_control.yield_current_task();
    }

    /// `payload[0]`: pointer to a NUL-terminated resource name.
    /// `payload[1]`: pointer to a `u64` receiving the resource base
    /// address, or zero when the name is unknown.
    fn answer_hardware_info(&self, msg: &Message) {
        let name_ptr = msg.payload[0] as *const u8;
        let out_ptr = msg.payload[1] as *mut u64;
        if name_ptr.is_null() || out_ptr.is_null() {
            return;
        }

        // SAFETY: The requesting task supplies a NUL-terminated name in
        // its own memory; the read is bounded.
        let base = unsafe { read_name(name_ptr) }
            .and_then(|name| self.resources.query(name))
            .map_or(0, |res| res.base_address as u64);

        // SAFETY: The requesting task supplies the out pointer.
        unsafe { out_ptr.write(base) };
    }
}

/// Read a NUL-terminated UTF-8 name, bounded at [`MAX_RESOURCE_NAME`].
///
/// # Safety
///
/// `ptr` must point at readable memory containing a NUL within the bound.
unsafe fn read_name<'a>(ptr: *const u8) -> Option<&'a str> {
    let mut len = 0;
    // SAFETY: Caller guarantees readable, NUL-terminated memory.
    while len < MAX_RESOURCE_NAME && unsafe { ptr.add(len).read() } != 0 {
        len += 1;
    }
    if len == MAX_RESOURCE_NAME {
        return None;
    }
    // SAFETY: `len` bytes before the NUL were just read.
    let bytes = unsafe { core::slice::from_raw_parts(ptr, len) };
    core::str::from_utf8(bytes).ok()
}
