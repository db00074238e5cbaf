//! Task service: the bus-facing task management surface.
//!
//! Subscribes to `SYS_LOAD_TASK` and turns spawn-request messages into
//! live, scheduled tasks. Also offers graceful removal by id.
//!
//! Spawn-request payload shape:
//! - `payload[0]`: entry function address (non-zero)
//! - `payload[1]`: task config pointer
//! - `payload[2]`: priority discriminant
//! - `payload[3]`: stack size in bytes (0 selects the default)

use core::ptr::NonNull;

use zim_common::message::{Message, MessageType};
use zim_common::task::{TaskEntry, TaskPriority};

use crate::bus::{MessageBus, MessageCallback};
use crate::collections::List;
use crate::config;
use crate::error::BusError;
use crate::proxy::KernelProxy;
use crate::sched::SchedulingStrategy;
use crate::stack::StackBuffer;
use crate::task::lifecycle::TaskLifecycle;
use crate::task::{TaskArchive, TaskExecutionInfo, TaskName, TaskResourceConfig};
use crate::KernelBuilder;

/// Bus-driven task management.
pub struct TaskService {
    lifecycle: NonNull<TaskLifecycle>,
    strategy: NonNull<dyn SchedulingStrategy>,
    builder: &'static KernelBuilder,
    runtime: NonNull<KernelProxy>,
    archives: NonNull<List<TaskArchive>>,
}

impl TaskService {
    /// Service wiring the given components together. `runtime` is the
    /// proxy injected into every spawned task.
    pub fn new(
        lifecycle: NonNull<TaskLifecycle>,
        strategy: NonNull<dyn SchedulingStrategy>,
        builder: &'static KernelBuilder,
        runtime: NonNull<KernelProxy>,
        archives: NonNull<List<TaskArchive>>,
    ) -> Self {
        Self {
            lifecycle,
            strategy,
            builder,
            runtime,
            archives,
        }
    }

    /// Subscribe the service to spawn requests on `bus`.
    pub fn install(service: NonNull<TaskService>, bus: &mut MessageBus) -> Result<(), BusError> {
        bus.subscribe(
            MessageType::SysLoadTask,
            MessageCallback::new(Self::spawn_trampoline, service.as_ptr().cast()),
        )
    }

    fn spawn_trampoline(msg: &Message, ctx: *mut ()) {
        // SAFETY: Bound to the live service at subscription time.
        let service = unsafe { &mut *(ctx as *mut TaskService) };
        service.handle_spawn_request(msg);
    }

    /// Decode a spawn request and bring the task up. Malformed requests
    /// are dropped (with a log line); resource failures are recoverable
    /// and only fail this spawn.
    pub fn handle_spawn_request(&mut self, msg: &Message) {
        let entry_addr = msg.payload[0] as usize;
        if entry_addr == 0 {
            log::warn!("spawn request without entry point dropped");
            return;
        }
        // SAFETY: The requester vouches for the address; the kernel
        // cannot validate code pointers.
        let entry: TaskEntry = unsafe { core::mem::transmute(entry_addr) };

        let Some(priority) = TaskPriority::from_raw(msg.payload[2] as u8) else {
            log::warn!("spawn request with bad priority {} dropped", msg.payload[2]);
            return;
        };

        let stack_size = match msg.payload[3] as usize {
            0 => config::DEFAULT_TASK_STACK_SIZE,
            size => size,
        };
        let Some(stack) = StackBuffer::create(self.builder, stack_size) else {
            log::error!("spawn failed: no memory for a {} byte stack", stack_size);
            return;
        };

        let exec = TaskExecutionInfo {
            entry,
            runtime: self.runtime.as_ptr().cast(),
            config: msg.payload[1] as usize as *mut (),
        };
        let res = TaskResourceConfig { priority, stack };

        // SAFETY: Lifecycle and strategy live in kernel memory for the
        // kernel's lifetime; single-flow access per the concurrency
        // discipline.
        let (lifecycle, strategy) = unsafe {
            (
                &mut *self.lifecycle.as_ptr(),
                &mut *self.strategy.as_ptr(),
            )
        };

        match lifecycle.spawn_task(TaskName::new("task"), exec, res) {
            Ok(tcb) => {
                strategy.make_task_ready(tcb);
                // SAFETY: TCB freshly spawned and registered.
                let id = unsafe { tcb.as_ref() }.id();
                let archive = TaskArchive {
                    id,
                    entry,
                    priority,
                    name: TaskName::new("task"),
                    tcb,
                };
                // SAFETY: Archives list lives in kernel memory.
                if unsafe { &mut *self.archives.as_ptr() }.push_back(archive).is_err() {
                    log::warn!("no archive slot for task {}", id);
                }
                log::info!("task {} loaded via bus request", id);
            }
            Err(err) => log::error!("spawn request failed: {}", err),
        }
    }

    /// Remove a task from scheduling and destroy it.
    ///
    /// Must not be used on the currently running task; termination of the
    /// running task goes through the `Terminate` trap.
    pub fn kill_task_by_id(&mut self, id: u32) -> bool {
        // SAFETY: As in `handle_spawn_request`.
        let (lifecycle, strategy) = unsafe {
            (
                &mut *self.lifecycle.as_ptr(),
                &mut *self.strategy.as_ptr(),
            )
        };

        let Some(tcb) = lifecycle.get_task(id) else {
            return false;
        };
        lifecycle.destroy_task(tcb, strategy);
        // SAFETY: Archives list lives in kernel memory.
        unsafe { &mut *self.archives.as_ptr() }.remove_match(|a| a.id == id);
        log::info!("task {} destroyed", id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::RoundRobin;
    use crate::task::factory::TaskFactory;
    use crate::testutil::static_builder;
    use core::ptr::NonNull;
    use std::boxed::Box;
    use zim_common::task::{TaskContext, TaskContextFactory};

    extern "C" fn spawned_entry(_rt: *mut (), _cfg: *mut ()) {}

    struct NullContext {
        top: Option<NonNull<u8>>,
    }
    impl TaskContext for NullContext {
        unsafe fn setup_flow(&mut self, _entry: zim_common::task::TaskEntry, top: NonNull<u8>) {
            self.top = Some(top);
        }
        fn load_argument(&mut self, _index: usize, _value: usize) {}
        unsafe fn transit_to(&mut self, _target: &mut dyn TaskContext) {}
        fn stack_pointer(&self) -> Option<NonNull<u8>> {
            self.top
        }
    }

    struct BoxFactory;
    impl TaskContextFactory for BoxFactory {
        fn create_context(&self) -> Option<NonNull<dyn TaskContext>> {
            let ctx: Box<dyn TaskContext> = Box::new(NullContext { top: None });
            NonNull::new(Box::into_raw(ctx))
        }
        unsafe fn destroy_context(&self, ctx: NonNull<dyn TaskContext>) {
            // SAFETY: Contexts come from Box::into_raw above.
            drop(unsafe { Box::from_raw(ctx.as_ptr()) });
        }
    }

    struct Fixture {
        bus: NonNull<MessageBus>,
        service: NonNull<TaskService>,
        lifecycle: NonNull<TaskLifecycle>,
        strategy: NonNull<RoundRobin>,
    }

    fn fixture() -> Fixture {
        let builder = static_builder(256 * 1024);
        let bus = builder.construct(MessageBus::new(builder).unwrap()).unwrap();
        let factory = builder
            .construct(TaskFactory::new(builder, Box::leak(Box::new(BoxFactory))))
            .unwrap();
        let lifecycle = builder
            .construct(TaskLifecycle::new(builder, factory))
            .unwrap();
        let strategy = builder.construct(RoundRobin::new(builder)).unwrap();
        let archives = builder.construct(List::new(builder)).unwrap();

        // The proxy needs hooks; for service tests only the bus matters.
        struct NopControl;
        impl crate::hooks::SchedulingControl for NopControl {
            fn yield_current_task(&self) {}
            fn terminate_current_task(&self) {}
        }
        struct NopResources;
        impl crate::hooks::ResourceRegistry for NopResources {
            fn query(&self, _name: &str) -> Option<zim_common::resource::HardwareResource> {
                None
            }
        }
        fn nop() {}
        let proxy = builder
            .construct(KernelProxy::new(
                bus,
                Box::leak(Box::new(NopControl)),
                Box::leak(Box::new(NopResources)),
                nop,
            ))
            .unwrap();

        let service = builder
            .construct(TaskService::new(lifecycle, strategy, builder, proxy, archives))
            .unwrap();
        // SAFETY: Bus constructed above and alive.
        TaskService::install(service, unsafe { &mut *bus.as_ptr() }).unwrap();

        Fixture {
            bus,
            service,
            lifecycle,
            strategy,
        }
    }

    fn spawn_request(stack: u64) -> Message {
        Message::with_payload(
            MessageType::SysLoadTask,
            [
                spawned_entry as usize as u64,
                0,
                TaskPriority::Normal as u8 as u64,
                stack,
            ],
        )
    }

    #[test]
    fn test_spawn_request_creates_scheduled_task() {
        let f = fixture();
        // SAFETY: Fixture components are alive (leaked into the builder
        // heap).
        unsafe {
            let bus = &mut *f.bus.as_ptr();
            bus.publish(spawn_request(2048)).unwrap();
            bus.dispatch_messages();

            let lifecycle = &*f.lifecycle.as_ptr();
            assert_eq!(lifecycle.task_count(), 1);
            assert_eq!((*f.strategy.as_ptr()).ready_count(), 1);

            let tcb = lifecycle.get_task(1).unwrap();
            assert!(tcb.as_ref().is_queued());
            assert_eq!(tcb.as_ref().priority(), TaskPriority::Normal);
            assert_eq!(tcb.as_ref().stack().size(), 2048);
        }
    }

    #[test]
    fn test_malformed_spawn_requests_are_dropped() {
        let f = fixture();
        // SAFETY: As above.
        unsafe {
            let bus = &mut *f.bus.as_ptr();
            // No entry point.
            bus.publish(Message::with_payload(MessageType::SysLoadTask, [0, 0, 0, 0]))
                .unwrap();
            // Bad priority.
            bus.publish(Message::with_payload(
                MessageType::SysLoadTask,
                [spawned_entry as usize as u64, 0, 99, 0],
            ))
            .unwrap();
            bus.dispatch_messages();
            assert_eq!((*f.lifecycle.as_ptr()).task_count(), 0);
        }
    }

    #[test]
    fn test_kill_task_by_id() {
        let f = fixture();
        // SAFETY: As above.
        unsafe {
            let bus = &mut *f.bus.as_ptr();
            bus.publish(spawn_request(0)).unwrap();
            bus.dispatch_messages();
            assert_eq!((*f.lifecycle.as_ptr()).task_count(), 1);

            let service = &mut *f.service.as_ptr();
            assert!(service.kill_task_by_id(1));
            assert!(!service.kill_task_by_id(1));
            assert_eq!((*f.lifecycle.as_ptr()).task_count(), 0);
            assert_eq!((*f.strategy.as_ptr()).ready_count(), 0);
        }
    }
}
