//! The kernel facade: wiring, bootstrap and signal handling.
//!
//! Bootstrap is a strict three-phase sequence:
//!
//! 1. [`setup_infrastructure`](Kernel::setup_infrastructure): carve the
//!    heap out of the arena, build the object builder, and construct every
//!    core component through it.
//! 2. [`setup_boot_tasks`](Kernel::setup_boot_tasks): bring up the root
//!    and idle tasks and enqueue them.
//! 3. [`start_engine`](Kernel::start_engine): bind the kernel to the
//!    signal dispatcher and abandon the bootstrap flow into the root task.
//!
//! From then on the kernel only ever runs inside
//! [`on_signal_received`](crate::signal::SignalListener::on_signal_received).

use core::ptr::NonNull;

use zim_alloc::{Arena, Heap, RawAllocator};
use zim_common::align::align_up;
use zim_common::boot::BootRecord;
use zim_common::message::{Message, MessageType};
use zim_common::task::{TaskPriority, TaskState};

use crate::bus::{MessageBus, MessageCallback};
use crate::collections::List;
use crate::config;
use crate::error::KernelError;
use crate::hooks::PlatformHooks;
use crate::proxy::KernelProxy;
use crate::sched::{RoundRobin, SchedulingStrategy};
use crate::service::TaskService;
use crate::signal::{SignalDispatcher, SignalEvent, SignalListener, SignalPacket, SignalType};
use crate::stack::StackBuffer;
use crate::task::factory::TaskFactory;
use crate::task::lifecycle::TaskLifecycle;
use crate::task::{TaskArchive, TaskControlBlock, TaskExecutionInfo, TaskName, TaskResourceConfig};
use crate::KernelBuilder;

/// Smallest arena the kernel will accept behind its own object.
const MIN_BOOT_ARENA: usize = 4 * 1024;

/// The single contiguous RAM region handed in at boot.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
    /// Lowest address of the region.
    pub base: NonNull<u8>,
    /// Region size in bytes.
    pub size: usize,
}

impl MemoryRegion {
    /// Describe a region.
    #[must_use]
    pub const fn new(base: NonNull<u8>, size: usize) -> Self {
        Self { base, size }
    }
}

/// The kernel facade. Lives placement-constructed at the head of the RAM
/// region; everything else is funded by the arena behind it.
pub struct Kernel {
    hooks: &'static PlatformHooks,
    boot: BootRecord,
    arena: Arena,

    // Infrastructure, populated by `setup_infrastructure`. Components
    // live in arena/heap memory and are reached through raw pointers; the
    // cooperative single-core discipline rules out concurrent access.
    heap: Option<NonNull<Heap>>,
    builder: Option<NonNull<KernelBuilder>>,
    bus: Option<NonNull<MessageBus>>,
    factory: Option<NonNull<TaskFactory>>,
    strategy: Option<NonNull<RoundRobin>>,
    lifecycle: Option<NonNull<TaskLifecycle>>,
    archives: Option<NonNull<List<TaskArchive>>>,
    runtime: Option<NonNull<KernelProxy>>,
    service: Option<NonNull<TaskService>>,

    // Boot tasks, populated by `setup_boot_tasks`.
    root: Option<NonNull<TaskControlBlock>>,
    idle: Option<NonNull<TaskControlBlock>>,
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel").finish_non_exhaustive()
    }
}

impl Kernel {
    /// Place the kernel at the head of `region` and hand the rest to the
    /// arena.
    ///
    /// # Safety
    ///
    /// The region must be valid for reads and writes, exclusively owned
    /// by the kernel, and live for the rest of the program (`'static`).
    pub unsafe fn install(
        region: MemoryRegion,
        boot: BootRecord,
        hooks: &'static PlatformHooks,
    ) -> Result<&'static mut Kernel, KernelError> {
        if !boot.is_valid() {
            return Err(KernelError::InvalidBootRecord);
        }

        let base = region.base.as_ptr() as usize;
        let end = base + region.size;
        let head = align_up(base, core::mem::align_of::<Kernel>());
        let body = head + core::mem::size_of::<Kernel>();
        if body >= end || end - body < MIN_BOOT_ARENA {
            return Err(KernelError::RegionTooSmall);
        }

        // SAFETY: `body..end` is inside the caller-owned region and
        // disjoint from the kernel's own bytes.
        let arena = unsafe { Arena::new(NonNull::new_unchecked(body as *mut u8), end - body) };

        let kernel = Kernel {
            hooks,
            boot,
            arena,
            heap: None,
            builder: None,
            bus: None,
            factory: None,
            strategy: None,
            lifecycle: None,
            archives: None,
            runtime: None,
            service: None,
            root: None,
            idle: None,
        };

        let slot = head as *mut Kernel;
        // SAFETY: `head..body` is inside the caller-owned region.
        unsafe { slot.write(kernel) };
        // SAFETY: Just written; the region contract makes it `'static`.
        Ok(unsafe { &mut *slot })
    }

    /// Phase 1: build the allocator hierarchy and every core component.
    pub fn setup_infrastructure(&mut self) -> Result<(), KernelError> {
        // Heap size: what we'd like, capped at 80 % of what the arena
        // still has.
        let cap = self.arena.free_size() * config::HEAP_SHARE_NUM / config::HEAP_SHARE_DEN;
        let heap_size = config::PREFERRED_HEAP_SIZE.min(cap);

        let block = self
            .arena
            .allocate(heap_size, 16)
            .ok_or(KernelError::ArenaExhausted)?;
        // SAFETY: Fresh arena block, exclusively ours.
        let heap = unsafe { Heap::install(block, heap_size)? };
        self.heap = Some(heap);

        // The builder lives in the arena and charges the heap.
        // SAFETY: The heap sits in the 'static RAM region.
        let heap_ref: &'static Heap = unsafe { &*heap.as_ptr() };
        let builder_slot = self
            .arena
            .allocate(
                core::mem::size_of::<KernelBuilder>(),
                core::mem::align_of::<KernelBuilder>(),
            )
            .ok_or(KernelError::ArenaExhausted)?
            .cast::<KernelBuilder>();
        // SAFETY: Fresh arena allocation, sized and aligned for the
        // builder.
        unsafe { builder_slot.as_ptr().write(KernelBuilder::new(heap_ref)) };
        self.builder = Some(builder_slot);
        // SAFETY: As for the heap.
        let builder: &'static KernelBuilder = unsafe { &*builder_slot.as_ptr() };

        // Everything below here is a builder-constructed object.
        let bus = builder
            .construct(MessageBus::new(builder)?)
            .ok_or(KernelError::OutOfMemory)?;
        self.bus = Some(bus);

        let factory = builder
            .construct(TaskFactory::new(builder, self.hooks.task_context_factory))
            .ok_or(KernelError::OutOfMemory)?;
        self.factory = Some(factory);

        let strategy = builder
            .construct(RoundRobin::new(builder))
            .ok_or(KernelError::OutOfMemory)?;
        self.strategy = Some(strategy);

        let lifecycle = builder
            .construct(TaskLifecycle::new(builder, factory))
            .ok_or(KernelError::OutOfMemory)?;
        self.lifecycle = Some(lifecycle);

        let archives = builder
            .construct(List::new(builder))
            .ok_or(KernelError::OutOfMemory)?;
        self.archives = Some(archives);

        let runtime = builder
            .construct(KernelProxy::new(
                bus,
                self.hooks.sched_control,
                self.hooks.resource_manager,
                self.hooks.refresh_display,
            ))
            .ok_or(KernelError::OutOfMemory)?;
        self.runtime = Some(runtime);

        let service = builder
            .construct(TaskService::new(
                lifecycle, strategy, builder, runtime, archives,
            ))
            .ok_or(KernelError::OutOfMemory)?;
        self.service = Some(service);

        // SAFETY: Bus constructed above; single-flow bootstrap.
        let bus_ref = unsafe { &mut *bus.as_ptr() };
        TaskService::install(service, bus_ref).map_err(|_| KernelError::OutOfMemory)?;
        bus_ref
            .subscribe(
                MessageType::EventPrint,
                MessageCallback::new(print_handler, core::ptr::null_mut()),
            )
            .map_err(|_| KernelError::OutOfMemory)?;

        log::info!(
            "infrastructure up: {} byte heap, {} byte arena free",
            heap_size,
            self.arena.free_size()
        );
        Ok(())
    }

    /// Phase 2: bring up the root and idle tasks.
    pub fn setup_boot_tasks(&mut self) -> Result<(), KernelError> {
        let builder = self.builder_ref()?;
        let (Some(lifecycle), Some(strategy), Some(archives), Some(runtime)) =
            (self.lifecycle, self.strategy, self.archives, self.runtime)
        else {
            return Err(KernelError::NotBootstrapped);
        };
        // SAFETY: Components constructed in phase 1; single-flow
        // bootstrap.
        let (lifecycle, strategy, archives) = unsafe {
            (
                &mut *lifecycle.as_ptr(),
                &mut *strategy.as_ptr(),
                &mut *archives.as_ptr(),
            )
        };

        // Root task: entry from the boot record, served by a fresh proxy.
        let root_stack = StackBuffer::create(builder, config::ROOT_STACK_SIZE)
            .ok_or(KernelError::OutOfMemory)?;
        let root = lifecycle.spawn_task(
            TaskName::new("root"),
            TaskExecutionInfo {
                entry: self.boot.root_task_entry,
                runtime: runtime.as_ptr().cast(),
                config: self.boot.config_ptr,
            },
            TaskResourceConfig {
                priority: TaskPriority::Root,
                stack: root_stack,
            },
        )?;

        // Idle task: kernel-internal loop, config is the kernel itself.
        let idle_stack = StackBuffer::create(builder, config::IDLE_STACK_SIZE)
            .ok_or(KernelError::OutOfMemory)?;
        let idle = lifecycle.spawn_task(
            TaskName::new("idle"),
            TaskExecutionInfo {
                entry: idle_task_entry,
                runtime: runtime.as_ptr().cast(),
                config: (self as *mut Kernel).cast(),
            },
            TaskResourceConfig {
                priority: TaskPriority::Idle,
                stack: idle_stack,
            },
        )?;

        strategy.make_task_ready(root);
        strategy.make_task_ready(idle);

        for tcb in [root, idle] {
            // SAFETY: Freshly spawned TCBs are alive.
            let t = unsafe { tcb.as_ref() };
            let archive = TaskArchive {
                id: t.id(),
                entry: t.exec().entry,
                priority: t.priority(),
                name: *t.name(),
                tcb,
            };
            archives
                .push_back(archive)
                .map_err(|_| KernelError::OutOfMemory)?;
        }

        self.root = Some(root);
        self.idle = Some(idle);
        // SAFETY: Freshly spawned TCBs are alive.
        let (root_id, idle_id) = unsafe { (root.as_ref().id(), idle.as_ref().id()) };
        log::info!("boot tasks ready: root={} idle={}", root_id, idle_id);
        Ok(())
    }

    /// Phase 3: bind the signal listener, open the gate, and abandon the
    /// bootstrap flow into the root task.
    ///
    /// The abandoned flow is parked in a context nothing ever schedules;
    /// control coming back here is a breach and panics.
    pub fn start_engine(&mut self) -> ! {
        let (Some(root), Some(lifecycle)) = (self.root, self.lifecycle) else {
            panic!("start_engine before setup_boot_tasks");
        };

        // SAFETY: The kernel lives in the 'static RAM region.
        let listener: &'static Kernel = unsafe { &*(self as *const Kernel) };
        self.hooks.dispatcher.bind_listener(listener);
        self.hooks.dispatcher.activate();

        let Some(boot_ctx) = self.hooks.task_context_factory.create_context() else {
            panic!("no context to park the bootstrap flow in");
        };

        // SAFETY: Single-flow bootstrap; root TCB and its context are
        // armed and alive.
        unsafe {
            (*lifecycle.as_ptr()).set_current_task(Some(root));
            let root_ctx = (*root.as_ptr()).context();
            (*boot_ctx.as_ptr()).transit_to(&mut *root_ctx.as_ptr());
        }

        panic!("control flow breached back into the bootstrap path");
    }

    fn builder_ref(&self) -> Result<&'static KernelBuilder, KernelError> {
        match self.builder {
            // SAFETY: The builder sits in the 'static RAM region.
            Some(builder) => Ok(unsafe { &*builder.as_ptr() }),
            None => Err(KernelError::NotBootstrapped),
        }
    }

    /// The boot record the kernel was started with.
    #[must_use]
    pub fn boot_record(&self) -> &BootRecord {
        &self.boot
    }

    /// The platform hooks.
    #[must_use]
    pub fn platform_hooks(&self) -> &'static PlatformHooks {
        self.hooks
    }

    /// The message bus, once phase 1 ran.
    #[must_use]
    pub fn bus_mut(&mut self) -> Option<&mut MessageBus> {
        // SAFETY: Bus is alive; callers hold `&mut self`.
        self.bus.map(|bus| unsafe { &mut *bus.as_ptr() })
    }

    /// The runtime handle tasks talk through, once phase 1 ran.
    #[must_use]
    pub fn runtime(&self) -> Option<&KernelProxy> {
        // SAFETY: Proxy is alive for the kernel's lifetime.
        self.runtime.map(|rt| unsafe { &*rt.as_ptr() })
    }

    /// The task service, once phase 1 ran.
    #[must_use]
    pub fn task_service_mut(&mut self) -> Option<&mut TaskService> {
        // SAFETY: Service is alive; callers hold `&mut self`.
        self.service.map(|svc| unsafe { &mut *svc.as_ptr() })
    }

    /// The root task, once phase 2 ran.
    #[must_use]
    pub fn root_task(&self) -> Option<NonNull<TaskControlBlock>> {
        self.root
    }

    /// The idle task, once phase 2 ran.
    #[must_use]
    pub fn idle_task(&self) -> Option<NonNull<TaskControlBlock>> {
        self.idle
    }

    pub(crate) fn arena_ref(&self) -> &Arena {
        &self.arena
    }

    pub(crate) fn heap_ptr(&self) -> Option<NonNull<Heap>> {
        self.heap
    }

    pub(crate) fn builder_ptr(&self) -> Option<NonNull<KernelBuilder>> {
        self.builder
    }

    pub(crate) fn bus_ptr(&self) -> Option<NonNull<MessageBus>> {
        self.bus
    }

    pub(crate) fn factory_ptr(&self) -> Option<NonNull<TaskFactory>> {
        self.factory
    }

    pub(crate) fn strategy_ptr(&self) -> Option<NonNull<RoundRobin>> {
        self.strategy
    }

    pub(crate) fn lifecycle_ptr(&self) -> Option<NonNull<TaskLifecycle>> {
        self.lifecycle
    }

    pub(crate) fn archives_ptr(&self) -> Option<NonNull<List<TaskArchive>>> {
        self.archives
    }

    // -- Signal handling

    /// Yield trap: drain the bus, reap retired tasks, requeue the current
    /// task and transit to whatever the strategy picks next.
    fn handle_yield(&self) {
        let (Some(lifecycle), Some(strategy), Some(bus)) =
            (self.lifecycle, self.strategy, self.bus)
        else {
            log::error!("yield trap before bootstrap completed");
            return;
        };

        let gate = GateGuard::close(self.hooks.dispatcher);

        // SAFETY: Trap path; single flow touches the components.
        unsafe {
            let lifecycle = &mut *lifecycle.as_ptr();
            let strategy = &mut *strategy.as_ptr();

            (*bus.as_ptr()).dispatch_messages();
            lifecycle.reap();

            let Some(mut cur) = lifecycle.get_current_task() else {
                return;
            };
            cur.as_mut().set_state(TaskState::Ready);
            strategy.make_task_ready(cur);

            let Some(mut next) = strategy.pick_next_ready_task() else {
                return;
            };
            next.as_mut().set_state(TaskState::Running);
            if next == cur {
                // Only ourselves ready; keep running without a switch.
                return;
            }

            lifecycle.set_current_task(Some(next));
            let cur_ctx = cur.as_ref().context();
            let next_ctx = next.as_ref().context();
            drop(gate);
            (*cur_ctx.as_ptr()).transit_to(&mut *next_ctx.as_ptr());
            // Resumed: somebody transited back into us and already made
            // us current again.
        }
    }

    /// Terminate trap: retire the current task and transit onward. The
    /// retired stack and context are reclaimed on the next trap, once
    /// execution has left them.
    fn handle_terminate(&self) {
        let (Some(lifecycle), Some(strategy), Some(bus)) =
            (self.lifecycle, self.strategy, self.bus)
        else {
            log::error!("terminate trap before bootstrap completed");
            return;
        };

        let gate = GateGuard::close(self.hooks.dispatcher);

        // SAFETY: Trap path; single flow touches the components.
        unsafe {
            let lifecycle = &mut *lifecycle.as_ptr();
            let strategy = &mut *strategy.as_ptr();

            (*bus.as_ptr()).dispatch_messages();

            let Some(cur) = lifecycle.get_current_task() else {
                return;
            };
            log::info!("task {} terminated", cur.as_ref().id());
            strategy.remove_task(cur);
            lifecycle.retire(cur);

            let Some(mut next) = strategy.pick_next_ready_task() else {
                panic!("no runnable task after terminate");
            };
            next.as_mut().set_state(TaskState::Running);
            lifecycle.set_current_task(Some(next));

            let cur_ctx = cur.as_ref().context();
            let next_ctx = next.as_ref().context();
            drop(gate);
            (*cur_ctx.as_ptr()).transit_to(&mut *next_ctx.as_ptr());
            // A terminated task is never resumed.
        }
    }

    /// Interrupts are routed onto the bus where a subsystem can pick them
    /// up; a detailed handler table is the platform's business.
    fn handle_interrupt(&self, event: SignalEvent) {
        match event {
            SignalEvent::Keyboard => {
                let Some(bus) = self.bus else { return };
                // SAFETY: Trap path; single flow touches the bus.
                if let Err(err) =
                    unsafe { (*bus.as_ptr()).publish(Message::new(MessageType::EventKeyboard)) }
                {
                    log::warn!("keyboard event dropped: {}", err);
                }
            }
            SignalEvent::Timer => {
                // Cooperative core: ticks carry no scheduling meaning.
            }
            other => log::debug!("unrouted interrupt event {:?}", other),
        }
    }

    /// Exceptions are logged and dropped; killing the offender would need
    /// fault attribution the core does not carry.
    fn handle_exception(&self, packet: &SignalPacket<'_>) {
        match &packet.frame {
            Some(frame) => log::error!(
                "exception {:?} at ip={:#x} sp={:#x} (ignored)",
                packet.event,
                frame.instruction_pointer(),
                frame.stack_pointer()
            ),
            None => log::error!("exception {:?} without frame (ignored)", packet.event),
        }
    }
}

impl SignalListener for Kernel {
    fn on_signal_received(&self, packet: SignalPacket<'_>) {
        match packet.ty {
            SignalType::Trap => match packet.event {
                SignalEvent::Yield => self.handle_yield(),
                SignalEvent::Terminate => self.handle_terminate(),
                other => log::warn!("unhandled trap event {:?}", other),
            },
            SignalType::Interrupt => self.handle_interrupt(packet.event),
            SignalType::Exception => self.handle_exception(&packet),
            SignalType::Directive => {
                log::debug!("directive {:?} ignored", packet.event);
            }
        }
    }
}

/// Closes the signal gate for the duration of a kernel critical section.
struct GateGuard<'a> {
    dispatcher: &'a dyn SignalDispatcher,
}

impl<'a> GateGuard<'a> {
    fn close(dispatcher: &'a dyn SignalDispatcher) -> Self {
        dispatcher.deactivate();
        Self { dispatcher }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.activate();
    }
}

/// EVENT_PRINT → kernel log.
fn print_handler(msg: &Message, _ctx: *mut ()) {
    crate::logging::log_print_event(msg);
}

/// The kernel-internal idle loop: park the CPU, then offer it back.
extern "C" fn idle_task_entry(runtime: *mut (), config: *mut ()) {
    // SAFETY: The kernel armed this task with its own proxy and itself as
    // config; both outlive every task.
    let proxy = unsafe { KernelProxy::from_raw(runtime) };
    let kernel = config as *const Kernel;
    loop {
        // SAFETY: As above.
        (unsafe { &*kernel }.hooks.halt)();
        proxy.yield_now();
    }
}
