//! Full-system bootstrap tests over a mock platform.
//!
//! The mock context factory hands out recording contexts. The first
//! transit (the engine start) synchronously executes the target's entry
//! function; every later transit is recorded only, so handler logic can be
//! observed without real stack switching. The mock dispatcher forwards
//! triggers straight into the bound listener.

use core::cell::{Cell, RefCell};
use core::ptr::NonNull;

use zim_common::boot::{BootRecord, BOOT_MAGIC, BOOT_VERSION};
use zim_common::message::{Message, MessageType};
use zim_common::resource::{HardwareResource, ResourceKind};
use zim_common::task::{TaskContext, TaskContextFactory, TaskEntry};

use zim_kernel::bus::MessageCallback;
use zim_kernel::hooks::{PlatformHooks, SchedulingControl};
use zim_kernel::inspect::KernelInspector;
use zim_kernel::proxy::KernelProxy;
use zim_kernel::resource::StaticResourceTable;
use zim_kernel::signal::{
    SignalContext, SignalDispatcher, SignalEvent, SignalListener, SignalPacket, SignalType,
};
use zim_kernel::{Kernel, KernelError, MemoryRegion};

// -- Mock platform

/// Shared state of the synchronous test engine.
struct EngineState {
    /// Set when the first transit has executed its target.
    started: Cell<bool>,
    /// Total transits observed.
    transits: Cell<u32>,
    /// Every context the factory handed out.
    contexts: RefCell<Vec<*mut MockContext>>,
    /// Contexts given back through `destroy_context`.
    destroyed: Cell<u32>,
}

impl EngineState {
    fn leaked() -> &'static Self {
        Box::leak(Box::new(Self {
            started: Cell::new(false),
            transits: Cell::new(0),
            contexts: RefCell::new(Vec::new()),
            destroyed: Cell::new(0),
        }))
    }
}

/// Records arming and transits; never touches real stacks.
struct MockContext {
    engine: &'static EngineState,
    entry: Cell<Option<TaskEntry>>,
    top: Cell<Option<NonNull<u8>>>,
    args: Cell<[usize; 4]>,
}

impl MockContext {
    fn new(engine: &'static EngineState) -> Self {
        Self {
            engine,
            entry: Cell::new(None),
            top: Cell::new(None),
            args: Cell::new([0; 4]),
        }
    }
}

impl TaskContext for MockContext {
    unsafe fn setup_flow(&mut self, entry: TaskEntry, stack_top: NonNull<u8>) {
        self.entry.set(Some(entry));
        self.top.set(Some(stack_top));
    }

    fn load_argument(&mut self, index: usize, value: usize) {
        if index < 4 {
            let mut args = self.args.get();
            args[index] = value;
            self.args.set(args);
        }
    }

    unsafe fn transit_to(&mut self, target: &mut dyn TaskContext) {
        self.engine.transits.set(self.engine.transits.get() + 1);
        if self.engine.started.get() {
            // Synchronous engine: only the initial jump executes.
            return;
        }
        self.engine.started.set(true);

        let Some(sp) = target.stack_pointer() else { return };
        let record = self
            .engine
            .contexts
            .borrow()
            .iter()
            .copied()
            // SAFETY: Factory-produced contexts are leaked, never freed.
            .find(|&ctx| unsafe { (*ctx).top.get() } == Some(sp));
        if let Some(ctx) = record {
            // SAFETY: As above.
            let (entry, args) = unsafe { ((*ctx).entry.get(), (*ctx).args.get()) };
            if let Some(entry) = entry {
                entry(args[0] as *mut (), args[1] as *mut ());
            }
        }
    }

    fn stack_pointer(&self) -> Option<NonNull<u8>> {
        self.top.get()
    }
}

struct MockContextFactory {
    engine: &'static EngineState,
}

impl TaskContextFactory for MockContextFactory {
    fn create_context(&self) -> Option<NonNull<dyn TaskContext>> {
        let ctx = Box::leak(Box::new(MockContext::new(self.engine)));
        self.engine.contexts.borrow_mut().push(ctx);
        NonNull::new(ctx as *mut MockContext as *mut dyn TaskContext)
    }

    unsafe fn destroy_context(&self, _ctx: NonNull<dyn TaskContext>) {
        // Contexts stay leaked so transit records keep resolving; only
        // count the teardown.
        self.engine.destroyed.set(self.engine.destroyed.get() + 1);
    }
}

/// Forwards triggers straight to the bound listener when active.
struct MockDispatcher {
    listener: Cell<Option<&'static dyn SignalListener>>,
    active: Cell<bool>,
}

impl MockDispatcher {
    fn leaked() -> &'static Self {
        Box::leak(Box::new(Self {
            listener: Cell::new(None),
            active: Cell::new(false),
        }))
    }
}

impl SignalDispatcher for MockDispatcher {
    fn bind_listener(&self, listener: &'static dyn SignalListener) {
        self.listener.set(Some(listener));
    }

    fn activate(&self) {
        self.active.set(true);
    }

    fn deactivate(&self) {
        self.active.set(false);
    }

    fn trigger(&self, ty: SignalType, event: SignalEvent, frame: Option<&mut dyn SignalContext>) {
        if !self.active.get() {
            return;
        }
        if let Some(listener) = self.listener.get() {
            listener.on_signal_received(SignalPacket { ty, event, frame });
        }
    }
}

struct MockSchedControl {
    dispatcher: &'static MockDispatcher,
}

impl SchedulingControl for MockSchedControl {
    fn yield_current_task(&self) {
        self.dispatcher
            .trigger(SignalType::Trap, SignalEvent::Yield, None);
    }

    fn terminate_current_task(&self) {
        self.dispatcher
            .trigger(SignalType::Trap, SignalEvent::Terminate, None);
    }
}

fn halt_hook() {}
fn refresh_hook() {}

struct Platform {
    engine: &'static EngineState,
    dispatcher: &'static MockDispatcher,
    hooks: &'static PlatformHooks,
}

fn mock_platform() -> Platform {
    let engine = EngineState::leaked();
    let dispatcher = MockDispatcher::leaked();
    let sched_control = Box::leak(Box::new(MockSchedControl { dispatcher }));
    let context_factory = Box::leak(Box::new(MockContextFactory { engine }));

    let mut resources = StaticResourceTable::<8>::new();
    resources
        .register(
            "DISPLAY_LFB",
            HardwareResource::new(0xC000_0000, 0x4000, ResourceKind::Framebuffer),
        )
        .unwrap();
    let resources = Box::leak(Box::new(resources));

    let hooks = Box::leak(Box::new(PlatformHooks {
        sched_control,
        dispatcher,
        task_context_factory: context_factory,
        resource_manager: resources,
        halt: halt_hook,
        refresh_display: refresh_hook,
        reboot: None,
    }));

    Platform {
        engine,
        dispatcher,
        hooks,
    }
}

fn ram_region(bytes: usize) -> MemoryRegion {
    let buf = Box::leak(vec![0u128; bytes / 16].into_boxed_slice());
    MemoryRegion::new(
        NonNull::new(buf.as_mut_ptr().cast::<u8>()).unwrap(),
        bytes,
    )
}

fn boot_record(root: TaskEntry, config: *mut ()) -> BootRecord {
    BootRecord {
        magic: BOOT_MAGIC,
        version: BOOT_VERSION,
        root_task_entry: root,
        idle_task_entry: None,
        config_ptr: config,
        memory_size: 64 * 1024,
        extra_section_count: 0,
        sections_table: core::ptr::null(),
    }
}

extern "C" fn nop_entry(_rt: *mut (), _cfg: *mut ()) {}

// -- Tests

#[test]
fn test_bootstrap_reaches_ready_state() {
    let platform = mock_platform();
    let region = ram_region(64 * 1024);
    let region_start = region.base.as_ptr() as usize;

    // SAFETY: Leaked region, exclusively the kernel's.
    let kernel = unsafe { Kernel::install(region, boot_record(nop_entry, core::ptr::null_mut()), platform.hooks) }
        .unwrap();

    // The kernel object itself lives inside the simulated RAM.
    assert!((kernel as *const Kernel as usize) >= region_start);

    kernel.setup_infrastructure().unwrap();
    kernel.setup_boot_tasks().unwrap();

    let ki = KernelInspector::new(kernel);
    let heap_free = ki.heap_free_size().unwrap();
    assert!(heap_free > 0 && heap_free < 64 * 1024, "heap size negotiation");
    assert!(ki.live_objects().unwrap() > 0);
    assert_eq!(ki.task_count(), 2);
    assert_eq!(ki.ready_count(), 2);
    assert_eq!(ki.archive_count(), 2);
    assert_eq!(ki.current_task_id(), None, "nothing runs before start_engine");

    // Root and idle are armed with distinct contexts and stacks.
    let root = kernel.root_task().unwrap();
    let idle = kernel.idle_task().unwrap();
    // SAFETY: Boot TCBs are alive.
    unsafe {
        assert_ne!(root.as_ref().context(), idle.as_ref().context());
        assert_eq!(root.as_ref().name().as_str(), "root");
        assert_eq!(idle.as_ref().name().as_str(), "idle");
    }
    assert_eq!(platform.engine.contexts.borrow().len(), 2);
}

#[test]
fn test_install_validates_inputs() {
    let platform = mock_platform();

    let mut bad = boot_record(nop_entry, core::ptr::null_mut());
    bad.magic = 0x1234_5678;
    // SAFETY: Leaked region.
    let err = unsafe { Kernel::install(ram_region(64 * 1024), bad, platform.hooks) }.unwrap_err();
    assert_eq!(err, KernelError::InvalidBootRecord);

    // A region that cannot even hold the kernel and a minimal arena.
    // SAFETY: Leaked region.
    let err = unsafe {
        Kernel::install(
            ram_region(1024),
            boot_record(nop_entry, core::ptr::null_mut()),
            platform.hooks,
        )
    }
    .unwrap_err();
    assert_eq!(err, KernelError::RegionTooSmall);
}

/// Observations the root task records while it runs.
struct RootProbe {
    kernel: Cell<*mut Kernel>,
    print_seen: Cell<bool>,
    ready_after_yield: Cell<usize>,
    pending_after_yield: Cell<usize>,
    current_after_yield: Cell<Option<u32>>,
}

impl RootProbe {
    fn leaked() -> &'static Self {
        Box::leak(Box::new(Self {
            kernel: Cell::new(core::ptr::null_mut()),
            print_seen: Cell::new(false),
            ready_after_yield: Cell::new(0),
            pending_after_yield: Cell::new(usize::MAX),
            current_after_yield: Cell::new(None),
        }))
    }
}

fn print_flag_cb(_msg: &Message, ctx: *mut ()) {
    // SAFETY: Bound to the live probe at subscription time.
    let probe = unsafe { &*(ctx as *const RootProbe) };
    probe.print_seen.set(true);
}

extern "C" fn yielding_root_entry(rt: *mut (), cfg: *mut ()) {
    // SAFETY: The kernel armed this task with its proxy and the test's
    // probe.
    let proxy = unsafe { KernelProxy::from_raw(rt) };
    let probe = unsafe { &*(cfg as *const RootProbe) };

    let _ = proxy.publish(&Message::with_text(MessageType::EventPrint, "root alive"));
    proxy.yield_now();

    // Back from the yield trap: the bus has been drained and the ready
    // queue re-derived.
    // SAFETY: The probe carries the live kernel.
    let kernel = unsafe { &*probe.kernel.get() };
    let ki = KernelInspector::new(kernel);
    probe.ready_after_yield.set(ki.ready_count());
    probe.pending_after_yield.set(ki.pending_messages());
    probe.current_after_yield.set(ki.current_task_id());
}

#[test]
fn test_root_task_publishes_and_yields() {
    let platform = mock_platform();
    let probe = RootProbe::leaked();

    // SAFETY: Leaked region.
    let kernel = unsafe {
        Kernel::install(
            ram_region(64 * 1024),
            boot_record(yielding_root_entry, probe as *const RootProbe as *mut ()),
            platform.hooks,
        )
    }
    .unwrap();
    probe.kernel.set(kernel as *mut Kernel);

    kernel.setup_infrastructure().unwrap();
    kernel.setup_boot_tasks().unwrap();
    kernel
        .bus_mut()
        .unwrap()
        .subscribe(
            MessageType::EventPrint,
            MessageCallback::new(print_flag_cb, probe as *const RootProbe as *mut ()),
        )
        .unwrap();

    // The engine start abandons the bootstrap flow; with the synchronous
    // mock engine the root entry runs inline and control eventually
    // breaches back, which must panic.
    let result = std::panic::catch_unwind(core::panic::AssertUnwindSafe(|| {
        kernel.start_engine();
    }));
    assert!(result.is_err(), "returning into the bootstrap path must panic");

    // The subscriber saw the publish during the yield trap's drain.
    assert!(probe.print_seen.get());
    assert_eq!(probe.pending_after_yield.get(), 0);

    // Root was re-picked (front of the queue), leaving only the idle
    // task queued.
    assert_eq!(probe.ready_after_yield.get(), 1);
    assert_eq!(probe.current_after_yield.get(), Some(1));
    assert!(platform.engine.transits.get() >= 1);

    let ki = KernelInspector::new(kernel);
    let idle = kernel.idle_task().unwrap();
    // SAFETY: Idle TCB is alive and queued.
    assert!(unsafe { idle.as_ref() }.is_queued());
    assert_eq!(ki.ready_count(), 1);
}

/// Root entry for the termination test: asks the platform to terminate
/// it, then (mock engine) returns.
extern "C" fn terminating_root_entry(rt: *mut (), cfg: *mut ()) {
    let _ = rt;
    // SAFETY: The probe carries the live dispatcher.
    let probe = unsafe { &*(cfg as *const TerminateProbe) };
    probe
        .dispatcher
        .get()
        .expect("dispatcher wired")
        .trigger(SignalType::Trap, SignalEvent::Terminate, None);
}

#[derive(Default)]
struct TerminateProbe {
    dispatcher: Cell<Option<&'static MockDispatcher>>,
}

#[test]
fn test_terminate_retires_then_reaps() {
    let platform = mock_platform();
    let probe: &'static TerminateProbe = Box::leak(Box::new(TerminateProbe::default()));
    probe.dispatcher.set(Some(platform.dispatcher));

    // SAFETY: Leaked region.
    let kernel = unsafe {
        Kernel::install(
            ram_region(64 * 1024),
            boot_record(terminating_root_entry, probe as *const TerminateProbe as *mut ()),
            platform.hooks,
        )
    }
    .unwrap();

    kernel.setup_infrastructure().unwrap();
    kernel.setup_boot_tasks().unwrap();

    let result = std::panic::catch_unwind(core::panic::AssertUnwindSafe(|| {
        kernel.start_engine();
    }));
    assert!(result.is_err());

    {
        let ki = KernelInspector::new(kernel);
        // Root is dead and retired; idle took over; reclamation waits for
        // the next trap.
        assert_eq!(ki.task_count(), 1);
        assert_eq!(ki.graveyard_count(), 1);
        assert_eq!(ki.current_task_id(), Some(2), "idle is current");
        assert_eq!(platform.engine.destroyed.get(), 0);
    }

    // A later yield trap reaps the grave.
    platform
        .dispatcher
        .trigger(SignalType::Trap, SignalEvent::Yield, None);
    let ki = KernelInspector::new(kernel);
    assert_eq!(ki.graveyard_count(), 0);
    assert_eq!(platform.engine.destroyed.get(), 1, "root context went back");
    assert_eq!(ki.task_count(), 1);
}

#[test]
fn test_spawn_request_through_the_bus() {
    let platform = mock_platform();
    let region = ram_region(128 * 1024);

    // SAFETY: Leaked region.
    let kernel = unsafe {
        Kernel::install(region, boot_record(nop_entry, core::ptr::null_mut()), platform.hooks)
    }
    .unwrap();
    kernel.setup_infrastructure().unwrap();
    kernel.setup_boot_tasks().unwrap();

    let request = Message::with_payload(
        MessageType::SysLoadTask,
        [nop_entry as usize as u64, 0, 2 /* Normal */, 2048],
    );
    let bus = kernel.bus_mut().unwrap();
    bus.publish(request).unwrap();
    bus.dispatch_messages();

    {
        let ki = KernelInspector::new(kernel);
        assert_eq!(ki.task_count(), 3);
        assert_eq!(ki.ready_count(), 3);
        assert_eq!(ki.archive_count(), 3);
        assert!(ki.task_id_active(3));
    }

    // Graceful removal through the service unwinds everything.
    assert!(kernel.task_service_mut().unwrap().kill_task_by_id(3));
    let ki = KernelInspector::new(kernel);
    assert_eq!(ki.task_count(), 2);
    assert_eq!(ki.ready_count(), 2);
    assert_eq!(ki.archive_count(), 2);
    assert!(!ki.task_id_active(3));
}

#[test]
fn test_keyboard_interrupt_is_republished() {
    let platform = mock_platform();

    // SAFETY: Leaked region.
    let kernel = unsafe {
        Kernel::install(
            ram_region(64 * 1024),
            boot_record(nop_entry, core::ptr::null_mut()),
            platform.hooks,
        )
    }
    .unwrap();
    kernel.setup_infrastructure().unwrap();
    kernel.setup_boot_tasks().unwrap();

    // Bind and open the gate without starting the engine.
    // SAFETY: The kernel is leaked with its region.
    let listener: &'static Kernel = unsafe { &*(kernel as *const Kernel) };
    platform.dispatcher.bind_listener(listener);
    platform.dispatcher.activate();

    platform
        .dispatcher
        .trigger(SignalType::Interrupt, SignalEvent::Keyboard, None);

    let ki = KernelInspector::new(kernel);
    assert_eq!(ki.pending_messages(), 1, "keyboard event waits on the bus");
}
