//! Signal contracts: the uniform envelope for traps, interrupts and
//! simulated directives.
//!
//! The platform owns the physical means of raising a signal (hardware
//! interrupt, software trap, simulator injection); the kernel binds itself
//! as the single listener and routes packets from there.

/// How a signal came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// Asynchronous pulse from the outside world (or simulated timing).
    Interrupt,
    /// The CPU faulted on an illegal action.
    Exception,
    /// A synchronous, intentional request from the running flow.
    Trap,
    /// Control signal injected by mocks and test harnesses.
    Directive,
}

/// What, specifically, happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SignalEvent {
    None,
    Timer,
    Keyboard,
    Mouse,
    Network,
    Disk,
    Power,
    Sleep,
    Wakeup,
    Reset,
    Halt,
    Reboot,
    Shutdown,
    Suspend,
    Resume,
    Pause,
    /// The running task gives up the CPU.
    Yield = 0x71,
    /// The running task is done.
    Terminate = 0x72,
}

/// Snapshot of the interrupted flow, supplied by the platform.
///
/// Uniform across hardware and mock injection; no concrete registers are
/// exposed.
pub trait SignalContext {
    /// Instruction pointer at the moment of the signal.
    fn instruction_pointer(&self) -> usize;
    /// Stack pointer at the moment of the signal.
    fn stack_pointer(&self) -> usize;
    /// Patch the interrupted flow's return value (system-call results,
    /// test assertions).
    fn set_return_value(&mut self, value: usize);
}

/// The uniform signal envelope.
pub struct SignalPacket<'a> {
    /// Signal class.
    pub ty: SignalType,
    /// Concrete event.
    pub event: SignalEvent,
    /// The interrupted flow's snapshot, when the platform captured one.
    pub frame: Option<&'a mut dyn SignalContext>,
}

/// Whoever receives signals. In a running system, the kernel.
pub trait SignalListener {
    /// Single entry point for every signal.
    fn on_signal_received(&self, packet: SignalPacket<'_>);
}

/// The platform's signal gate.
///
/// `trigger` is for the platform's own interrupt sources and for test
/// harnesses; the kernel only binds, activates and deactivates.
pub trait SignalDispatcher {
    /// Bind the listener that will receive every future signal.
    fn bind_listener(&self, listener: &'static dyn SignalListener);

    /// Open the gate (enable interrupts / start the simulated clock).
    fn activate(&self);

    /// Close the gate. Used as the critical-section bracket.
    fn deactivate(&self);

    /// Build a packet and deliver it to the bound listener, if the gate is
    /// open.
    fn trigger(&self, ty: SignalType, event: SignalEvent, frame: Option<&mut dyn SignalContext>);
}
