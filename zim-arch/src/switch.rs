//! The context-switch primitive.
//!
//! `zim_context_switch` pushes the register image onto the current stack,
//! stores the resulting stack pointer into the caller's save slot, adopts
//! the target stack pointer and pops the target's image; the trailing `ret`
//! consumes the entry (or resume) address that sits directly above the
//! image. `zim_context_load` is the save-nothing variant used to abandon
//! the bootstrap flow into the first task.
//!
//! Both routines use the Windows x64 argument registers regardless of host
//! OS; the `extern "win64"` declarations below keep Rust callers honest.

use core::arch::global_asm;

global_asm!(
    ".global zim_context_switch",
    "zim_context_switch:",
    // rcx = save slot (*mut *mut u8), rdx = target stack pointer.
    "push r15",
    "push r14",
    "push r13",
    "push r12",
    "push rsi",
    "push rdi",
    "push rbx",
    "push rbp",
    "push r9",
    "push r8",
    "push rdx",
    "push rcx",
    "mov [rcx], rsp",
    "mov rsp, rdx",
    "pop rcx",
    "pop rdx",
    "pop r8",
    "pop r9",
    "pop rbp",
    "pop rbx",
    "pop rdi",
    "pop rsi",
    "pop r12",
    "pop r13",
    "pop r14",
    "pop r15",
    "ret",
    ".global zim_context_load",
    "zim_context_load:",
    // rcx = stack pointer to adopt; the abandoned flow is never resumed.
    "mov rsp, rcx",
    "pop rcx",
    "pop rdx",
    "pop r8",
    "pop r9",
    "pop rbp",
    "pop rbx",
    "pop rdi",
    "pop rsi",
    "pop r12",
    "pop r13",
    "pop r14",
    "pop r15",
    "ret",
);

extern "win64" {
    /// Save the live register state through `save_slot` and resume
    /// `target_sp`. Appears to return when a later switch resumes the
    /// saved state.
    pub fn zim_context_switch(save_slot: *mut *mut u8, target_sp: *mut u8);

    /// Adopt `target_sp` without saving anything. The current flow is
    /// abandoned.
    pub fn zim_context_load(target_sp: *mut u8) -> !;
}
