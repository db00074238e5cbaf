//! Register image saved on a suspended task's stack.

/// The register image, in the order the switch primitive pushes and pops
/// it. The saved stack pointer of a suspended context points at the `rcx`
/// field.
///
/// The four argument registers are included so the factory can deliver the
/// entry arguments through the first restore; the rest are the Windows x64
/// callee-saved set (minus the stack pointer, which is the image's address
/// itself).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct SavedRegs {
    pub rcx: u64,
    pub rdx: u64,
    pub r8: u64,
    pub r9: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

impl SavedRegs {
    /// A zeroed register image.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            rcx: 0,
            rdx: 0,
            r8: 0,
            r9: 0,
            rbp: 0,
            rbx: 0,
            rdi: 0,
            rsi: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }
}

// The switch primitive pushes twelve 8-byte registers; keep the Rust view
// in lockstep with it.
const _: () = assert!(core::mem::size_of::<SavedRegs>() == 96);
