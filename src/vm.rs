//! Stand-ins for the virtual-memory subsystem.
//!
//! Out of scope per spec §1 ("virtual memory setup and page-table
//! switching" is an external collaborator). `Uvm` keeps just enough shape
//! for `proc::fork`/`proc::exit`/reap to call the same three operations a
//! real port would (`try_new`, `fork_copy`, `teardown`), so those functions
//! read like the teacher's without requiring a real page-table walker.

use crate::error::KernelError;

/// A virtual address. Left as an opaque `usize` newtype — no real user
/// address space exists in this crate, so there is nothing to offset it
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct VA(pub usize);

impl VA {
    pub const fn new(value: usize) -> Self {
        Self(value)
    }
}

impl From<usize> for VA {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

/// A user virtual-memory space stand-in.
#[derive(Debug, Default)]
pub struct Uvm {
    size: usize,
}

impl Uvm {
    /// Analogue of the teacher's `Proc::create_pagetable`: allocates an
    /// (empty) address space for a freshly allocated process.
    pub fn try_new() -> Result<Self, KernelError> {
        Ok(Self { size: 0 })
    }

    /// Copies `self` into `child`, as `fork()` needs to (spec §7: "address-
    /// space copy fails during fork" is a recoverable resource-exhaustion
    /// case, not a panic).
    pub fn fork_copy(&self, child: &mut Uvm) -> Result<(), KernelError> {
        child.size = self.size;
        Ok(())
    }

    /// Tears down the address space when a process is reaped.
    pub fn teardown(&mut self) {
        self.size = 0;
    }
}
