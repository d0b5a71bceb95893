//! Narrow seams onto RISC-V supervisor-mode state.
//!
//! Everything here is an out-of-scope collaborator per spec §1/§6: the real
//! trap/interrupt wiring and the MMU live outside this crate. What remains
//! is the sliver the scheduler core itself touches directly — reading which
//! hart we're on and flipping the supervisor interrupt-enable bit — kept
//! real for an actual riscv64 build and given a host-simulated twin so the
//! scheduling logic is exercisable by `cargo test` (spec §9's "encapsulate
//! behind a narrow interface" applied to the architecture boundary, not
//! just to `swtch`).

pub mod registers {
    pub mod tp {
        /// Reads the hart id out of the thread pointer register.
        ///
        /// # Safety
        /// Must be called with interrupts disabled; see `proc::current_id`.
        #[cfg(not(test))]
        #[inline]
        pub unsafe fn read() -> usize {
            let bits: usize;
            unsafe { core::arch::asm!("mv {}, tp", out(reg) bits) };
            bits
        }

        #[cfg(test)]
        #[inline]
        pub unsafe fn read() -> usize {
            // No real hart on a host test run; give every simulated CPU a
            // stable id instead (see `spinlock::current_cpu_id`).
            0
        }
    }

    pub mod sstatus {
        pub const SIE: usize = 1 << 1;

        #[cfg(not(test))]
        #[inline]
        pub unsafe fn read() -> usize {
            let bits: usize;
            unsafe { core::arch::asm!("csrr {}, sstatus", out(reg) bits) };
            bits
        }

        #[cfg(not(test))]
        #[inline]
        pub unsafe fn write(bits: usize) {
            unsafe { core::arch::asm!("csrw sstatus, {}", in(reg) bits) };
        }
    }
}

pub mod interrupts {
    //! Supervisor interrupt enable/disable, the only piece of trap wiring
    //! the scheduler core reads directly (spec §5: "Interrupts are enabled
    //! only between scheduling decisions, never while the selection
    //! algorithm runs").
    use super::registers::sstatus;

    #[cfg(not(test))]
    #[inline]
    pub fn enable() {
        unsafe { sstatus::write(sstatus::read() | sstatus::SIE) };
    }

    #[cfg(not(test))]
    #[inline]
    pub fn disable() {
        unsafe { sstatus::write(sstatus::read() & !sstatus::SIE) };
    }

    #[cfg(not(test))]
    #[inline]
    pub fn get() -> bool {
        unsafe { (sstatus::read() & sstatus::SIE) != 0 }
    }


    #[cfg(test)]
    pub use sim::{disable, enable, get};
}
