//! Syscall numbering and dispatch for the process-related calls this crate
//! implements (spec §6's syscall wrapper table). Everything else (files,
//! exec, pipes...) is out of scope (spec §1).
//!
//! Decoding arguments out of a real trapframe/user address space is also
//! out of scope: `dispatch` takes already-resolved `usize`s, the way a real
//! port's syscall entry point would hand them off after `copyin`.

use crate::error::KernelError;
use crate::sysproc;

#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Fork = 1,
    Exit = 2,
    Wait = 3,
    WaitX = 4,
    Kill = 5,
    Getpid = 6,
    SetPriority = 7,
    Yield = 8,
    Uptime = 9,
}

impl TryFrom<usize> for Syscall {
    type Error = KernelError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Syscall::Fork),
            2 => Ok(Syscall::Exit),
            3 => Ok(Syscall::Wait),
            4 => Ok(Syscall::WaitX),
            5 => Ok(Syscall::Kill),
            6 => Ok(Syscall::Getpid),
            7 => Ok(Syscall::SetPriority),
            8 => Ok(Syscall::Yield),
            9 => Ok(Syscall::Uptime),
            _ => Err(KernelError::InvalidArgument),
        }
    }
}

/// Dispatches a syscall already decoded into plain `usize` arguments.
pub fn dispatch(num: usize, args: [usize; 2]) -> Result<usize, KernelError> {
    match Syscall::try_from(num)? {
        Syscall::Fork => sysproc::sys_fork(),
        Syscall::Exit => sysproc::sys_exit(args[0] as i32),
        Syscall::Wait => sysproc::sys_wait(),
        Syscall::WaitX => sysproc::sys_waitx(),
        Syscall::Kill => sysproc::sys_kill(args[0] as u32),
        Syscall::Getpid => sysproc::sys_getpid(),
        Syscall::SetPriority => sysproc::sys_set_priority(args[0] as u8, args[1] as u32),
        Syscall::Yield => sysproc::sys_yield(),
        Syscall::Uptime => sysproc::sys_uptime(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_syscall_number_is_rejected() {
        assert_eq!(Syscall::try_from(255), Err(KernelError::InvalidArgument));
    }

    #[test]
    fn dispatch_rejects_unknown_number() {
        assert_eq!(dispatch(255, [0, 0]), Err(KernelError::InvalidArgument));
    }
}
