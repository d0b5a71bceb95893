//! Thin per-syscall wrappers over `proc`'s coordination primitives (spec
//! §6's syscall wrapper table).

use crate::error::KernelError;
use crate::proc;

pub fn sys_fork() -> Result<usize, KernelError> {
    proc::fork().map(|pid| pid as usize)
}

pub fn sys_exit(status: i32) -> ! {
    proc::exit(status)
}

pub fn sys_wait() -> Result<usize, KernelError> {
    proc::wait()
        .map(|(pid, _xstate)| pid as usize)
        .ok_or(KernelError::NoSuchProcess)
}

pub fn sys_waitx() -> Result<usize, KernelError> {
    proc::waitx()
        .map(|(pid, ..)| pid as usize)
        .ok_or(KernelError::NoSuchProcess)
}

pub fn sys_kill(pid: u32) -> Result<usize, KernelError> {
    if proc::kill(pid) {
        Ok(0)
    } else {
        Err(KernelError::NoSuchProcess)
    }
}

pub fn sys_getpid() -> Result<usize, KernelError> {
    proc::my_pid().map(|pid| pid as usize).ok_or(KernelError::NoSuchProcess)
}

pub fn sys_set_priority(priority: u8, pid: u32) -> Result<usize, KernelError> {
    proc::set_priority(priority, pid).map(|old| old as usize)
}

pub fn sys_yield() -> Result<usize, KernelError> {
    proc::r#yield();
    Ok(0)
}

pub fn sys_uptime() -> Result<usize, KernelError> {
    Ok(proc::uptime() as usize)
}
