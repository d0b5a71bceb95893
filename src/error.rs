use core::fmt::Display;

/// Kernel error codes.
///
/// Resource exhaustion and invalid-argument failures (spec §7) are reported
/// through this type rather than panicking; structural-impossibility
/// failures still use `assert!`/`panic!` directly at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The process table has no `UNUSED` slot.
    OutOfProc,
    /// Kernel-stack allocation failed for a new process.
    Alloc,
    /// Address-space copy failed while forking.
    Vm,
    /// An argument was outside its allowed range (e.g. `set_priority`).
    InvalidArgument,
    /// No such pid.
    NoSuchProcess,
}

impl Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            KernelError::OutOfProc => write!(f, "out of proc"),
            KernelError::Alloc => write!(f, "alloc error"),
            KernelError::Vm => write!(f, "vm error"),
            KernelError::InvalidArgument => write!(f, "invalid argument"),
            KernelError::NoSuchProcess => write!(f, "no such process"),
        }
    }
}

/// Return an error, logging file:line. Use instead of `return Err(...)`.
#[macro_export]
macro_rules! err {
    ($e:expr) => {{
        #[cfg(debug_assertions)]
        $crate::println!("! errored at {}:{}: {}", file!(), line!(), $e);
        return Err($e.into());
    }};
}

/// Log an error without consuming it.
#[macro_export]
macro_rules! log {
    ($e:expr) => {
        match $e {
            Ok(v) => Ok(v),
            Err(e) => {
                #[cfg(debug_assertions)]
                $crate::println!("  at {}:{}", file!(), line!());
                Err(e)
            }
        }
    };
}

/// Propagate an error with location logging. Use instead of bare `?`.
#[macro_export]
macro_rules! try_log {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => {
                #[cfg(debug_assertions)]
                $crate::println!("  at {}:{}", file!(), line!());
                return Err(e.into());
            }
        }
    };
}
