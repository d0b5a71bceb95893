/// maximum number of CPUs
pub const NCPU: usize = 8;
/// maximum number of processes
pub const NPROC: usize = 64;

/// default process priority used by PBS (lower value = higher priority)
pub const DEFAULT_PRIORITY: u8 = 60;
/// PBS/general priority range is `[0, PRIORITY_MAX]`
pub const PRIORITY_MAX: u8 = 100;

/// number of MLFQ levels
pub const MLFQ_LEVELS: usize = 5;
/// per-level quantum in ticks: level 0 is the most preferred
pub const MLFQ_QUANTUM: [u32; MLFQ_LEVELS] = [1, 2, 4, 8, 16];
/// ticks of queue residency without being dispatched before a process is promoted
pub const MLFQ_AGING_THRESHOLD: u32 = 30;
