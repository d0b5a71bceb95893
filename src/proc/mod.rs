//! The process table, per-CPU state, and the coordination primitives that
//! sit on top of them (spec §3, §4.1, §4.5, §4.6).
//!
//! Everything the four scheduling policies disagree about lives behind the
//! [`policy::SchedPolicy`] trait; everything they agree on — slot
//! allocation, parent/child bookkeeping, sleep/wakeup, the scheduler loop —
//! lives here once. The whole table, the MLFQ queues and `next_pid` share a
//! single lock (spec §5, §9: "no finer-grained locks exist within the
//! core"), which is why `fork`/`exit`/`wait` read like straight-line
//! sequences instead of the teacher's per-process-lock dance.

pub mod mlfq;
pub mod policy;
pub mod timer;

use crate::error::KernelError;
use crate::param::{MLFQ_LEVELS, NCPU, NPROC, PRIORITY_MAX};
use crate::riscv::interrupts;
use crate::spinlock::SpinLock;
use crate::sync::OnceLock;
use crate::vm::{Uvm, VA};

use mlfq::MlfqStore;
use policy::SchedPolicy;

#[cfg(feature = "sched-rr")]
pub type ActivePolicy = policy::RoundRobin;
#[cfg(feature = "sched-fcfs")]
pub type ActivePolicy = policy::Fcfs;
#[cfg(feature = "sched-pbs")]
pub type ActivePolicy = policy::Pbs;
#[cfg(feature = "sched-mlfq")]
pub type ActivePolicy = policy::Mlfq;

/// Register set swapped by `swtch` (spec §6: out-of-scope collaborator,
/// kept only as the opaque payload `Proc`/`Cpu` hand to it).
#[derive(Debug, Default, Clone, Copy)]
#[repr(C)]
pub struct Context {
    pub ra: usize,
    pub sp: usize,
    pub s: [usize; 12],
}

#[cfg(not(test))]
unsafe extern "C" {
    /// Saves the registers described by `old` and loads those in `new`.
    ///
    /// Defined in board-specific assembly (spec §6); this crate only ever
    /// takes its address.
    fn swtch(old: *mut Context, new: *mut Context);
}

#[cfg(test)]
unsafe fn swtch(_old: *mut Context, _new: *mut Context) {}

/// What a SLEEPING process is waiting for (spec §4.1's sleep/wakeup model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Waiting on a specific process, identified by pid (e.g. `wait`).
    Proc(u32),
    /// Waiting for the next timer tick.
    Ticks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Unused,
    Embryo,
    Runnable,
    Running,
    Sleeping,
    Zombie,
}

/// One process-table slot (spec §3).
#[derive(Debug)]
pub struct Proc {
    pub state: ProcState,
    pub pid: u32,
    pub parent: Option<usize>,
    pub chan: Option<Channel>,
    pub killed: bool,
    pub xstate: i32,

    pub ctime: u64,
    pub etime: u64,
    pub rtime: u64,
    pub iotime: u64,
    pub cur_waiting_time: u64,
    pub n_run: u64,

    /// PBS priority; lower is more favored (spec §4.3.3).
    pub priority: u8,
    /// PBS aging counter (spec §4.3.3).
    pub chance: u32,

    /// MLFQ level, 0 is most favored (spec §4.3.4).
    pub queue_no: i8,
    pub cur_ticks: u32,
    pub enter_time: u64,
    pub change_queue: bool,
    pub ticks: [u64; MLFQ_LEVELS],

    pub pagetable: Option<Uvm>,
    pub kstack: VA,
    pub context: Context,
}

/// MLFQ's level starts at 0 for every new process; other policies leave
/// `queue_no` at -1 since it's meaningless to them (spec §3).
#[cfg(feature = "sched-mlfq")]
const fn default_queue_no() -> i8 {
    0
}

#[cfg(not(feature = "sched-mlfq"))]
const fn default_queue_no() -> i8 {
    -1
}

impl Proc {
    fn new() -> Self {
        Self {
            state: ProcState::Unused,
            pid: 0,
            parent: None,
            chan: None,
            killed: false,
            xstate: 0,
            ctime: 0,
            etime: 0,
            rtime: 0,
            iotime: 0,
            cur_waiting_time: 0,
            n_run: 0,
            priority: crate::param::DEFAULT_PRIORITY,
            chance: 0,
            queue_no: default_queue_no(),
            cur_ticks: 0,
            enter_time: 0,
            change_queue: false,
            ticks: [0; MLFQ_LEVELS],
            pagetable: None,
            kstack: VA::default(),
            context: Context::default(),
        }
    }
}

/// The single owned collection guarding every process slot, the MLFQ
/// queues, and pid allocation (spec §9's suggested redesign, applied).
#[derive(Debug)]
pub struct ProcTable {
    pub procs: [Proc; NPROC],
    next_pid: u32,
    pub mlfq: MlfqStore,
    pub ticks: u64,
}

impl ProcTable {
    fn new() -> Self {
        Self {
            procs: core::array::from_fn(|_| Proc::new()),
            next_pid: 0,
            mlfq: MlfqStore::new(),
            ticks: 0,
        }
    }

    /// Finds an UNUSED slot, assigns it a fresh pid, and marks it EMBRYO
    /// (spec §4.1 "allocate").
    fn alloc(&mut self) -> Result<usize, KernelError> {
        for i in 0..NPROC {
            if self.procs[i].state == ProcState::Unused {
                self.next_pid += 1;
                let pid = self.next_pid;
                self.procs[i] = Proc::new();
                self.procs[i].state = ProcState::Embryo;
                self.procs[i].pid = pid;
                self.procs[i].ctime = self.ticks;
                self.procs[i].enter_time = self.ticks;
                return Ok(i);
            }
        }
        Err(KernelError::OutOfProc)
    }
}

static TABLE: OnceLock<SpinLock<ProcTable>> = OnceLock::new();

/// Tracks the process-table index of `init`, so `exit` can reparent orphans
/// to it (spec §4.1).
static INIT_PROC: OnceLock<usize> = OnceLock::new();

/// Builds the process table. Must run once, before `user_init`.
pub fn init() {
    TABLE
        .initialize(|| Ok::<_, core::convert::Infallible>(SpinLock::new(ProcTable::new(), "proc_table")))
        .expect("proc::init called twice");
}

fn table() -> &'static SpinLock<ProcTable> {
    TABLE.get().expect("proc table not initialized; call proc::init() first")
}

/// Locks the process table. Exposed to `trap` so the timer tick can run the
/// accounting pass under the same lock used everywhere else.
pub(crate) fn lock_table() -> crate::spinlock::SpinLockGuard<'static, ProcTable> {
    table().lock()
}

/// One CPU's unprotected scheduling state (spec §5: "interrupts are enabled
/// only between scheduling decisions"; the current-process pointer and
/// scheduler context are core-local and not covered by the table lock).
#[derive(Debug, Clone, Copy)]
pub struct Cpu {
    pub current: Option<usize>,
    context: Context,
    num_off: i32,
    interrupts_enabled: bool,
}

impl Cpu {
    const fn new() -> Self {
        Self {
            current: None,
            context: Context {
                ra: 0,
                sp: 0,
                s: [0; 12],
            },
            num_off: 0,
            interrupts_enabled: false,
        }
    }
}

struct CpuTable(core::cell::UnsafeCell<[Cpu; NCPU]>);

// Safety: each slot is only ever touched by the hart it belongs to, under
// an `InterruptLock` that pins that hart to this code for the duration.
unsafe impl Sync for CpuTable {}

impl CpuTable {
    const fn new() -> Self {
        Self(core::cell::UnsafeCell::new([Cpu::new(); NCPU]))
    }
}

static CPU_TABLE: CpuTable = CpuTable::new();

/// Returns an id uniquely identifying the CPU (hart) running this code.
///
/// # Safety
/// The caller must already have interrupts disabled, so the id can't go
/// stale from under it if this thread migrates harts mid-call.
#[cfg(not(test))]
pub unsafe fn current_id() -> usize {
    unsafe { crate::riscv::registers::tp::read() }
}

#[cfg(test)]
pub unsafe fn current_id() -> usize {
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);
    thread_local! {
        static ID: Cell<Option<usize>> = const { Cell::new(None) };
    }

    // `cargo test` may run test bodies on more distinct OS threads than
    // NCPU over the life of the process (tests are serialized on `SERIAL`,
    // not pinned to a fixed thread pool), so wrap rather than hand out an
    // id `current_cpu` can't index. Aliasing two threads onto the same
    // slot is safe here because `SERIAL` already ensures only one test
    // body touches `CPU_TABLE` at a time.
    ID.with(|id| {
        if let Some(v) = id.get() {
            v
        } else {
            let v = NEXT.fetch_add(1, Ordering::Relaxed) % NCPU;
            id.set(Some(v));
            v
        }
    })
}

/// Returns this hart's local state.
///
/// # Safety
/// Caller must hold an [`InterruptLock`] (e.g. via [`lock_current_cpu`]) so
/// interrupts can't migrate this code to another hart while the reference
/// is live.
pub unsafe fn current_cpu() -> &'static mut Cpu {
    let id = unsafe { current_id() };
    unsafe { &mut (*CPU_TABLE.0.get())[id] }
}

fn push_off() {
    let was_enabled = interrupts::get();
    interrupts::disable();

    let cpu = unsafe { current_cpu() };
    if cpu.num_off == 0 {
        cpu.interrupts_enabled = was_enabled;
    }
    cpu.num_off += 1;
}

fn pop_off() {
    assert!(!interrupts::get(), "pop_off: interruptible");

    let cpu = unsafe { current_cpu() };
    assert!(cpu.num_off >= 1, "pop_off: not held");
    cpu.num_off -= 1;

    if cpu.num_off == 0 && cpu.interrupts_enabled {
        interrupts::enable();
    }
}

/// RAII guard pairing the teacher's `push_off`/`pop_off`: interrupts stay
/// disabled on this hart for as long as one of these is alive anywhere on
/// the call stack (they nest).
pub struct InterruptLock;

impl Drop for InterruptLock {
    fn drop(&mut self) {
        pop_off();
    }
}

pub fn lock_current_cpu() -> InterruptLock {
    push_off();
    InterruptLock
}

/// Returns the process-table index of the process running on this hart, if
/// any.
fn my_proc_idx() -> Option<usize> {
    let _lk = lock_current_cpu();
    unsafe { current_cpu() }.current
}

fn index_two_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "index_two_mut: same index");
    if a < b {
        let (left, right) = slice.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Relinquishes the CPU back to the scheduler loop (spec §4.5). The table
/// lock is held across the switch by design: the process calling `sched`
/// holds it going in, and whichever `scheduler()` invocation resumes this
/// hart next releases it, mirroring the teacher's `sched`/`scheduler` pair.
fn sched(table: &mut crate::spinlock::SpinLockGuard<'_, ProcTable>, idx: usize) {
    debug_assert!(!interrupts::get(), "sched: interruptible");
    debug_assert_ne!(table.procs[idx].state, ProcState::Running, "sched: still running");

    #[cfg(not(test))]
    unsafe {
        let proc_ctx = &mut table.procs[idx].context as *mut Context;
        let cpu_ctx = &mut current_cpu().context as *mut Context;
        swtch(proc_ctx, cpu_ctx);
    }
}

fn dispatch(table: &mut ProcTable, idx: usize) {
    table.procs[idx].state = ProcState::Running;
    table.procs[idx].n_run += 1;
    table.procs[idx].cur_waiting_time = 0;
    ActivePolicy::on_dispatch(table, idx);
    unsafe { current_cpu() }.current = Some(idx);
}

/// One pass of the per-hart scheduling loop: select a process under the
/// active policy, dispatch it, switch into it, and run its post-return
/// bookkeeping once it gives the CPU back. Returns whether a process was
/// actually dispatched. Factored out of `scheduler()` so tests and the
/// `demos/` harness can drive the scheduler deterministically one step at a
/// time instead of only through the real infinite loop.
pub fn schedule_once() -> bool {
    let mut table = table().lock();
    let cpu_id = unsafe { current_id() };

    let Some(idx) = ActivePolicy::select(&mut table, cpu_id) else {
        return false;
    };

    dispatch(&mut table, idx);
    sched(&mut table, idx);
    unsafe { current_cpu() }.current = None;

    if table.procs[idx].state == ProcState::Runnable {
        ActivePolicy::on_return(&mut table, idx);
    }

    true
}

/// The per-hart scheduling loop (spec §4.3, §4.6). Never returns.
pub fn scheduler() -> ! {
    loop {
        interrupts::enable();
        schedule_once();
    }
}

/// The first thing a freshly forked process runs once `scheduler()` swtches
/// into it for the very first time (spec §4.6). A process that has run
/// before resumes inside `sched` instead, with the lock already released by
/// `scheduler`'s own post-swtch code; a brand new one is handed the lock
/// still held and must drop it itself exactly once.
pub fn fork_ret() {
    unsafe { table().force_unlock() };
    interrupts::enable();
}

/// Allocates the first user process (spec §4.1). Must run once, after
/// `init`.
pub fn user_init() {
    let mut table = table().lock();
    let idx = table.alloc().expect("user_init: out of proc slots");

    table.procs[idx].pagetable = Some(Uvm::try_new().expect("user_init: out of memory"));
    table.procs[idx].state = ProcState::Runnable;
    ActivePolicy::on_wakeup(&mut table, idx);

    drop(table);

    INIT_PROC
        .initialize(|| Ok::<_, core::convert::Infallible>(idx))
        .expect("user_init called twice");
}

/// Creates a copy of the calling process (spec §4.1).
pub fn fork() -> Result<u32, KernelError> {
    let parent_idx = try_log!(my_proc_idx().ok_or(KernelError::NoSuchProcess));

    let mut table = table().lock();
    let child_idx = try_log!(table.alloc());

    let uvm = match Uvm::try_new() {
        Ok(uvm) => uvm,
        Err(e) => {
            table.procs[child_idx] = Proc::new();
            return Err(e);
        }
    };
    table.procs[child_idx].pagetable = Some(uvm);

    {
        let (parent, child) = index_two_mut(&mut table.procs, parent_idx, child_idx);
        let parent_uvm = parent.pagetable.as_ref().expect("fork: parent has no address space");
        let child_uvm = child.pagetable.as_mut().expect("fork: child has no address space");

        if let Err(e) = parent_uvm.fork_copy(child_uvm) {
            child.pagetable = None;
            child.state = ProcState::Unused;
            return Err(e);
        }

        child.priority = parent.priority;
        child.parent = Some(parent_idx);
    }

    let child_pid = table.procs[child_idx].pid;
    table.procs[child_idx].state = ProcState::Runnable;
    ActivePolicy::on_wakeup(&mut table, child_idx);

    Ok(child_pid)
}

fn reparent_children(table: &mut ProcTable, idx: usize) {
    let init_idx = INIT_PROC.get().copied();

    for i in 0..NPROC {
        if table.procs[i].parent == Some(idx) {
            table.procs[i].parent = init_idx;
            if table.procs[i].state == ProcState::Zombie {
                if let Some(init_idx) = init_idx {
                    let init_pid = table.procs[init_idx].pid;
                    wakeup_locked(table, Channel::Proc(init_pid));
                }
            }
        }
    }
}

/// Terminates the calling process (spec §4.1). Never returns: the scheduler
/// reaps the slot once a parent calls `wait`/`waitx`.
pub fn exit(status: i32) -> ! {
    let idx = my_proc_idx().expect("exit: no current process");
    assert_ne!(INIT_PROC.get().copied(), Some(idx), "init exiting");

    {
        let mut table = table().lock();

        reparent_children(&mut table, idx);

        table.procs[idx].xstate = status;
        table.procs[idx].etime = table.ticks;
        if let Some(pt) = table.procs[idx].pagetable.as_mut() {
            pt.teardown();
        }
        table.procs[idx].state = ProcState::Zombie;

        if let Some(parent_idx) = table.procs[idx].parent {
            let parent_pid = table.procs[parent_idx].pid;
            wakeup_locked(&mut table, Channel::Proc(parent_pid));
        }

        sched(&mut table, idx);
    }

    unreachable!("exit: a zombie process was rescheduled");
}

/// Blocks the calling process until a direct child exits, reaps it, and
/// returns its pid and exit status (spec §4.1).
pub fn wait() -> Option<(u32, i32)> {
    let parent_idx = my_proc_idx()?;
    wait_for_zombie_child(parent_idx).map(|(pid, xstate, ..)| (pid, xstate))
}

/// As [`wait`], but also reports the reaped child's run time and wait time
/// (spec §4.1's "accounting" extension).
pub fn waitx() -> Option<(u32, i32, u64, u64)> {
    let parent_idx = my_proc_idx()?;
    wait_for_zombie_child(parent_idx)
}

fn wait_for_zombie_child(parent_idx: usize) -> Option<(u32, i32, u64, u64)> {
    let mut table = table().lock();

    loop {
        let mut have_children = false;

        for i in 0..NPROC {
            if table.procs[i].parent != Some(parent_idx) {
                continue;
            }
            have_children = true;

            if table.procs[i].state == ProcState::Zombie {
                let pid = table.procs[i].pid;
                let xstate = table.procs[i].xstate;
                let rtime = table.procs[i].rtime;
                let iotime = table.procs[i].iotime;
                let wtime = table.procs[i]
                    .etime
                    .saturating_sub(rtime)
                    .saturating_sub(iotime)
                    .saturating_sub(table.procs[i].ctime);
                table.procs[i] = Proc::new();
                return Some((pid, xstate, rtime, wtime));
            }
        }

        if !have_children || table.procs[parent_idx].killed {
            return None;
        }

        let parent_pid = table.procs[parent_idx].pid;
        table.procs[parent_idx].chan = Some(Channel::Proc(parent_pid));
        table.procs[parent_idx].state = ProcState::Sleeping;
        sched(&mut table, parent_idx);
        table.procs[parent_idx].chan = None;
    }
}

/// Puts the calling process to sleep on `chan` (spec §4.1). Because the
/// whole table shares one lock, there is no separate condition lock to hand
/// off: checking the wakeup condition and committing to sleep happen
/// atomically under the same lock the checker already holds, so the usual
/// missed-wakeup race the teacher's generic `sleep<T>` guards against can't
/// occur here (spec §9).
pub fn sleep(chan: Channel) {
    let idx = my_proc_idx().expect("sleep: no current process");
    let mut table = table().lock();

    table.procs[idx].chan = Some(chan);
    table.procs[idx].state = ProcState::Sleeping;

    sched(&mut table, idx);

    table.procs[idx].chan = None;
}

/// Wakes every process sleeping on `chan` (spec §4.1).
pub fn wakeup(chan: Channel) {
    let mut table = table().lock();
    wakeup_locked(&mut table, chan);
}

pub(crate) fn wakeup_locked(table: &mut ProcTable, chan: Channel) {
    for i in 0..NPROC {
        if table.procs[i].state == ProcState::Sleeping && table.procs[i].chan == Some(chan) {
            table.procs[i].state = ProcState::Runnable;
            table.procs[i].chan = None;
            ActivePolicy::on_wakeup(table, i);
        }
    }
}

/// Marks `pid` killed; wakes it immediately if it was sleeping (spec
/// §4.1).
pub fn kill(pid: u32) -> bool {
    let mut table = table().lock();

    for i in 0..NPROC {
        if table.procs[i].pid == pid && table.procs[i].state != ProcState::Unused {
            table.procs[i].killed = true;
            if table.procs[i].state == ProcState::Sleeping {
                table.procs[i].state = ProcState::Runnable;
                table.procs[i].chan = None;
                ActivePolicy::on_wakeup(&mut table, i);
            }
            return true;
        }
    }
    false
}

/// Sets `pid`'s PBS priority, returning its previous value (spec §4.3.3).
/// Resets its aging counter: a priority change restarts the band it now
/// competes in. If the caller lowered its own numeric priority (a more
/// important process may now exist), it yields immediately so the
/// scheduler can re-select before the caller keeps running.
pub fn set_priority(new_priority: u8, pid: u32) -> Result<i32, KernelError> {
    if new_priority > PRIORITY_MAX {
        return Err(KernelError::InvalidArgument);
    }

    let caller_idx = my_proc_idx();

    let old = {
        let mut table = table().lock();

        let idx = try_log!((0..NPROC)
            .find(|&i| table.procs[i].pid == pid && table.procs[i].state != ProcState::Unused)
            .ok_or(KernelError::NoSuchProcess));

        let old = table.procs[idx].priority;
        table.procs[idx].priority = new_priority;
        table.procs[idx].chance = 0;

        if new_priority < old && caller_idx == Some(idx) {
            table.procs[idx].state = ProcState::Runnable;
            ActivePolicy::on_return(&mut table, idx);
            sched(&mut table, idx);
        }

        old
    };

    Ok(old as i32)
}

/// Gives up the CPU for one scheduling round without blocking (spec
/// §4.1).
pub fn r#yield() {
    let idx = my_proc_idx().expect("yield: no current process");
    let mut table = table().lock();

    table.procs[idx].state = ProcState::Runnable;
    ActivePolicy::on_return(&mut table, idx);

    sched(&mut table, idx);
}

/// Returns the calling process's pid.
pub fn my_pid() -> Option<u32> {
    let idx = my_proc_idx()?;
    Some(table().lock().procs[idx].pid)
}

/// Ticks elapsed since boot.
pub fn uptime() -> u64 {
    table().lock().ticks
}

/// Prints a snapshot of every live process (spec §4.6, §9). Intentionally
/// reads the table without taking its lock: a best-effort debug listing,
/// never consulted by a scheduling decision, so a torn read is harmless.
pub fn my_ps() {
    let table = unsafe { table().get_mut_unchecked() };

    crate::println!("pid\tstate\tpriority\tqueue\trtime\tiotime");
    for p in table.procs.iter() {
        if p.state == ProcState::Unused {
            continue;
        }
        crate::println!(
            "{}\t{:?}\t{}\t{}\t{}\t{}",
            p.pid,
            p.state,
            p.priority,
            p.queue_no,
            p.rtime,
            p.iotime
        );
    }
}

#[cfg(test)]
pub(crate) fn set_current_for_test(idx: Option<usize>) {
    let _lk = lock_current_cpu();
    unsafe { current_cpu() }.current = idx;
}
