//! The one piece of trap/interrupt handling the scheduler core depends on
//! directly: the timer-interrupt entry point (spec §4.2). Everything else
//! trap-related — exception dispatch, device interrupts, the user/kernel
//! trapframe dance — is an out-of-scope external collaborator (spec §1).

use crate::proc::policy::SchedPolicy;
use crate::proc::{self, ActivePolicy};

pub fn init() {
    crate::println!("trap init");
}

/// Called once per timer interrupt by board-specific trap plumbing this
/// crate doesn't implement. Runs the per-tick accounting pass and, if the
/// active policy calls for it, yields the running process.
pub fn clock_intr() {
    let running = unsafe { proc::current_cpu() }.current;

    let mut table = proc::lock_table();
    proc::timer::tick(&mut table, running);

    let should_yield = running
        .map(|idx| ActivePolicy::should_yield_on_tick(&table, idx))
        .unwrap_or(false);

    drop(table);

    if should_yield {
        proc::r#yield();
    }
}
