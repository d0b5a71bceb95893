//! The four scheduling policies (spec §4.3.1–§4.3.4), expressed as a trait
//! with one implementation per policy instead of the source's `#if` chain
//! (spec §9: "prefer a runtime policy enum dispatched through a small
//! interface ... or preserve compile-time selection via generics"). This
//! crate does both: the trait gives each policy a narrow, independently
//! testable surface, and the active one is still pinned at compile time via
//! a Cargo feature (`lib.rs` picks the `ActivePolicy` type alias).
//!
//! `cur_waiting_time`/`n_run` resetting-on-dispatch is common to every
//! policy (spec §9: "time since last dispatched while runnable") and is
//! handled once in `proc::dispatch`, not repeated in each impl below.

use crate::param::{MLFQ_AGING_THRESHOLD, MLFQ_LEVELS, NPROC};

use super::{ProcState, ProcTable};

/// A scheduling policy's effect on selection and on the bookkeeping fields
/// that only that policy cares about.
pub trait SchedPolicy {
    /// Picks at most one RUNNABLE candidate. May mutate queue-only state
    /// (MLFQ's head cleanup/aging, spec §4.3.4 steps 1–2) but must not
    /// change any process's `state`.
    fn select(table: &mut ProcTable, cpu_id: usize) -> Option<usize>;

    /// Runs once the candidate from `select` is about to be marked RUNNING.
    fn on_dispatch(table: &mut ProcTable, idx: usize);

    /// Runs when a dispatched process returns to the scheduler still
    /// RUNNABLE (yielded, or preempted by the timer) — not when it slept or
    /// exited.
    fn on_return(table: &mut ProcTable, idx: usize);

    /// Runs when a SLEEPING process becomes RUNNABLE (wakeup/kill), or when
    /// a freshly allocated process joins the runnable set for the first
    /// time (fork/init).
    fn on_wakeup(table: &mut ProcTable, idx: usize);

    /// Whether the timer should request a voluntary yield from `idx`
    /// (RUNNING) on this tick (spec §4.2, §4.3.2, §9: FCFS never does).
    fn should_yield_on_tick(table: &ProcTable, idx: usize) -> bool;
}

/// §4.3.1 — scan from slot 0 upward for the first RUNNABLE slot.
pub struct RoundRobin;

impl SchedPolicy for RoundRobin {
    fn select(table: &mut ProcTable, _cpu_id: usize) -> Option<usize> {
        (0..NPROC).find(|&i| table.procs[i].state == ProcState::Runnable)
    }

    fn on_dispatch(_table: &mut ProcTable, _idx: usize) {}
    fn on_return(_table: &mut ProcTable, _idx: usize) {}
    fn on_wakeup(_table: &mut ProcTable, _idx: usize) {}

    fn should_yield_on_tick(_table: &ProcTable, _idx: usize) -> bool {
        true
    }
}

/// §4.3.2 — non-preemptive: RUNNABLE slot with the smallest `ctime`, ties
/// broken by slot order.
pub struct Fcfs;

impl SchedPolicy for Fcfs {
    fn select(table: &mut ProcTable, _cpu_id: usize) -> Option<usize> {
        (0..NPROC)
            .filter(|&i| table.procs[i].state == ProcState::Runnable)
            .min_by_key(|&i| (table.procs[i].ctime, i))
    }

    fn on_dispatch(_table: &mut ProcTable, _idx: usize) {}
    fn on_return(_table: &mut ProcTable, _idx: usize) {}
    fn on_wakeup(_table: &mut ProcTable, _idx: usize) {}

    fn should_yield_on_tick(_table: &ProcTable, _idx: usize) -> bool {
        false
    }
}

/// §4.3.3 — priority-based with aging against a "chance" counter.
pub struct Pbs;

impl SchedPolicy for Pbs {
    fn select(table: &mut ProcTable, _cpu_id: usize) -> Option<usize> {
        (0..NPROC)
            .filter(|&i| table.procs[i].state == ProcState::Runnable)
            .min_by_key(|&i| (table.procs[i].priority, table.procs[i].chance, i))
    }

    fn on_dispatch(table: &mut ProcTable, idx: usize) {
        table.procs[idx].chance += 1;
    }

    /// The aging rule (spec §4.3.3): if every other RUNNABLE slot at this
    /// priority now has the same `chance` as the one just dispatched, reset
    /// them all to 0 so each process in the band runs once before any
    /// re-runs.
    fn on_return(table: &mut ProcTable, idx: usize) {
        let priority = table.procs[idx].priority;
        let chance = table.procs[idx].chance;

        let all_equal = (0..NPROC)
            .filter(|&i| table.procs[i].state == ProcState::Runnable)
            .filter(|&i| table.procs[i].priority == priority)
            .all(|i| table.procs[i].chance == chance);

        if all_equal {
            for i in 0..NPROC {
                if table.procs[i].state == ProcState::Runnable && table.procs[i].priority == priority {
                    table.procs[i].chance = 0;
                }
            }
        }
    }

    fn on_wakeup(_table: &mut ProcTable, _idx: usize) {}

    fn should_yield_on_tick(_table: &ProcTable, _idx: usize) -> bool {
        true
    }
}

/// §4.3.4 — five-level multilevel feedback queue.
pub struct Mlfq;

impl Mlfq {
    fn head_cleanup(table: &mut ProcTable) {
        for level in 0..MLFQ_LEVELS {
            if let Some(head) = table.mlfq.peek(level) {
                let state = table.procs[head].state;
                if state == ProcState::Sleeping || state == ProcState::Zombie {
                    table.mlfq.pop(level);
                }
            }
        }
    }

    fn age(table: &mut ProcTable) {
        for level in 1..MLFQ_LEVELS {
            loop {
                let Some(head) = table.mlfq.peek(level) else {
                    break;
                };
                let waited = table.ticks - table.procs[head].enter_time;
                if waited <= MLFQ_AGING_THRESHOLD as u64 {
                    break;
                }
                table.mlfq.pop(level);
                table.procs[head].cur_waiting_time = 0;
                table.procs[head].cur_ticks = 0;
                table.procs[head].change_queue = false;
                table.procs[head].queue_no -= 1;
                table.procs[head].enter_time = table.ticks;
                table.mlfq.push(level - 1, head);
            }
        }
    }
}

impl SchedPolicy for Mlfq {
    fn select(table: &mut ProcTable, _cpu_id: usize) -> Option<usize> {
        Self::head_cleanup(table);
        Self::age(table);

        for level in 0..MLFQ_LEVELS {
            if let Some(head) = table.mlfq.peek(level) {
                if table.procs[head].state == ProcState::Runnable {
                    return table.mlfq.pop(level);
                }
            }
        }
        None
    }

    fn on_dispatch(_table: &mut ProcTable, _idx: usize) {
        // Selection already popped the node off its queue.
    }

    fn on_return(table: &mut ProcTable, idx: usize) {
        let level = table.procs[idx].queue_no as usize;

        if !table.procs[idx].change_queue {
            table.procs[idx].cur_ticks = 0;
            table.procs[idx].enter_time = table.ticks;
            table.mlfq.push(level, idx);
        } else {
            table.procs[idx].cur_ticks = 0;
            table.procs[idx].change_queue = false;
            table.procs[idx].enter_time = table.ticks;
            if (table.procs[idx].queue_no as usize) < MLFQ_LEVELS - 1 {
                table.procs[idx].queue_no += 1;
            }
            let new_level = table.procs[idx].queue_no as usize;
            table.mlfq.push(new_level, idx);
        }
    }

    fn on_wakeup(table: &mut ProcTable, idx: usize) {
        table.procs[idx].cur_ticks = 0;
        table.procs[idx].enter_time = table.ticks;
        table.procs[idx].change_queue = false;
        let level = table.procs[idx].queue_no.max(0) as usize;
        table.mlfq.push(level, idx);
    }

    fn should_yield_on_tick(table: &ProcTable, idx: usize) -> bool {
        table.procs[idx].change_queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ProcTable;

    fn table_with_runnable(states: &[(usize, u8, u32)]) -> ProcTable {
        let mut table = ProcTable::new();
        for &(idx, priority, chance) in states {
            table.procs[idx].state = ProcState::Runnable;
            table.procs[idx].priority = priority;
            table.procs[idx].chance = chance;
        }
        table
    }

    #[test]
    fn round_robin_picks_first_runnable() {
        let mut table = table_with_runnable(&[(5, 60, 0), (2, 60, 0)]);
        assert_eq!(RoundRobin::select(&mut table, 0), Some(2));
    }

    #[test]
    fn fcfs_picks_oldest_ctime() {
        let mut table = table_with_runnable(&[(0, 60, 0), (1, 60, 0)]);
        table.procs[0].ctime = 10;
        table.procs[1].ctime = 3;
        assert_eq!(Fcfs::select(&mut table, 0), Some(1));
    }

    #[test]
    fn fcfs_never_preempts() {
        let table = table_with_runnable(&[(0, 60, 0)]);
        assert!(!Fcfs::should_yield_on_tick(&table, 0));
    }

    #[test]
    fn pbs_prefers_lower_priority_value() {
        let mut table = table_with_runnable(&[(0, 80, 0), (1, 20, 5)]);
        assert_eq!(Pbs::select(&mut table, 0), Some(1));
    }

    #[test]
    fn pbs_resets_chance_once_band_is_level() {
        let mut table = table_with_runnable(&[(0, 60, 2), (1, 60, 2)]);
        Pbs::on_return(&mut table, 0);
        assert_eq!(table.procs[0].chance, 0);
        assert_eq!(table.procs[1].chance, 0);
    }

    #[test]
    fn pbs_does_not_reset_while_band_unequal() {
        let mut table = table_with_runnable(&[(0, 60, 2), (1, 60, 5)]);
        Pbs::on_return(&mut table, 0);
        assert_eq!(table.procs[0].chance, 2);
        assert_eq!(table.procs[1].chance, 5);
    }

    #[test]
    fn mlfq_aging_promotes_after_threshold() {
        let mut table = ProcTable::new();
        table.ticks = 40;
        table.procs[9].state = ProcState::Runnable;
        table.procs[9].queue_no = 2;
        table.procs[9].enter_time = 0;
        table.mlfq.push(2, 9);

        Mlfq::select(&mut table, 0);

        assert_eq!(table.procs[9].queue_no, 1);
    }

    #[test]
    fn mlfq_demotes_on_quantum_exhaustion() {
        let mut table = ProcTable::new();
        table.procs[3].state = ProcState::Runnable;
        table.procs[3].queue_no = 0;
        table.procs[3].change_queue = true;

        Mlfq::on_return(&mut table, 3);

        assert_eq!(table.procs[3].queue_no, 1);
        assert!(!table.procs[3].change_queue);
        assert_eq!(table.procs[3].cur_ticks, 0);
    }

    #[test]
    fn mlfq_level_cap_at_four() {
        let mut table = ProcTable::new();
        table.procs[3].state = ProcState::Runnable;
        table.procs[3].queue_no = 4;
        table.procs[3].change_queue = true;

        Mlfq::on_return(&mut table, 3);

        assert_eq!(table.procs[3].queue_no, 4);
    }

    #[test]
    fn mlfq_same_queue_reinsertion_keeps_level() {
        let mut table = ProcTable::new();
        table.procs[3].state = ProcState::Runnable;
        table.procs[3].queue_no = 2;
        table.procs[3].change_queue = false;

        Mlfq::on_return(&mut table, 3);

        assert_eq!(table.procs[3].queue_no, 2);
        assert_eq!(table.mlfq.peek(2), Some(3));
    }
}
