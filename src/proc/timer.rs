//! Per-tick accounting (spec §4.2): advances the tables of running/sleeping/
//! runnable time every process carries, plus the MLFQ-specific quantum
//! bookkeeping for whichever process is RUNNING when the tick lands.
//!
//! Grounded on the teacher's `clock_intr`, which also lived at the boundary
//! between the architecture's timer interrupt and the scheduler's state;
//! the teacher only bumped a single shared tick counter and woke
//! `Channel::Ticks` sleepers, so the per-process accounting here is new but
//! follows the same "do the bookkeeping, then wake sleepers" shape.

use crate::param::MLFQ_QUANTUM;

use super::{Channel, NPROC, ProcState, ProcTable};

/// Advances `table.ticks` and every process's time-in-state counters, then
/// updates the MLFQ quantum bookkeeping for `running`, if any.
pub fn tick(table: &mut ProcTable, running: Option<usize>) {
    table.ticks += 1;

    for i in 0..NPROC {
        match table.procs[i].state {
            ProcState::Running => table.procs[i].rtime += 1,
            ProcState::Sleeping => table.procs[i].iotime += 1,
            ProcState::Runnable => table.procs[i].cur_waiting_time += 1,
            ProcState::Unused | ProcState::Embryo | ProcState::Zombie => {}
        }
    }

    if let Some(idx) = running {
        if table.procs[idx].state == ProcState::Running {
            let level = table.procs[idx].queue_no.max(0) as usize;
            table.procs[idx].cur_ticks += 1;
            table.procs[idx].ticks[level] += 1;
            if table.procs[idx].cur_ticks >= MLFQ_QUANTUM[level] {
                table.procs[idx].change_queue = true;
            }
        }
    }

    super::wakeup_locked(table, Channel::Ticks);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ProcTable;

    #[test]
    fn advances_time_by_state() {
        let mut table = ProcTable::new();
        table.procs[0].state = ProcState::Running;
        table.procs[1].state = ProcState::Sleeping;
        table.procs[2].state = ProcState::Runnable;

        tick(&mut table, Some(0));

        assert_eq!(table.ticks, 1);
        assert_eq!(table.procs[0].rtime, 1);
        assert_eq!(table.procs[1].iotime, 1);
        assert_eq!(table.procs[2].cur_waiting_time, 1);
    }

    #[test]
    fn unused_slots_are_untouched() {
        let mut table = ProcTable::new();
        tick(&mut table, None);
        assert_eq!(table.procs[0].rtime, 0);
        assert_eq!(table.procs[0].iotime, 0);
        assert_eq!(table.procs[0].cur_waiting_time, 0);
    }

    #[test]
    fn mlfq_quantum_sets_change_queue_flag() {
        let mut table = ProcTable::new();
        table.procs[5].state = ProcState::Running;
        table.procs[5].queue_no = 0;
        table.procs[5].cur_ticks = 0;

        tick(&mut table, Some(5));

        assert_eq!(table.procs[5].cur_ticks, 1);
        assert!(table.procs[5].change_queue);
    }

    #[test]
    fn mlfq_quantum_not_yet_reached_for_lower_levels() {
        let mut table = ProcTable::new();
        table.procs[5].state = ProcState::Running;
        table.procs[5].queue_no = 2;
        table.procs[5].cur_ticks = 0;

        tick(&mut table, Some(5));

        assert_eq!(table.procs[5].cur_ticks, 1);
        assert!(!table.procs[5].change_queue);
    }

    #[test]
    fn ticks_wakeup_sleepers_on_ticks_channel() {
        let mut table = ProcTable::new();
        table.procs[7].state = ProcState::Sleeping;
        table.procs[7].chan = Some(Channel::Ticks);

        tick(&mut table, None);

        assert_eq!(table.procs[7].state, ProcState::Runnable);
    }
}
