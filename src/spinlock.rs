//! A busy-wait mutex that also disables interrupts on the current CPU while held.
//!
//! This is the single "table lock" the process table, the MLFQ queues and
//! `nextpid` are all guarded by (spec §5: "no finer-grained locks exist
//! within the core"). The interrupt-disable-on-acquire discipline mirrors
//! the teacher's `push_off`/`pop_off` pair; it is folded into the guard's
//! lifetime here via `InterruptLock` instead of being a pair of free
//! functions the caller must remember to balance.

use core::cell::UnsafeCell;
use core::hint;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::proc::{InterruptLock, current_id, lock_current_cpu};

const NO_OWNER: usize = usize::MAX;

/// A mutual-exclusion lock guarded by a spin loop, usable from `no_std` code.
#[derive(Debug)]
pub struct SpinLock<T> {
    name: &'static str,
    locked: AtomicBool,
    owner: AtomicUsize,
    data: UnsafeCell<T>,
}

// Safety: `data` is only reachable through a `SpinLockGuard`, which is only
// handed out while `locked` is true and this CPU is the owner.
unsafe impl<T> Sync for SpinLock<T> where T: Send {}

impl<T> SpinLock<T> {
    pub const fn new(value: T, name: &'static str) -> Self {
        Self {
            name,
            locked: AtomicBool::new(false),
            owner: AtomicUsize::new(NO_OWNER),
            data: UnsafeCell::new(value),
        }
    }

    fn holding(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
            && self.owner.load(Ordering::Relaxed) == unsafe { current_id() }
    }

    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let intr_lock = lock_current_cpu();

        assert!(!self.holding(), "acquire {} (already held)", self.name);

        while self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
        self.owner.store(unsafe { current_id() }, Ordering::Relaxed);

        SpinLockGuard {
            lock: self,
            _intr_lock: intr_lock,
        }
    }

    /// Releases a lock taken via [`SpinLock::lock`] and returns a reference
    /// to the same lock so it can be reacquired later, e.g. by `sleep`'s
    /// caller-lock hand-off (spec §4.5).
    pub fn unlock(guard: SpinLockGuard<'_, T>) -> &'_ SpinLock<T> {
        let lock = guard.lock;
        drop(guard);
        lock
    }

    /// Forcibly drops lock ownership without running the interrupt-lock
    /// unwind. Used once, by `fork_ret`, to release the lock the scheduler
    /// handed to a process being dispatched for the very first time.
    ///
    /// # Safety
    /// The caller must actually be holding this lock and must not use the
    /// `InterruptLock` that was paired with the original `lock()` call
    /// afterwards.
    pub unsafe fn force_unlock(&self) {
        assert!(self.holding(), "force_unlock {} (not held)", self.name);
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
    }

    /// Bypasses locking entirely. Used only by the debug-grade `my_ps`
    /// listing (spec §4.6, §9), which intentionally reads without the lock.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut_unchecked(&self) -> &mut T {
        unsafe { &mut *self.data.get() }
    }
}

pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    _intr_lock: InterruptLock,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        assert!(self.lock.holding(), "release {} (not held)", self.lock.name);
        self.lock.owner.store(NO_OWNER, Ordering::Relaxed);
        self.lock.locked.store(false, Ordering::Release);
    }
}

