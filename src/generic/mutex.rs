// Copyright (c) 2020 kprotty
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::core::{Spin, ThreadParker};
use core::{
    cell::{Cell, UnsafeCell},
    fmt,
    hint::unreachable_unchecked,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

const UNLOCKED: usize = 0;
const LOCKED: usize = 1 << 0;
const QUEUE_LOCKED: usize = 1 << 1;
const QUEUE_MASK: usize = !(LOCKED | QUEUE_LOCKED);

/// A parked thread waiting to acquire the lock, linked into a queue whose
/// head address lives in the upper bits of the state word.
///
/// Nodes are allocated on the stack of the thread they park and are only
/// unlinked by the wake path, never by the waiter itself, so a node stays
/// valid until its thread is unparked.
#[repr(align(4))]
struct Waiter<P> {
    prev: Cell<Option<NonNull<Self>>>,
    next: Cell<Option<NonNull<Self>>>,
    tail: Cell<Option<NonNull<Self>>>,
    parker: P,
}

impl<P: ThreadParker> Waiter<P> {
    fn new() -> Self {
        Self {
            prev: Cell::new(None),
            next: Cell::new(None),
            tail: Cell::new(None),
            parker: P::new(),
        }
    }

    /// Walks the next links from `self` (a queue head) to the oldest waiter,
    /// recording prev links along the way and caching the result in
    /// `self.tail`. Requires holding QUEUE_LOCKED.
    unsafe fn find_tail(&self) -> &Self {
        let mut current = NonNull::from(self);
        let tail = loop {
            if let Some(tail) = current.as_ref().tail.get() {
                break tail;
            }
            // Only the oldest waiter has no next link, and it always has its
            // tail cell pointing at itself.
            let next = match current.as_ref().next.get() {
                Some(next) => next,
                None => unreachable_unchecked(),
            };
            next.as_ref().prev.set(Some(current));
            current = next;
        };
        self.tail.set(Some(tail));
        &*tail.as_ptr()
    }
}

/// A mutual exclusion lock that owns one instance of `T`.
///
/// The value is stored inline and shares the lock's lifetime. Access goes
/// exclusively through the [`MutexGuard`] handed out by [`lock`](Self::lock)
/// and [`try_lock`](Self::try_lock); [`into_inner`](Self::into_inner) gives
/// the value back when the lock is no longer needed.
///
/// Acquisition is not re-entrant: a thread that already holds the lock will
/// deadlock in `lock` and get `None` from `try_lock`. No fairness is promised
/// beyond FIFO wakeup of parked threads, which still race with threads
/// acquiring directly.
pub struct Mutex<P: ThreadParker, T> {
    state: AtomicUsize,
    value: UnsafeCell<T>,
    parker: PhantomData<P>,
}

unsafe impl<P: ThreadParker, T: Send> Send for Mutex<P, T> {}
unsafe impl<P: ThreadParker, T: Send> Sync for Mutex<P, T> {}

impl<P: ThreadParker, T: Default> Default for Mutex<P, T> {
    fn default() -> Self {
        Self::from(T::default())
    }
}

impl<P: ThreadParker, T> From<T> for Mutex<P, T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<P: ThreadParker, T> AsMut<T> for Mutex<P, T> {
    fn as_mut(&mut self) -> &mut T {
        unsafe { &mut *self.value.get() }
    }
}

impl<P: ThreadParker, T: fmt::Debug> fmt::Debug for Mutex<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("Mutex");
        let f = match self.try_lock() {
            Some(guard) => f.field("value", &&*guard),
            None => f.field("state", &"<locked>"),
        };
        f.finish()
    }
}

impl<P: ThreadParker, T> Mutex<P, T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicUsize::new(UNLOCKED),
            value: UnsafeCell::new(value),
            parker: PhantomData,
        }
    }

    /// Consumes the mutex and returns the protected value.
    ///
    /// Takes `self` by value, so the borrow checker guarantees no guard is
    /// outstanding. No locking takes place.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & LOCKED != 0
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `None` if the lock is held by someone else. That is a normal
    /// outcome to test for, not an error; nothing changes on failure.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, P, T>> {
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            if state & LOCKED != 0 {
                return None;
            }
            match self.state.compare_exchange_weak(
                state,
                state | LOCKED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(MutexGuard(self)),
                Err(e) => state = e,
            }
        }
    }

    #[inline]
    fn try_lock_fast(&self) -> Option<MutexGuard<'_, P, T>> {
        self.state
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| MutexGuard(self))
    }

    /// Acquires the lock, blocking the calling thread until it is available.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, P, T> {
        self.try_lock_fast()
            .unwrap_or_else(|| self.lock_slow())
    }

    #[cold]
    fn lock_slow(&self) -> MutexGuard<'_, P, T> {
        let waiter = Waiter::<P>::new();
        let mut spin = Spin::new();
        let mut state = self.state.load(Ordering::Relaxed);

        loop {
            if state & LOCKED == 0 {
                match self.state.compare_exchange_weak(
                    state,
                    state | LOCKED,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return MutexGuard(self),
                    Err(e) => state = e,
                }
                continue;
            }

            if state & QUEUE_MASK == 0 && spin.yield_now() {
                state = self.state.load(Ordering::Relaxed);
                continue;
            }

            let head = NonNull::new((state & QUEUE_MASK) as *mut Waiter<P>);
            waiter.prev.set(None);
            waiter.next.set(head);
            waiter.tail.set(match head {
                Some(_) => None,
                None => Some(NonNull::from(&waiter)),
            });
            waiter.parker.prepare_park();

            // Publish the node as the new queue head; Release makes its
            // fields visible to whoever takes QUEUE_LOCKED.
            let new_state = (state & !QUEUE_MASK) | (&waiter as *const Waiter<P> as usize);
            if let Err(e) = self.state.compare_exchange_weak(
                state,
                new_state,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                state = e;
                continue;
            }

            waiter.parker.park();
            spin.reset();
            state = self.state.load(Ordering::Relaxed);
        }
    }

    #[inline]
    unsafe fn unlock(&self) {
        let state = self.state.fetch_sub(LOCKED, Ordering::Release);
        if (state & QUEUE_LOCKED == 0) && (state & QUEUE_MASK != 0) {
            self.unlock_slow();
        }
    }

    #[cold]
    unsafe fn unlock_slow(&self) {
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            // Another thread already woke someone, or there is no one left
            // to wake.
            if (state & QUEUE_LOCKED != 0) || (state & QUEUE_MASK == 0) {
                return;
            }
            match self.state.compare_exchange_weak(
                state,
                state | QUEUE_LOCKED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    state |= QUEUE_LOCKED;
                    break;
                }
                Err(e) => state = e,
            }
        }

        loop {
            // The lock was grabbed by a barging thread: its unlock will do
            // the wake instead.
            if state & LOCKED != 0 {
                match self.state.compare_exchange_weak(
                    state,
                    state & !QUEUE_LOCKED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return,
                    Err(e) => state = e,
                }
                continue;
            }

            let head = &*((state & QUEUE_MASK) as *const Waiter<P>);
            let tail = head.find_tail();

            match tail.prev.get() {
                Some(new_tail) => {
                    head.tail.set(Some(new_tail));
                    self.state.fetch_and(!QUEUE_LOCKED, Ordering::Release);
                    tail.parker.unpark();
                    return;
                }
                // Dequeueing the only waiter empties the queue. The exchange
                // fails if a new waiter pushed itself or the lock was grabbed
                // in the meantime; re-walk from the updated state.
                None => match self.state.compare_exchange_weak(
                    state,
                    UNLOCKED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        tail.parker.unpark();
                        return;
                    }
                    Err(e) => state = e,
                },
            }
        }
    }
}

/// Grants exclusive access to the value inside a [`Mutex`].
///
/// Releases the lock exactly once when dropped. The guard borrows its mutex,
/// so it cannot outlive it, and moving the guard moves the release
/// obligation with it.
pub struct MutexGuard<'a, P: ThreadParker, T>(&'a Mutex<P, T>);

impl<'a, P: ThreadParker, T> Drop for MutexGuard<'a, P, T> {
    fn drop(&mut self) {
        unsafe { self.0.unlock() }
    }
}

impl<'a, P: ThreadParker, T: fmt::Debug> fmt::Debug for MutexGuard<'a, P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.deref().fmt(f)
    }
}

impl<'a, P: ThreadParker, T> Deref for MutexGuard<'a, P, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.0.value.get() }
    }
}

impl<'a, P: ThreadParker, T> DerefMut for MutexGuard<'a, P, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.0.value.get() }
    }
}
