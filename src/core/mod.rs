mod spin;

#[cfg(feature = "std")]
mod thread_parker;

pub use spin::Spin;

#[cfg(feature = "std")]
pub use thread_parker::SystemThreadParker;

/// Blocks and wakes the thread waiting on one lock acquisition.
///
/// `park` returns only once `unpark` was called after the most recent
/// `prepare_park`; wakeups from any other source are absorbed. After `unpark`
/// lets a `park` return, it must not access the parker again: the parker
/// lives on the parked thread's stack and may be gone immediately.
pub trait ThreadParker: Sync {
    fn new() -> Self;

    fn prepare_park(&self);

    fn park(&self);

    fn unpark(&self);
}
