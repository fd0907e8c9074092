#![cfg_attr(not(feature = "std"), no_std)]

//! A mutual exclusion lock that owns the value it protects.
//!
//! The only way to reach the value inside a [`Mutex`] is through the
//! [`MutexGuard`] returned by [`Mutex::lock`] or [`Mutex::try_lock`]. The
//! guard grants exclusive access for as long as it lives and releases the
//! lock when dropped.
//!
//! ```
//! use lockbox::Mutex;
//!
//! let counter = Mutex::new(0);
//! {
//!     let mut guard = counter.lock();
//!     *guard += 1;
//! }
//! assert!(counter.try_lock().is_some());
//! assert_eq!(counter.into_inner(), 1);
//! ```
//!
//! [`Mutex::try_lock`] never blocks: it returns `None` when the lock is
//! already held. `None` is a normal outcome to test for, not an error.
//!
//! The guard borrows the mutex it came from, so a guard escaping the scope
//! of its mutex is rejected at compile time:
//!
//! ```compile_fail
//! use lockbox::{Mutex, MutexGuard};
//!
//! fn escape() -> MutexGuard<'static, u32> {
//!     let local = Mutex::new(0);
//!     local.lock()
//! }
//! ```

pub mod core;
pub mod generic;

#[cfg(feature = "std")]
pub use if_std::*;

#[cfg(feature = "std")]
mod if_std {
    pub type ThreadParker = crate::core::SystemThreadParker;

    pub type Mutex<T> = crate::generic::Mutex<ThreadParker, T>;
    pub type MutexGuard<'a, T> = crate::generic::MutexGuard<'a, ThreadParker, T>;
}
