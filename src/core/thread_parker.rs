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

use super::ThreadParker;
use core::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// [`ThreadParker`] backed by `std::thread::park`.
///
/// `std::thread::park` may return spuriously, so `park` loops on a notified
/// flag published by `unpark`.
pub struct SystemThreadParker {
    thread: thread::Thread,
    notified: AtomicBool,
}

impl ThreadParker for SystemThreadParker {
    fn new() -> Self {
        Self {
            thread: thread::current(),
            notified: AtomicBool::new(false),
        }
    }

    fn prepare_park(&self) {
        self.notified.store(false, Ordering::Relaxed);
    }

    fn park(&self) {
        while !self.notified.load(Ordering::Acquire) {
            thread::park();
        }
    }

    fn unpark(&self) {
        // The parked thread is free to return, and free this parker's memory,
        // the moment the flag is visible. Grab the handle beforehand.
        let thread = self.thread.clone();
        self.notified.store(true, Ordering::Release);
        thread.unpark();
    }
}
