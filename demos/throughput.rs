//! Side-by-side throughput run of this crate's mutex against the usual
//! suspects. Spawns worker threads that hammer one shared counter and
//! reports locked iterations per second for each implementation.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

trait Mutex<T> {
    fn new(v: T) -> Self;
    fn lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R;
    fn name() -> &'static str;
}

impl<T> Mutex<T> for lockbox::Mutex<T> {
    fn new(v: T) -> Self {
        Self::new(v)
    }
    fn lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        f(&mut *self.lock())
    }
    fn name() -> &'static str {
        "lockbox::Mutex"
    }
}

impl<T> Mutex<T> for std::sync::Mutex<T> {
    fn new(v: T) -> Self {
        Self::new(v)
    }
    fn lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        f(&mut *self.lock().unwrap())
    }
    fn name() -> &'static str {
        "std::sync::Mutex"
    }
}

impl<T> Mutex<T> for parking_lot::Mutex<T> {
    fn new(v: T) -> Self {
        Self::new(v)
    }
    fn lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        f(&mut *self.lock())
    }
    fn name() -> &'static str {
        "parking_lot::Mutex"
    }
}

fn run_benchmark<M: Mutex<u64> + Send + Sync + 'static>(
    num_threads: usize,
    seconds_per_test: u64,
) -> u64 {
    // Padding keeps the lock word off the Arc bookkeeping's cache line.
    let lock = Arc::new(([0u8; 300], M::new(0), [0u8; 300]));
    let keep_going = Arc::new(AtomicBool::new(true));
    let barrier = Arc::new(Barrier::new(num_threads));

    let threads: Vec<_> = (0..num_threads)
        .map(|_| {
            let lock = lock.clone();
            let keep_going = keep_going.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut iterations = 0u64;
                barrier.wait();
                while keep_going.load(Ordering::Relaxed) {
                    lock.1.lock(|shared| *shared += 1);
                    iterations += 1;
                }
                iterations
            })
        })
        .collect();

    thread::sleep(Duration::from_secs(seconds_per_test));
    keep_going.store(false, Ordering::Relaxed);
    threads.into_iter().map(|t| t.join().unwrap()).sum()
}

fn run_all(num_threads: usize, seconds_per_test: u64) {
    println!("- {} threads, {} second(s) per test", num_threads, seconds_per_test);
    println!("{:^30} | {:^14}", "name", "throughput");

    for (name, total) in [
        (
            <lockbox::Mutex<u64> as Mutex<u64>>::name(),
            run_benchmark::<lockbox::Mutex<u64>>(num_threads, seconds_per_test),
        ),
        (
            <std::sync::Mutex<u64> as Mutex<u64>>::name(),
            run_benchmark::<std::sync::Mutex<u64>>(num_threads, seconds_per_test),
        ),
        (
            <parking_lot::Mutex<u64> as Mutex<u64>>::name(),
            run_benchmark::<parking_lot::Mutex<u64>>(num_threads, seconds_per_test),
        ),
    ]
    .iter()
    {
        println!(
            "{:30} | {:10.3} kHz",
            name,
            *total as f64 / seconds_per_test as f64 / 1000.0
        );
    }
}

fn main() {
    for &num_threads in &[1, 2, 4, 8] {
        run_all(num_threads, 1);
    }
}
