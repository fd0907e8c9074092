use lockbox::{Mutex, MutexGuard};
use std::{sync::mpsc, sync::Arc, thread, time::Duration};

#[test]
fn smoke() {
    let m = Mutex::new(1);
    drop(m.lock());
    drop(m.lock());
}

#[test]
fn lock_increment_consume() {
    let m = Mutex::new(0);
    {
        let mut guard = m.lock();
        assert_eq!(*guard, 0);
        *guard += 1;
    }
    {
        let mut guard = m.lock();
        assert_eq!(*guard, 1);
        *guard += 1;
    }
    assert_eq!(m.into_inner(), 2);
}

#[test]
fn try_lock_while_held() {
    let m = Mutex::new(5);
    let a = m.lock();
    assert!(m.try_lock().is_none());
    drop(a);
    let c = m.try_lock();
    assert!(c.is_some());
    assert_eq!(*c.unwrap(), 5);
}

#[test]
fn try_lock_has_no_side_effect_on_failure() {
    let m = Mutex::new(0);
    let guard = m.lock();
    for _ in 0..10 {
        assert!(m.try_lock().is_none());
    }
    drop(guard);
    assert!(!m.is_locked());
    assert!(m.try_lock().is_some());
}

#[test]
fn guard_move_transfers_release() {
    let m = Mutex::new(String::from("hello"));
    let guard = m.lock();
    let mut moved = guard;
    moved.push_str(" world");
    assert!(m.try_lock().is_none());
    drop(moved);
    assert_eq!(&*m.lock(), "hello world");
}

#[test]
fn guard_returned_from_helper() {
    fn acquire(m: &Mutex<u32>) -> MutexGuard<'_, u32> {
        m.lock()
    }

    let m = Mutex::new(7);
    let mut guard = acquire(&m);
    *guard += 1;
    assert!(m.try_lock().is_none());
    drop(guard);
    assert_eq!(m.into_inner(), 8);
}

#[test]
fn is_locked_tracks_guard() {
    let m = Mutex::new(());
    assert!(!m.is_locked());
    let guard = m.lock();
    assert!(m.is_locked());
    drop(guard);
    assert!(!m.is_locked());
}

#[test]
fn wakes_parked_thread() {
    let m = Arc::new(Mutex::new(false));
    let (tx, rx) = mpsc::channel();

    let guard = m.lock();
    let handle = {
        let m = m.clone();
        thread::spawn(move || {
            let mut guard = m.lock();
            *guard = true;
            tx.send(()).unwrap();
        })
    };

    // The spawned thread is stuck until the guard drops.
    assert!(rx.try_recv().is_err());
    drop(guard);

    rx.recv().unwrap();
    handle.join().unwrap();
    assert!(*m.lock());
}

#[test]
fn contended_counter() {
    const THREADS: usize = 8;
    const ITERS: usize = 1000;

    let m = Arc::new(Mutex::new(0usize));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let m = m.clone();
            thread::spawn(move || {
                for _ in 0..ITERS {
                    *m.lock() += 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*m.lock(), THREADS * ITERS);
}

#[test]
fn contended_try_lock_counter() {
    const THREADS: usize = 4;
    const ITERS: usize = 500;

    let m = Arc::new(Mutex::new(0usize));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let m = m.clone();
            thread::spawn(move || {
                for _ in 0..ITERS {
                    loop {
                        if let Some(mut guard) = m.try_lock() {
                            *guard += 1;
                            break;
                        }
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(Arc::try_unwrap(m).ok().unwrap().into_inner(), THREADS * ITERS);
}

#[test]
fn stray_unpark_does_not_release_waiter() {
    let m = Arc::new(Mutex::new(0));
    let guard = m.lock();

    let handle = {
        let m = m.clone();
        thread::spawn(move || {
            *m.lock() += 1;
        })
    };

    // Let the thread park behind the held guard, then poke it with wakeups
    // that correspond to no release. It must stay put: a parked waiter only
    // runs once its own unpark flag was published.
    thread::sleep(Duration::from_millis(50));
    for _ in 0..10 {
        handle.thread().unpark();
        thread::yield_now();
    }
    thread::sleep(Duration::from_millis(50));
    assert_eq!(*guard, 0);

    drop(guard);
    handle.join().unwrap();
    assert_eq!(*m.lock(), 1);
}

#[test]
fn barging_and_parked_waiters_stress() {
    // Mixes threads that park behind long holds with threads that barge in
    // through try_lock, so unlock repeatedly walks the waiter queue while
    // the head keeps changing under it.
    const LOCKERS: usize = 6;
    const BARGERS: usize = 2;
    const ITERS: usize = 300;

    let m = Arc::new(Mutex::new((0usize, 0usize)));
    let mut handles = Vec::new();

    for _ in 0..LOCKERS {
        let m = m.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                let mut guard = m.lock();
                guard.0 += 1;
                thread::yield_now();
            }
        }));
    }
    for _ in 0..BARGERS {
        let m = m.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                loop {
                    if let Some(mut guard) = m.try_lock() {
                        guard.1 += 1;
                        break;
                    }
                    thread::yield_now();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    let (locked, barged) = *m.lock();
    assert_eq!(locked, LOCKERS * ITERS);
    assert_eq!(barged, BARGERS * ITERS);
}

#[test]
fn into_inner_sees_last_write() {
    let m = Mutex::new(vec![1, 2]);
    m.lock().push(3);
    assert_eq!(m.into_inner(), vec![1, 2, 3]);
}

#[test]
fn into_inner_drops_value_once() {
    let value = Arc::new(());
    let m = Mutex::new(value.clone());
    assert_eq!(Arc::strong_count(&value), 2);
    drop(m.into_inner());
    assert_eq!(Arc::strong_count(&value), 1);
}

#[test]
fn dropping_mutex_drops_value() {
    let value = Arc::new(());
    let m = Mutex::new(value.clone());
    drop(m);
    assert_eq!(Arc::strong_count(&value), 1);
}

#[test]
fn default_and_from() {
    let m: Mutex<u32> = Mutex::default();
    assert_eq!(m.into_inner(), 0);
    let m = Mutex::from(17u32);
    assert_eq!(m.into_inner(), 17);
}

#[test]
fn as_mut_bypasses_lock() {
    let mut m = Mutex::new(3);
    *m.as_mut() = 4;
    assert_eq!(m.into_inner(), 4);
}

#[test]
fn debug_formatting() {
    let m = Mutex::new(42);
    assert_eq!(format!("{:?}", m), "Mutex { value: 42 }");

    let guard = m.lock();
    assert_eq!(format!("{:?}", guard), "42");
    assert!(format!("{:?}", m).contains("<locked>"));
}

#[test]
fn mutex_is_movable() {
    let m = Mutex::new(9);
    drop(m.lock());
    // Moving the mutex needs no re-acquisition.
    let moved = m;
    assert_eq!(*moved.lock(), 9);
}
