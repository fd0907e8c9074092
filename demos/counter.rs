use lockbox::Mutex;

fn try_increment(counter: &Mutex<i32>) {
    // try_lock may lose the race; None is a normal outcome, not an error.
    if let Some(mut guard) = counter.try_lock() {
        println!("{}", *guard);
        *guard += 1;
    }
}

fn increment(counter: &Mutex<i32>) {
    // Unlike try_lock, lock always produces a guard.
    let mut guard = counter.lock();
    println!("{}", *guard);
    *guard += 1;
}

fn main() {
    let counter = Mutex::new(0);
    try_increment(&counter);
    increment(&counter);
    println!("{}", counter.into_inner());
}
