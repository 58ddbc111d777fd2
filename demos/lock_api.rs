use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

// Requires the `lock_api` feature.
//
// You may export these types to your callers and change the relax strategy
// later without breaking their code.
pub type Mutex<T> = futexlock::lock_api::spins::Mutex<T>;
pub type MutexGuard<'a, T> = futexlock::lock_api::spins::MutexGuard<'a, T>;

fn main() {
    const N: usize = 10;

    // Spawn a few threads to increment a shared variable (non-atomically), and
    // let the main thread know once all increments are done.
    let data = Arc::new(Mutex::new(0));

    let (tx, rx) = channel();
    for _ in 0..N {
        let (data, tx) = (data.clone(), tx.clone());
        thread::spawn(move || {
            let mut data = data.lock();
            *data += 1;
            if *data == N {
                tx.send(()).unwrap();
            }
            // the lock is unlocked here when `data` goes out of scope.
        });
    }
    let _message = rx.recv();

    // `lock_api` mutexes know nothing about quiescence, go through the raw lock.
    futexlock::lock_api::wait_quiescent(&*data);

    // Would return `None` if lock was already held.
    let count = data.try_lock().unwrap();
    assert_eq!(*count, N);
}
