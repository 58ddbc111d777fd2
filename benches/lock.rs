use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Bencher, Criterion};
use futexlock::Mutex;

fn gen_create(bencher: &mut Bencher) {
    bencher.iter(|| {
        let value = black_box(0);
        Mutex::new(value)
    });
}

fn gen_lock_unlock(bencher: &mut Bencher) {
    let mutex = Mutex::new(0_u32);

    bencher.iter(|| {
        let mut guard = mutex.lock();
        *guard = guard.wrapping_add(1);
        drop(guard);
    })
}

fn gen_lock_unlock_write_contention(bencher: &mut Bencher) {
    let data = Arc::new(Mutex::new(0_u32));

    let thread = thread::spawn({
        let data = Arc::clone(&data);
        move || {
            while Arc::strong_count(&data) > 1 {
                for _ in 0..1000 {
                    let mut m = data.lock();
                    *m = m.wrapping_add(1);
                    drop(m);
                }
            }
        }
    });

    bencher.iter(|| {
        let mut m = data.lock();
        *m = m.wrapping_add(1);
        drop(m);
    });

    drop(data);
    thread.join().unwrap();
}

// Measures how long a quiescence waiter takes to return while another thread
// keeps locking and unlocking.
fn gen_wait_quiescent_contention(bencher: &mut Bencher) {
    let data = Arc::new(Mutex::new(0_u32));

    let thread = thread::spawn({
        let data = Arc::clone(&data);
        move || {
            while Arc::strong_count(&data) > 1 {
                for _ in 0..1000 {
                    let mut m = data.lock();
                    *m = m.wrapping_add(1);
                    drop(m);
                }
            }
        }
    });

    bencher.iter(|| black_box(data.wait_quiescent()));

    drop(data);
    thread.join().unwrap();
}

fn create(criterion: &mut Criterion) {
    criterion.bench_function("create", gen_create);
}

fn lock_unlock(criterion: &mut Criterion) {
    criterion.bench_function("lock_unlock", gen_lock_unlock);
}

fn lock_unlock_write_contention(criterion: &mut Criterion) {
    criterion.bench_function("lock_unlock_write_contention", gen_lock_unlock_write_contention);
}

fn wait_quiescent_contention(criterion: &mut Criterion) {
    criterion.bench_function("wait_quiescent_contention", gen_wait_quiescent_contention);
}

criterion_group!(
    mutex,
    create,
    lock_unlock,
    lock_unlock_write_contention,
    wait_quiescent_contention,
);

criterion_main!(mutex);
