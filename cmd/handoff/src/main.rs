//! Handoff example
//!
//! An acceptor thread hands connection handles to worker threads through
//! the process-wide pool, one queue per worker.
//!
//! Usage: handoff [workers] [handles-per-worker]

use qpool::{pool_at, pool_close, pool_init, pool_size, QueueError, RawHandle};
use std::thread;
use std::time::Duration;

fn main() {
    println!("=== qpool Handoff Example ===\n");

    let workers: i64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(4);
    let per_worker: usize = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(8);

    if let Err(e) = pool_init(workers) {
        eprintln!("pool_init({}) failed: {}", workers, e);
        std::process::exit(1);
    }
    println!("Pool ready: {} queues", pool_size());

    // Worker threads: drain their own queue until it stays quiet
    let handles: Vec<_> = (0..workers)
        .map(|w| {
            thread::Builder::new()
                .name(format!("worker-{}", w))
                .spawn(move || {
                    let q = pool_at(w).expect("queue index within pool");
                    let mut served = 0usize;
                    loop {
                        match q.get_timeout(200) {
                            Ok(h) => {
                                served += 1;
                                println!("[Worker {}] Got handle {:?}", w, h);
                            }
                            Err(QueueError::TimedOut) => break,
                            Err(e) => {
                                println!("[Worker {}] Error: {}", w, e);
                                break;
                            }
                        }
                    }
                    served
                })
                .expect("spawn worker")
        })
        .collect();

    // Acceptor: half the handles one at a time, half as a locked batch
    thread::sleep(Duration::from_millis(20));
    for w in 0..workers {
        let q = pool_at(w).expect("queue index within pool");
        let base = (w as usize + 1) * 1000;

        for i in 0..per_worker / 2 {
            q.put(RawHandle::from_usize(base + i)).expect("put");
        }

        let mut guard = q.lock().expect("lock");
        for i in per_worker / 2..per_worker {
            if let Err(e) = guard.put_nolock(RawHandle::from_usize(base + i)) {
                println!("[Acceptor] Queue {} full, dropping: {}", w, e);
            }
        }
        println!("[Acceptor] Queue {}: batch of {} queued", w, guard.size());
        guard.unlock(true).expect("unlock");
    }

    let mut total = 0;
    for (w, h) in handles.into_iter().enumerate() {
        let served = h.join().expect("worker panicked");
        println!("[Main] Worker {} served {}", w, served);
        total += served;
    }

    if let Err(e) = pool_close() {
        eprintln!("pool_close failed: {}", e);
    }

    println!("\nServed {} of {} handles", total, workers as usize * per_worker);
    println!("\n=== Example Complete ===");
}
