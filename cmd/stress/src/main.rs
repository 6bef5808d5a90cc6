//! Stress test - many producers and consumers on one queue
//!
//! Every value must come out exactly once.
//!
//! Usage: stress [items-per-producer] [producers] [consumers] [capacity]

use crossbeam_queue::SegQueue;
use qpool::{BoundedQueue, PoolConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn arg(n: usize, default: usize) -> usize {
    std::env::args()
        .nth(n)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() {
    println!("=== qpool Stress Test ===\n");

    let per_producer = arg(1, 100_000);
    let producers = arg(2, 4).max(1);
    let consumers = arg(3, 4).max(1);
    let capacity = arg(4, 64).max(1);
    let total = per_producer * producers;

    let config = PoolConfig::from_env().queue_capacity(capacity);
    config.print();

    let q: Arc<BoundedQueue<usize>> =
        Arc::new(BoundedQueue::with_config(&config).expect("queue init"));
    let seen = Arc::new(SegQueue::new());
    let taken = Arc::new(AtomicUsize::new(0));

    println!(
        "\n{} producers x {} items -> {} consumers",
        producers, per_producer, consumers
    );
    let start = Instant::now();

    let producer_handles: Vec<_> = (0..producers)
        .map(|p| {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..per_producer {
                    q.put(p * per_producer + i).expect("put");
                }
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..consumers)
        .map(|_| {
            let q = Arc::clone(&q);
            let seen = Arc::clone(&seen);
            let taken = Arc::clone(&taken);
            thread::spawn(move || loop {
                // Claim a slot first so consumers never over-read
                if taken.fetch_add(1, Ordering::Relaxed) >= total {
                    break;
                }
                seen.push(q.get().expect("get"));
            })
        })
        .collect();

    // Progress indicator
    while seen.len() < total {
        if start.elapsed() > Duration::from_secs(60) {
            println!("\nTimeout! Only {}/{} delivered", seen.len(), total);
            std::process::exit(1);
        }
        print!("\rDelivered: {}/{}", seen.len(), total);
        thread::sleep(Duration::from_millis(100));
    }

    for h in producer_handles.into_iter().chain(consumer_handles) {
        h.join().expect("thread panicked");
    }
    let elapsed = start.elapsed();

    // Exactly-once check
    let mut hits = vec![0u8; total];
    while let Some(v) = seen.pop() {
        hits[v] += 1;
    }
    let missing = hits.iter().filter(|&&h| h == 0).count();
    let dupes = hits.iter().filter(|&&h| h > 1).count();

    println!("\n\n=== Results ===");
    println!("Items:       {}", total);
    println!("Missing:     {}", missing);
    println!("Duplicated:  {}", dupes);
    println!("Left queued: {}", q.size());
    println!("Time:        {:?}", elapsed);
    println!("Throughput:  {:.0} items/sec", total as f64 / elapsed.as_secs_f64());

    if missing != 0 || dupes != 0 {
        println!("\n=== Stress Test FAILED ===");
        std::process::exit(1);
    }
    println!("\n=== Stress Test Complete ===");
}
