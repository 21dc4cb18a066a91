//! Latency stress run against the allocation engine: sequential
//! allocate/release cycles, then a concurrent allocation storm.
//!
//!   cargo bench --bench stress

use std::sync::Arc;
use std::time::{Duration, Instant};

use quarters::engine::{Engine, RoomStore};

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn bench_engine(name: &str) -> Engine {
    let dir = std::env::temp_dir().join("quarters_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    Engine::open(RoomStore::new(), path).unwrap()
}

async fn cycle_bench() {
    let engine = bench_engine("cycles.wal");
    let capacities = [2u32, 2, 2, 2, 4, 4, 4, 6, 6, 20];
    for (i, &cap) in capacities.iter().enumerate() {
        engine.add_room(&format!("R{i}"), cap, i % 2 == 0, i % 3 == 0).await.unwrap();
    }
    println!("  created {} rooms", capacities.len());

    let mut latencies = Vec::with_capacity(1000);
    for _ in 0..1000 {
        let start = Instant::now();
        let outcome = engine.allocate(2, false, false, None).await.unwrap();
        latencies.push(start.elapsed());
        let room = outcome.room.expect("pool never exhausts in this phase");
        engine.deallocate(room.id).await.unwrap();
    }
    print_latency("allocate (sequential, warm pool)", &mut latencies);
}

async fn storm_bench() {
    let engine = Arc::new(bench_engine("storm.wal"));
    const ROOMS: usize = 200;
    const CALLERS: usize = 400;
    for i in 0..ROOMS {
        engine.add_room(&format!("S{i}"), 1, false, false).await.unwrap();
    }

    let start = Instant::now();
    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let t = Instant::now();
            let outcome = engine.allocate(1, false, false, None).await.unwrap();
            (t.elapsed(), outcome.allocated)
        }));
    }

    let mut latencies = Vec::with_capacity(CALLERS);
    let mut filled = 0usize;
    for handle in handles {
        let (latency, allocated) = handle.await.unwrap();
        latencies.push(latency);
        if allocated {
            filled += 1;
        }
    }
    let elapsed = start.elapsed();

    println!(
        "  {CALLERS} concurrent callers over {ROOMS} rooms: {filled} filled, {} unfilled, {:.0} req/s",
        CALLERS - filled,
        CALLERS as f64 / elapsed.as_secs_f64(),
    );
    assert!(filled <= ROOMS, "more fills than rooms — a room was double-allocated");
    print_latency("allocate (storm)", &mut latencies);
}

fn main() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    println!("quarters allocation stress");
    rt.block_on(async {
        cycle_bench().await;
        storm_bench().await;
    });
}
