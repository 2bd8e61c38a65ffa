use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use ulid::Ulid;

use pitchbook::engine::{Engine, EngineError};

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

const SLOTS_PER_GROUND: usize = 24;
const DAYS: i64 = 60;

fn slot_labels() -> Vec<String> {
    (0..SLOTS_PER_GROUND).map(|h| format!("{h:02}:00")).collect()
}

async fn setup(engine: &Engine, grounds: usize, users: usize) -> (Vec<Ulid>, Vec<Ulid>) {
    let admin_id = Ulid::new();
    let mut ground_ids = Vec::with_capacity(grounds);
    for i in 0..grounds {
        let info = engine
            .create_ground(
                admin_id,
                format!("bench-ground-{i}"),
                slot_labels(),
                vec!["football".into()],
                true,
            )
            .await
            .unwrap();
        ground_ids.push(info.id);
    }

    let mut user_ids = Vec::with_capacity(users);
    for i in 0..users {
        let id = Ulid::new();
        engine.register_user(id, format!("bench-user-{i}")).await.unwrap();
        user_ids.push(id);
    }

    println!("  created {grounds} grounds, {users} users");
    (ground_ids, user_ids)
}

/// Sequential creates on one ground, every request a distinct (date, slot).
async fn phase1_sequential(engine: &Arc<Engine>, ground_id: Ulid, user_id: Ulid) {
    let today = Utc::now().date_naive();
    let labels = slot_labels();
    let mut latencies = Vec::new();

    for day in 1..=DAYS {
        for label in &labels {
            let start = Instant::now();
            engine
                .create_booking(ground_id, user_id, today + chrono::Duration::days(day), label)
                .await
                .unwrap();
            latencies.push(start.elapsed());
        }
    }

    print_latency("sequential create (uncontended)", &mut latencies);
}

/// All tasks fight over the same small set of slots — the worst case for the
/// per-ground write lock. Exactly one winner per slot.
async fn phase2_contended(engine: &Arc<Engine>, ground_id: Ulid, user_ids: &[Ulid]) {
    let today = Utc::now().date_naive();
    let labels = slot_labels();
    let tasks = 256usize;

    let start = Instant::now();
    let attempts = (0..tasks).map(|i| {
        let engine = engine.clone();
        let user_id = user_ids[i % user_ids.len()];
        let label = labels[i % 4].clone();
        async move {
            engine
                .create_booking(ground_id, user_id, today + chrono::Duration::days(1), &label)
                .await
        }
    });
    let results = futures::future::join_all(attempts).await;
    let elapsed = start.elapsed();

    let won = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::SlotTaken { .. })))
        .count();
    assert_eq!(won, 4, "one winner per contested slot");
    assert_eq!(won + conflicts, tasks);
    println!(
        "  contended create: {tasks} tasks over 4 slots in {:.2}ms ({won} won, {conflicts} conflicts)",
        elapsed.as_secs_f64() * 1000.0
    );
}

/// Concurrent creates spread across independent grounds.
async fn phase3_spread(engine: &Arc<Engine>, ground_ids: &[Ulid], user_ids: &[Ulid]) {
    let today = Utc::now().date_naive();
    let labels = slot_labels();
    let tasks = 512usize;

    let start = Instant::now();
    let attempts = (0..tasks).map(|i| {
        let engine = engine.clone();
        let ground_id = ground_ids[i % ground_ids.len()];
        let user_id = user_ids[i % user_ids.len()];
        let label = labels[(i / ground_ids.len()) % labels.len()].clone();
        let day = 2 + (i / (ground_ids.len() * labels.len())) as i64;
        async move {
            engine
                .create_booking(ground_id, user_id, today + chrono::Duration::days(day), &label)
                .await
        }
    });
    let results = futures::future::join_all(attempts).await;
    let elapsed = start.elapsed();

    let won = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(won, tasks, "spread bookings never collide");
    println!(
        "  spread create: {tasks} bookings across {} grounds in {:.2}ms ({:.0}/s)",
        ground_ids.len(),
        elapsed.as_secs_f64() * 1000.0,
        tasks as f64 / elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let dir = std::env::temp_dir().join("pitchbook_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let wal_path = dir.join(format!("{}.wal", Ulid::new()));

    println!("pitchbook stress bench (wal: {})", wal_path.display());
    let engine = Arc::new(Engine::new(wal_path.clone()).unwrap());

    let (ground_ids, user_ids) = setup(&engine, 10, 32).await;

    println!("phase 1: sequential");
    phase1_sequential(&engine, ground_ids[0], user_ids[0]).await;

    println!("phase 2: contended");
    phase2_contended(&engine, ground_ids[1], &user_ids).await;

    println!("phase 3: spread");
    phase3_spread(&engine, &ground_ids[2..], &user_ids).await;

    let _ = std::fs::remove_file(&wal_path);
    println!("done");
}
