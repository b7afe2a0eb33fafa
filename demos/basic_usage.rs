// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic topic-cache usage example.
//!
//! Demonstrates:
//! 1. Seeding an in-memory backend with a small house
//! 2. Refreshing the cache from it
//! 3. Exact and wildcard queries
//! 4. Confirming a change by polling
//! 5. A rejected publish and a cancelled confirmation
//! 6. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use topic_cache::{
    ChangeController, InMemoryTransport, PollPolicy, Reason, TopicCache, TopicCacheConfig, TopicRecord,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           topic-cache: Basic Usage Example                    ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Seed the backend
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Seeding in-memory backend...");
    let transport = Arc::new(InMemoryTransport::new());
    transport.seed(vec![
        TopicRecord::new("house/living/light", "off")
            .with_time("2026-01-01T08:00:00Z")
            .with_reason(vec![Reason::new("2026-01-01T08:00:00Z", "schedule")]),
        TopicRecord::new("house/living/light/set", "off"),
        TopicRecord::new("house/living/temp", 21i64),
        TopicRecord::new("house/kitchen/light", "on"),
        TopicRecord::new("house/kitchen/light/set", "on"),
        TopicRecord::new("house/kitchen/temp", 19i64),
    ]);
    println!("   └─ {} topics stored", transport.len());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Refresh the cache
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔄 Refreshing cache (house, depth 3)...");
    let config = TopicCacheConfig {
        refresh_depth: 3,
        ..Default::default()
    };
    let cache = TopicCache::new();
    let summary = cache.refresh_topic(transport.as_ref(), "house", &config).await?;
    println!("   └─ Merged {} records, {} nodes cached", summary.applied, cache.len());

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Queries
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Queries:");
    if let Some(node) = cache.get_node("/house/living/light") {
        println!(
            "   ├─ house/living/light = {} (updatable: {}, children: {:?})",
            node.value_string().unwrap_or_default(),
            node.is_updatable(),
            node.children
        );
    }
    for pattern in ["house/%/temp", "house/kitchen/#", "%/%/light/set"] {
        let topics: Vec<String> = cache.get_matches(pattern).into_iter().map(|n| n.topic).collect();
        println!("   ├─ {} → {:?}", pattern, topics);
    }
    println!("   ├─ \"light\" created at {} positions", cache.word_frequency("light"));
    let unique = cache.read().count_name_occurrences(&["living", "temp"], "house", 2) == 1;
    println!("   └─ \"living temp\" is a unique name: {}", unique);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Confirm a change
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n💡 Switching the living room light on...");
    let controller = ChangeController::new(cache.clone(), transport.clone());
    let policy = PollPolicy::new(5, Duration::from_millis(100));
    let start = std::time::Instant::now();
    let confirmed = controller.change("house/living/light/set", "on", policy).await?;
    println!("   └─ Confirmed: {} ({:?})", confirmed, start.elapsed());
    println!(
        "   └─ Cached value: {}",
        cache.value_string("house/living/light/set").unwrap_or_default()
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Failure and cancellation
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚫 Backend rejects publishes...");
    transport.set_nack(true);
    let confirmed = controller.change("house/kitchen/light/set", "off", policy).await?;
    println!("   └─ Confirmed: {}", confirmed);
    transport.set_nack(false);

    println!("\n🛑 Leaving the view mid-confirmation...");
    controller.request_change("house/kitchen/light/set", "off", PollPolicy::interactive(), |ok| {
        println!("   └─ (never printed) settled: {}", ok);
    })?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("   └─ Pending: {}", controller.pending_count());
    println!("   └─ Cancelled: {}", controller.cancel_all());

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    println!("\n✅ Done");
    Ok(())
}

/// Dump all captured metrics, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let rendered = match value {
            DebugValue::Counter(v) => format!("{}", v),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.4}", samples.len(), sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }
    lines.sort();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
