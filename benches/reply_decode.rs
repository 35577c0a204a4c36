//! Reply decoding benchmark suite.
//!
//! Measures the per-frame cost on the dispatcher's read loop:
//! - parsing an inbound frame
//! - interpreting a reply into its payload
//! - encoding an outbound command
//!
//! Run with: cargo bench --bench reply_decode
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};

use webos_remote::CommandId;
use webos_remote::protocol::{Command, Reply, RequestType};

// ============================================================================
// Frames
// ============================================================================

fn volume_frame() -> String {
    json!({
        "id": 42,
        "type": "response",
        "payload": {"volumeStatus": {"volume": 12, "muteStatus": false}, "returnValue": true}
    })
    .to_string()
}

fn app_catalogue_frame(apps: usize) -> String {
    let launch_points: Vec<Value> = (0..apps)
        .map(|i| json!({"id": format!("app.{i}"), "title": format!("App {i}"), "icon": "http://x/icon.png"}))
        .collect();

    json!({
        "id": 7,
        "type": "response",
        "payload": {"launchPoints": launch_points, "subscribed": true}
    })
    .to_string()
}

// ============================================================================
// Benchmark: Parse
// ============================================================================

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reply_parse");

    let frame = volume_frame();
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("volume", |b| {
        b.iter(|| Reply::parse(black_box(&frame)));
    });

    for &apps in &[10usize, 100] {
        let frame = app_catalogue_frame(apps);
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("catalogue", apps), &frame, |b, frame| {
            b.iter(|| Reply::parse(black_box(frame)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Interpret
// ============================================================================

fn bench_into_payload(c: &mut Criterion) {
    let reply = Reply::parse(&volume_frame()).expect("frame");

    c.bench_function("reply_into_payload", |b| {
        b.iter(|| black_box(reply.clone()).into_payload());
    });
}

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    c.bench_function("command_encode", |b| {
        b.iter(|| {
            let command = Command::new(
                CommandId::new(black_box(9)),
                RequestType::Request,
                "audio/setVolume",
                Some(json!({"volume": 10})),
            );
            serde_json::to_string(&command)
        });
    });
}

criterion_group!(benches, bench_parse, bench_into_payload, bench_encode);
criterion_main!(benches);
