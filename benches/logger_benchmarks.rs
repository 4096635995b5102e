//! Criterion benchmarks for logrelay

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logrelay::appenders::build_request_body;
use logrelay::prelude::*;
use logrelay::generate_hash_at;

/// Transport that discards every batch
struct NullTransport;

impl BatchTransport for NullTransport {
    fn send_batch(&mut self, _records: &[LogRecord], _config: &LoggerConfig) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

// ============================================================================
// Logger Creation Benchmarks
// ============================================================================

fn bench_logger_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("logger_lifecycle");
    group.throughput(Throughput::Elements(1));

    group.bench_function("build_and_shutdown", |b| {
        b.iter(|| {
            let mut logger = Logger::new(LoggerConfig::disabled()).unwrap();
            black_box(logger.shutdown())
        });
    });

    group.finish();
}

// ============================================================================
// Ingress Benchmarks
// ============================================================================

fn bench_log_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_call");
    group.throughput(Throughput::Elements(1));

    let logger = Logger::builder()
        .config(LoggerConfig::disabled())
        .channel_capacity(100_000)
        .build()
        .unwrap();

    group.bench_function("info", |b| {
        b.iter(|| logger.info(black_box("bench"), black_box("plain message")));
    });

    group.bench_function("info_with_payload", |b| {
        b.iter(|| {
            logger.info_with(
                black_box("bench"),
                black_box("with data"),
                Payload::new().with_field("user_id", 42).with_field("ok", true),
            )
        });
    });

    let server_logger = Logger::builder()
        .config(LoggerConfig {
            log_server: true,
            server_api_protocol: "http".to_string(),
            server_api_host: "localhost".to_string(),
            server_api_port: "8080".to_string(),
            flush_interval_ms: 50,
            ..LoggerConfig::disabled()
        })
        .transport(NullTransport)
        .channel_capacity(100_000)
        .build()
        .unwrap();

    group.bench_function("info_batched_for_server", |b| {
        b.iter(|| server_logger.info(black_box("bench"), black_box("to server")));
    });

    group.finish();
}

// ============================================================================
// Formatting Benchmarks
// ============================================================================

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");

    let record = LogRecord::new(LogLevel::Error, "db", "timeout", Environment::Production)
        .with_payload(Payload::new().with_field("retries", 3).with_field("host", "db-1"));

    group.bench_function("format_line", |b| {
        b.iter(|| black_box(&record).format_line());
    });

    group.bench_function("window_token", |b| {
        b.iter(|| generate_hash_at(black_box(1_700_000_000), black_box("server-key")));
    });

    for size in [1usize, 100, 1000] {
        let records: Vec<LogRecord> = (0..size).map(|_| record.clone()).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("request_body", size), &records, |b, records| {
            b.iter(|| build_request_body(black_box(records)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_logger_lifecycle,
    bench_log_calls,
    bench_formatting
);
criterion_main!(benches);
