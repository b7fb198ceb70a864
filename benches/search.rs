//! Benchmarks for search operations.
//!
//! Benchmark targets:
//! - Ranked search over 1,000 entries: <20ms
//! - Substring fallback over 1,000 entries: <50ms
//! - Query building and highlighting: <10µs

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Runtime;

use minmo::services::highlight_terms;
use minmo::storage::sqlite::build_fts_query;
use minmo::{CreateEntryInput, JournalConfig, JournalStore};

// ============================================================================
// Helper Functions
// ============================================================================

const WORDS: &[&str] = &[
    "morning", "coffee", "walk", "harbour", "rain", "sunset", "friend", "music", "garden",
    "train", "book", "quiet", "laugh", "market", "bread", "river", "letter", "bicycle",
];

/// Deterministic pseudo-random sentence for entry `n`.
fn sentence(n: usize, len: usize) -> String {
    (0..len)
        .map(|i| WORDS[(n * 7 + i * 13) % WORDS.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Creates a store populated with `count` entries.
fn populated_store(rt: &Runtime, dir: &TempDir, count: usize) -> JournalStore {
    let store = JournalStore::open(JournalConfig::for_data_dir(dir.path()).without_delays());
    rt.block_on(async {
        for n in 0..count {
            let input = CreateEntryInput::new(format!("file:///audio/{n}.m4a"))
                .with_prompt(sentence(n, 5))
                .with_transcript(sentence(n + 1, 40));
            store.entries().save(&input).await.expect("Failed to save entry");
        }
    });
    store
}

// ============================================================================
// Store Search
// ============================================================================

fn bench_ranked_search(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to build runtime");
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = populated_store(&rt, &dir, 1_000);

    let mut group = c.benchmark_group("ranked_search");
    group.measurement_time(Duration::from_secs(5));

    for query in ["coffee", "morning walk", "harb", "nonexistent"] {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, query| {
            b.iter(|| rt.block_on(store.entries().search(black_box(query))));
        });
    }

    group.finish();
}

fn bench_substring_fallback(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to build runtime");
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = populated_store(&rt, &dir, 1_000);

    rt.block_on(async {
        let db = store.connections().get_connection().await.unwrap();
        db.call("drop_index", |conn| {
            conn.execute_batch("DROP TABLE entries_fts").map_err(|e| {
                minmo::Error::OperationFailed {
                    operation: "drop_index".to_string(),
                    cause: e.to_string(),
                }
            })
        })
        .await
        .unwrap();
    });

    let mut group = c.benchmark_group("substring_fallback");
    group.measurement_time(Duration::from_secs(5));

    for query in ["coffee", "morning walk"] {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, query| {
            b.iter(|| rt.block_on(store.entries().search(black_box(query))));
        });
    }

    group.finish();
}

// ============================================================================
// Text Helpers
// ============================================================================

fn bench_text_helpers(c: &mut Criterion) {
    let transcript = sentence(3, 120);

    c.bench_function("build_fts_query", |b| {
        b.iter(|| build_fts_query(black_box("a slow \"morning\" coffee by the river")));
    });

    c.bench_function("highlight_terms", |b| {
        b.iter(|| highlight_terms(black_box(&transcript), black_box("coffee river")));
    });
}

criterion_group!(
    benches,
    bench_ranked_search,
    bench_substring_fallback,
    bench_text_helpers
);
criterion_main!(benches);
