use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use std::sync::Arc;
use tempfile::TempDir;
use tmstore::analysis::ngram::ngram_keys;
use tmstore::core::config::{BackendConfig, Config};
use tmstore::core::context::EngineContext;
use tmstore::core::memory::Memory;
use tmstore::core::types::UnitRecord;
use tmstore::scoring::similarity::similarity;
use tmstore::search::concordance::ConcordanceQuery;
use tmstore::search::fuzzy::SearchQuery;
use tmstore::transfer::import::ImportOptions;

const WORDS: [&str; 12] = [
    "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "save", "file", "settings", "open",
];

/// Helper to create a random sentence
fn sentence(words: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..words)
        .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

fn memory_with_units(dir: &TempDir, backend: &str, units: usize) -> Memory {
    let config = match backend {
        "relational" => BackendConfig::Relational {
            database: dir.path().join("bench.db"),
        },
        _ => BackendConfig::Embedded {
            path: dir.path().join("bench"),
        },
    };
    let memory = Memory::open("bench", &config, &Config::default(), Arc::new(EngineContext::default())).unwrap();
    let records = (0..units).map(|i| {
        Ok(UnitRecord::new(i.to_string())
            .with_variant("en", sentence(8))
            .with_variant("de", sentence(8)))
    });
    memory.import_units(records, ImportOptions::default()).unwrap();
    memory
}

/// Benchmark n-gram key extraction
fn bench_ngram_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("ngram_keys");

    for words in [5, 20, 80].iter() {
        let text = sentence(*words);
        group.bench_with_input(BenchmarkId::from_parameter(words), &text, |b, text| {
            b.iter(|| ngram_keys(black_box(text)));
        });
    }

    group.finish();
}

/// Benchmark the similarity scorer on growing inputs
fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");

    for words in [5, 20, 80].iter() {
        let one = sentence(*words);
        let two = sentence(*words);
        group.bench_with_input(BenchmarkId::from_parameter(words), &(one, two), |b, (one, two)| {
            b.iter(|| similarity(black_box(one), black_box(two)));
        });
    }

    group.finish();
}

/// Benchmark exact, fuzzy and concordance lookups on both backends
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(20);

    for backend in ["embedded", "relational"] {
        let dir = TempDir::new().unwrap();
        let memory = memory_with_units(&dir, backend, 2_000);
        let probe = memory.get_unit("42").unwrap().unwrap();
        let text = probe.variant("en").unwrap().plain_text.clone();

        group.bench_function(BenchmarkId::new("exact", backend), |b| {
            let query = SearchQuery::new(text.clone(), "en", "de").with_min_similarity(100);
            b.iter(|| memory.search(black_box(&query)).unwrap());
        });

        group.bench_function(BenchmarkId::new("fuzzy_70", backend), |b| {
            let query = SearchQuery::new(text.clone(), "en", "de").with_min_similarity(70);
            b.iter(|| memory.search(black_box(&query)).unwrap());
        });

        group.bench_function(BenchmarkId::new("concordance", backend), |b| {
            let query = ConcordanceQuery::new("quick brown", "en").with_limit(50);
            b.iter(|| memory.concordance(black_box(&query)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark batch import
fn bench_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("import");
    group.sample_size(10);

    for units in [100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(units), units, |b, &units| {
            b.iter(|| {
                let dir = TempDir::new().unwrap();
                memory_with_units(&dir, "embedded", units)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ngram_keys, bench_similarity, bench_search, bench_import);
criterion_main!(benches);
