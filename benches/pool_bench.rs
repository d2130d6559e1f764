//! Benchmarks for harvester
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::PathBuf;

fn benchmark_queue_operations(c: &mut Criterion) {
    use harvester::pool::TaskQueue;

    c.bench_function("queue_enqueue_dequeue", |b| {
        let queue = TaskQueue::new();
        let handle = queue.handle();

        b.iter(|| {
            queue.enqueue(PathBuf::from("/data/mybinder000.json"));
            let item = handle.try_dequeue();
            black_box(item);
        })
    });
}

fn benchmark_json_filter(c: &mut Criterion) {
    use harvester::jobs::json_filter::JsonFilter;

    let filter = JsonFilter::new("provider", "GitHub");
    let record: serde_json::Value = serde_json::from_str(
        r#"{"timestamp":"2019-01-01T00:00:00","provider":"GitLab","spec":"org/repo/master","status":"success"}"#,
    )
    .unwrap();

    c.bench_function("json_filter_keeps", |b| {
        b.iter(|| black_box(filter.keeps(black_box(&record))))
    });
}

fn benchmark_regex_cleanup(c: &mut Criterion) {
    use harvester::jobs::regex_scrape::clean_regex;

    c.bench_function("clean_regex", |b| {
        b.iter(|| black_box(clean_regex(black_box(r#"" ^\d{5} (-\d{4})? &amp;lt;$ ""#))))
    });
}

fn benchmark_scrape_document(c: &mut Criterion) {
    use harvester::jobs::regex_scrape::RegexScraper;

    let rows: String = (0..50)
        .map(|i| format!(r#"<tr class="expression"><td>t{}</td><td><div>^\d{{{}}}$</div></td></tr>"#, i, i))
        .collect();
    let page = format!("<html><body><table>{}</table></body></html>", rows);
    let scraper = RegexScraper::new();

    c.bench_function("scrape_document_50_rows", |b| {
        b.iter(|| black_box(scraper.scrape_document("zip", black_box(&page))))
    });
}

criterion_group!(
    benches,
    benchmark_queue_operations,
    benchmark_json_filter,
    benchmark_regex_cleanup,
    benchmark_scrape_document
);
criterion_main!(benches);
