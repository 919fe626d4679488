/// Benchmarks for the reshaping of reduction results into series.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pastizales::series::{band_series, productive_offset, productive_year, yearly_series};
use serde_json::{json, Map, Value};

fn composites(year: i32, period: u32) -> Map<String, Value> {
    (0..365 / period)
        .map(|index| {
            let day = 1 + period * index;
            (format!("b{}-{}", year, day), json!(index as f64 * 1.5))
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    for period in [8, 16] {
        let current = composites(2022, period);
        let next = composites(2023, period);
        let offset = productive_offset(period);
        let name = format!("productive_year(period={})", period);
        c.bench_function(&name, |b| {
            b.iter(|| {
                let current = band_series(black_box(&current));
                let next = band_series(black_box(&next));
                productive_year(&current, &next, offset)
            })
        });
    }

    let yearly: Map<String, Value> = (2001..2024)
        .map(|year| (format!("b{}", year), json!(year as f64)))
        .collect();
    c.bench_function("yearly_series", |b| {
        b.iter(|| yearly_series(black_box(&yearly)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
