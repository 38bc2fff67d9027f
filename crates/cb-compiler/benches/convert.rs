use std::hint::black_box;
use std::time::Duration;

use cb_compiler::{convert, ConvertOptions};
use cb_core::{pattern_to_regex, validate_regex, HostVersion};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn synthetic_list(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match i % 8 {
            0 => format!("||ads{i}.example^"),
            1 => format!("||track{i}.example^$script,third-party"),
            2 => format!("@@||cdn{i}.example^$image"),
            3 => format!("site{i}.com##.banner-{i}"),
            4 => format!("##.promo-{i}"),
            5 => format!("/banner/{i}/*/img^$image,domain=a{i}.com|~b{i}.com"),
            6 => format!("site{i}.com#%#//scriptlet('set-constant', 'ads{i}', 'false')"),
            _ => format!("||ads{i}.example^$badfilter"),
        })
        .collect()
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    group.measurement_time(Duration::from_secs(5));

    for &size in &[1_000usize, 10_000, 50_000] {
        let lines = synthetic_list(size);
        let options = ConvertOptions::new(HostVersion::V16_4).with_advanced_blocking(true);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| convert(black_box(lines), &options, None, None));
        });
    }

    group.finish();
}

fn bench_pattern(c: &mut Criterion) {
    let patterns = [
        "||ads.example.com^",
        "|https://tracker.example/pixel.gif|",
        "/banner/*/img^",
        "||cdn.example/path/to/script.js?v=*&x=1^",
    ];

    c.bench_function("pattern_to_regex", |b| {
        b.iter(|| {
            for pattern in &patterns {
                if let Ok(regex) = pattern_to_regex(black_box(pattern)) {
                    let _ = validate_regex(&regex);
                }
            }
        })
    });
}

criterion_group!(benches, bench_convert, bench_pattern);
criterion_main!(benches);
