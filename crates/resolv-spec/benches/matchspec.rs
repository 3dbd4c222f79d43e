use criterion::{black_box, criterion_group, criterion_main, Criterion};
use resolv_spec::{MatchSpec, PackageRecord, Version};

fn bench_parse_match_spec(c: &mut Criterion) {
    let specs = [
        "foo",
        "foo>=1.0,<2.0",
        "foo 1.2.* py39_0",
        "conda-forge::numpy=1.26=py311*",
        "bar[version='(<1|>2),!=5', build=py*, build_number='>=2']",
        "baz~=3.4.1",
    ];

    c.bench_function("parse_match_spec", |b| {
        b.iter(|| {
            for spec in specs {
                black_box(MatchSpec::parse(black_box(spec)).ok());
            }
        })
    });
}

fn bench_version_ordering(c: &mut Criterion) {
    let versions: Vec<Version> = ["1.0", "1.0.post1", "1.0rc1", "2!0.1", "1.10.3", "1.9", "1.0dev2"]
        .iter()
        .filter_map(|v| Version::parse(v).ok())
        .collect();

    c.bench_function("sort_versions", |b| {
        b.iter(|| {
            let mut sorted = versions.clone();
            sorted.sort();
            black_box(sorted)
        })
    });
}

fn bench_matches(c: &mut Criterion) {
    let spec = MatchSpec::parse("foo>=1.0,<2.0|>=3.0").ok();
    let records: Vec<PackageRecord> = ["0.9", "1.5", "2.1", "3.3"]
        .iter()
        .filter_map(|v| PackageRecord::parse("foo", v, "0").ok())
        .collect();

    c.bench_function("match_records", |b| {
        b.iter(|| {
            if let Some(spec) = &spec {
                for record in &records {
                    black_box(spec.matches(black_box(record)));
                }
            }
        })
    });
}

criterion_group!(benches, bench_parse_match_spec, bench_version_ordering, bench_matches);
criterion_main!(benches);
