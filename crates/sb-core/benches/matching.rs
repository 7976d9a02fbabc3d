use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sb_core::{Settings, SiteEntry, SiteMatcher};

fn bench_should_block(c: &mut Criterion) {
    let sites = (0..500)
        .map(|i| SiteEntry::new(format!("site{i}.example.com")))
        .chain(["reddit.com/r/all", "facebook.com"].into_iter().map(SiteEntry::new))
        .collect();
    let settings = Settings {
        sites,
        ..Settings::default()
    };
    let matcher = SiteMatcher::new(&settings);

    c.bench_function("should_block/hit", |b| {
        b.iter(|| matcher.should_block(black_box("https://www.facebook.com/feed")))
    });
    c.bench_function("should_block/miss", |b| {
        b.iter(|| matcher.should_block(black_box("https://docs.rs/tokio/latest/tokio/")))
    });
}

criterion_group!(benches, bench_should_block);
criterion_main!(benches);
