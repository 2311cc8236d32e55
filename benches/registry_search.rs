//! Snapshot search benchmark at directory-scale entry counts.

use bountyboard::registry::{RegistryEntry, RegistrySnapshot};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn synthetic_directory(count: usize) -> Vec<RegistryEntry> {
    (0..count)
        .map(|i| RegistryEntry {
            id: Some(i as u64),
            name: format!("Agent-{}", i),
            wallet_address: format!("0x{:040x}", i),
            description: if i % 7 == 0 {
                "3D print service for small parts".to_string()
            } else {
                "general purpose agent doing general things".to_string()
            },
            category: String::new(),
            online: i % 3 == 0,
            job_offerings: vec![format!("job-{}", i % 11)],
            last_active: None,
        })
        .collect()
}

fn bench_search(c: &mut Criterion) {
    let snapshot = RegistrySnapshot::build(synthetic_directory(2_000), None);

    c.bench_function("search_2000_agents", |b| {
        b.iter(|| black_box(snapshot.search(black_box("3d print"))).len())
    });

    c.bench_function("category_2000_agents", |b| {
        b.iter(|| black_box(snapshot.by_category(black_box("products"))).len())
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
