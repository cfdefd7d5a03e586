//! Performance benchmarks for the profile engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dossier::{ItemInput, PlayerProfile, ProfileStore, ProfileType, StoreConfig};
use serde_json::json;
use tempfile::TempDir;

fn create_store(dir: &TempDir) -> ProfileStore {
    ProfileStore::create(StoreConfig {
        path: dir.path().join("store"),
        create_if_missing: true,
    })
    .unwrap()
}

/// Benchmark incremental responses against profiles of varying size.
fn bench_incremental_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_response");

    for item_count in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("item_count", item_count),
            &item_count,
            |b, &count| {
                let mut player = PlayerProfile::new("bench");
                let profile = player.profile_mut(ProfileType::Profile0);
                for i in 0..count {
                    profile.add_item(ItemInput::new(format!("Treasure:T{}", i), 1));
                }
                let mut rvn = 0i64;
                player
                    .construct_response(ProfileType::Profile0, rvn, &[], false)
                    .unwrap();
                rvn = 1;

                b.iter(|| {
                    player
                        .profile_mut(ProfileType::Profile0)
                        .modify_stat("level", json!(rvn));
                    let response = player
                        .construct_response(ProfileType::Profile0, rvn, &[], false)
                        .unwrap();
                    rvn = response.profile_revision.0 as i64;
                    black_box(response);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark full snapshots against profiles of varying size.
fn bench_full_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_snapshot");

    for item_count in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("item_count", item_count),
            &item_count,
            |b, &count| {
                let mut player = PlayerProfile::new("bench");
                let profile = player.profile_mut(ProfileType::Profile0);
                for i in 0..count {
                    profile.add_item(ItemInput::new(format!("Treasure:T{}", i), 1));
                }
                player
                    .construct_response(ProfileType::Profile0, 0, &[], false)
                    .unwrap();

                b.iter(|| {
                    let response = player
                        .construct_response(ProfileType::Profile0, -1, &[], false)
                        .unwrap();
                    black_box(response);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark template-id lookups.
fn bench_item_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("item_lookup");

    for item_count in [100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("item_count", item_count),
            &item_count,
            |b, &count| {
                let mut player = PlayerProfile::new("bench");
                let profile = player.profile_mut(ProfileType::Profile0);
                for i in 0..count {
                    profile.add_item(ItemInput::new(format!("Treasure:T{}", i), 1));
                }
                profile.add_item(ItemInput::new("Currency:Gold", 100));

                let profile = player.profile(ProfileType::Profile0);
                b.iter(|| {
                    black_box(profile.find_item_by_template_id("Currency:Gold"));
                    black_box(profile.find_items_by_type("Treasure").len());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark store save with dirty profiles.
fn bench_store_save(c: &mut Criterion) {
    c.bench_function("store_save_100_items", |b| {
        let dir = TempDir::new().unwrap();
        let store = create_store(&dir);
        let handle = store.get("bench").unwrap();
        {
            let mut player = handle.lock();
            let profile = player.profile_mut(ProfileType::Profile0);
            for i in 0..100 {
                profile.add_item(ItemInput::new(format!("Treasure:T{}", i), 1));
            }
            player
                .construct_response(ProfileType::Profile0, 0, &[], false)
                .unwrap();
        }

        let mut counter = 0u64;
        b.iter(|| {
            // Touch a stat so there is something dirty to flush.
            counter += 1;
            {
                let mut player = handle.lock();
                player
                    .profile_mut(ProfileType::Profile0)
                    .modify_stat("counter", json!(counter));
                player
                    .construct_response(ProfileType::Profile0, counter as i64, &[], false)
                    .unwrap();
            }
            store.save("bench").unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_incremental_response,
    bench_full_snapshot,
    bench_item_lookup,
    bench_store_save
);
criterion_main!(benches);
