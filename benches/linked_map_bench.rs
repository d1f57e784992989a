use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use handle_collections::{BidiIterator, HashedMap, LinkedMap, LruMap};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert_100k(c: &mut Criterion) {
    c.bench_function("hashed::insert_100k", |b| {
        b.iter_batched(
            HashedMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("linked::insert_100k", |b| {
        b.iter_batched(
            LinkedMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit_10k(c: &mut Criterion) {
    c.bench_function("linked::get_hit_10k_on_100k", |b| {
        let keys: Vec<_> = lcg(7).take(100_000).map(key).collect();
        let m: LinkedMap<String, u64> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i as u64))
            .collect();
        // Precompute 10k random query keys using LCG
        let n = keys.len();
        let mut s = 0x9e3779b97f4a7c15u64;
        let queries: Vec<String> = (0..10_000)
            .map(|_| {
                s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                keys[(s as usize) % n].clone()
            })
            .collect();
        b.iter(|| {
            for k in &queries {
                black_box(m.get(k));
            }
        })
    });
}

fn bench_ordered_walks(c: &mut Criterion) {
    let m: LinkedMap<String, u64> = lcg(999)
        .take(100_000)
        .enumerate()
        .map(|(i, x)| (key(x), i as u64))
        .collect();

    c.bench_function("linked::iter_all_100k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for (_k, v) in m.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("linked::ordered_iter_all_100k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            let mut it = m.ordered_iter();
            while let Ok(Some((_k, v))) = it.next(&m) {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });
}

fn bench_drain_from_front(c: &mut Criterion) {
    c.bench_function("linked::pop_front_100k", |b| {
        b.iter_batched(
            || {
                lcg(5)
                    .take(100_000)
                    .enumerate()
                    .map(|(i, x)| (key(x), i as u64))
                    .collect::<LinkedMap<_, _>>()
            },
            |mut m| {
                while let Some(e) = m.pop_front() {
                    black_box(e);
                }
                m
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_lru_churn(c: &mut Criterion) {
    c.bench_function("lru::churn_100k_into_1k", |b| {
        b.iter_batched(
            || LruMap::<u64, u64>::new(1_000).unwrap(),
            |mut m| {
                for x in lcg(17).take(100_000) {
                    let k = x % 4_000;
                    if m.get(&k).is_none() {
                        m.insert(k, x);
                    }
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_get_hit_10k,
              bench_ordered_walks,
              bench_drain_from_front,
              bench_lru_churn
}
criterion_main!(benches_insert, benches_ops);
