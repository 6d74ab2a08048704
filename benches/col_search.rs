//! Micro benchmarks for the column-store search path.
#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::sync::Arc;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use colstore::primitives::pager::{MemPageStore, PageStore, PagerOptions};
use colstore::storage::col::{FixedLeaf, PageContent, VarCell, VarSlot, VariableLeaf};
use colstore::storage::TreeOptions;
use colstore::{ColumnTree, ColumnTreeBuilder, SearchState};

const LEAVES: u64 = 2_048;
const LEAF_RECORDS: u64 = 256;
const LOOKUP_SAMPLES: usize = 4_096;
const UPDATE_COUNT: u64 = 4_096;

fn fixed_tree() -> ColumnTree {
    let store = Arc::new(MemPageStore::new(PagerOptions::default()).expect("store"));
    let leaves = (0..LEAVES).map(|i| {
        PageContent::Fixed(FixedLeaf::new(
            1 + i * LEAF_RECORDS,
            vec![i as u8; LEAF_RECORDS as usize],
        ).expect("leaf"))
    });
    let root = ColumnTreeBuilder::new(&store).build(leaves).expect("build");
    let store_trait: Arc<dyn PageStore> = store;
    ColumnTree::open(store_trait, root, TreeOptions::default()).expect("open")
}

fn variable_tree() -> ColumnTree {
    let store = Arc::new(MemPageStore::new(PagerOptions::default()).expect("store"));
    let leaves = (0..LEAVES).map(|i| {
        // 64 single-record slots followed by 48 runs of four
        let mut slots: Vec<VarSlot> = (0..64).map(|j| VarSlot::value(format!("{i}:{j}"))).collect();
        slots.extend((0..48).map(|_| VarSlot::repeated(VarCell::Value(Bytes::from_static(b"run")), 4)));
        let leaf = VariableLeaf::new(1 + i * LEAF_RECORDS, slots).expect("leaf");
        PageContent::Variable(leaf)
    });
    let root = ColumnTreeBuilder::new(&store).build(leaves).expect("build");
    let store_trait: Arc<dyn PageStore> = store;
    ColumnTree::open(store_trait, root, TreeOptions::default()).expect("open")
}

fn probes(seed: u64) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..LOOKUP_SAMPLES)
        .map(|_| rng.gen_range(1..=LEAVES * LEAF_RECORDS))
        .collect()
}

fn col_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/col_search");
    group.sample_size(30);

    let fixed = fixed_tree();
    let keys = probes(0xBEEF_F00D);
    group.throughput(Throughput::Elements(LOOKUP_SAMPLES as u64));
    group.bench_function("fixed_point_lookup", |b| {
        let mut state = SearchState::new();
        b.iter(|| {
            for recno in &keys {
                fixed.search_into(&mut state, *recno, false).expect("search");
                black_box(state.slot());
            }
        });
    });

    let variable = variable_tree();
    group.bench_function("variable_point_lookup", |b| {
        let mut state = SearchState::new();
        b.iter(|| {
            for recno in &keys {
                variable.search_into(&mut state, *recno, false).expect("search");
                black_box(state.slot());
            }
        });
    });

    group.bench_function("append_past_end", |b| {
        let last = LEAVES * LEAF_RECORDS;
        b.iter(|| {
            let state = fixed.search(last + 1, true).expect("search");
            black_box(state.recno());
        });
    });

    group.throughput(Throughput::Elements(UPDATE_COUNT));
    group.bench_function("overlay_upsert", |b| {
        b.iter_batched(
            fixed_tree,
            |tree| {
                for recno in 1..=UPDATE_COUNT {
                    tree.upsert(recno * 7, Some(Bytes::from_static(b"u")))
                        .expect("upsert");
                }
                black_box(tree.stats_snapshot());
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, col_search);
criterion_main!(benches);
