use criterion::{criterion_group, criterion_main, Criterion};
use prollipop::diff::diff;
use prollipop::store::MemoryBlockStore;
use prollipop::tree::create_empty_tree;
use prollipop::update::Update;

fn inserts(n: u32) -> Vec<Update> {
    (0..n)
        .map(|i| Update::Insert {
            key: i.to_be_bytes().to_vec(),
            val: i.to_be_bytes().to_vec(),
        })
        .collect()
}

fn bench_diff_identical_trees(c: &mut Criterion) {
    let store = MemoryBlockStore::new();
    let tree = create_empty_tree(32).expect("empty tree");
    let outcome = prollipop::mutate::mutate(&store, &tree, vec![inserts(10_000)]).expect("mutates");
    outcome.persist(&store).expect("persists");
    let tree = outcome.into_tree();

    c.bench_function("diff_10k_identical", |b| {
        b.iter(|| diff(&store, &tree, &store, &tree).expect("diffs"));
    });
}

fn bench_diff_small_divergence(c: &mut Criterion) {
    let store = MemoryBlockStore::new();
    let base = create_empty_tree(32).expect("empty tree");
    let outcome = prollipop::mutate::mutate(&store, &base, vec![inserts(10_000)]).expect("mutates");
    outcome.persist(&store).expect("persists");
    let left = outcome.into_tree();

    let outcome = prollipop::mutate::mutate(
        &store,
        &left,
        vec![vec![Update::Insert {
            key: 5_000u32.to_be_bytes().to_vec(),
            val: b"changed".to_vec(),
        }]],
    )
    .expect("mutates");
    outcome.persist(&store).expect("persists");
    let right = outcome.into_tree();

    c.bench_function("diff_10k_one_changed_key", |b| {
        b.iter(|| diff(&store, &left, &store, &right).expect("diffs"));
    });
}

criterion_group!(benches, bench_diff_identical_trees, bench_diff_small_divergence);
criterion_main!(benches);
