use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use sm3_crypto::{
    compress_optimized, compress_reference, hash_with, leaf_hash, Engine, MerkleTree, BLOCK_LEN,
    IV,
};

fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

fn bench_compress(c: &mut Criterion) {
    let mut block = [0u8; BLOCK_LEN];
    block.copy_from_slice(&random_bytes(BLOCK_LEN));

    let mut group = c.benchmark_group("compress");
    group.throughput(Throughput::Bytes(BLOCK_LEN as u64));
    group.bench_function("reference", |b| {
        let mut state = IV;
        b.iter(|| compress_reference(black_box(&mut state), black_box(&block)));
    });
    group.bench_function("optimized", |b| {
        let mut state = IV;
        b.iter(|| compress_optimized(black_box(&mut state), black_box(&block)));
    });
    group.finish();
}

fn bench_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash");
    for size in [64usize, 1024, 4096, 65536, 1 << 20] {
        let data = random_bytes(size);
        group.throughput(Throughput::Bytes(size as u64));
        for engine in [Engine::Reference, Engine::Optimized] {
            group.bench_with_input(BenchmarkId::new(engine.name(), size), &data, |b, data| {
                b.iter(|| hash_with(engine, black_box(data)));
            });
        }
    }
    group.finish();
}

fn bench_merkle(c: &mut Criterion) {
    let leaves: Vec<Vec<u8>> = (0..100_000)
        .map(|i| format!("leaf_data_{i}").into_bytes())
        .collect();

    let mut group = c.benchmark_group("merkle");
    group.sample_size(10);
    group.bench_function("build 100k", |b| {
        b.iter(|| MerkleTree::build(black_box(leaves.as_slice())).expect("build"));
    });

    let tree = MerkleTree::build(&leaves).expect("build");
    let root = tree.root();
    group.bench_function("gen proof", |b| {
        b.iter(|| tree.proof(black_box(12_345)).expect("proof"));
    });

    let proof = tree.proof(12_345).expect("proof");
    let leaf = leaf_hash(&leaves[12_345]);
    group.bench_function("verify", |b| {
        b.iter(|| assert!(proof.verify(black_box(&leaf), black_box(&root))));
    });
    group.finish();
}

criterion_group!(benches, bench_compress, bench_hash, bench_merkle);
criterion_main!(benches);
