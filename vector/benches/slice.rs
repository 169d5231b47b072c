use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rrb_vector::Vector;

pub fn slice(c: &mut Criterion) {
    let input = [0; 10000];
    let mut group = c.benchmark_group("slice");

    group.bench_function("slice 100 out of 1k, N=8", |b| {
        let vec: Vector<_, 8> = input[..1000].iter().copied().collect();
        b.iter(|| black_box(vec.slice(500, 600)));
    });

    group.bench_function("slice 100 out of 10k, N=8", |b| {
        let vec: Vector<_, 8> = input.iter().copied().collect();
        b.iter(|| black_box(vec.slice(5000, 5100)));
    });

    group.bench_function("slice 100 out of 1k, N=32", |b| {
        let vec: Vector<_, 32> = input[..1000].iter().copied().collect();
        b.iter(|| black_box(vec.slice(500, 600)));
    });

    group.bench_function("slice 100 out of 10k, N=32", |b| {
        let vec: Vector<_, 32> = input.iter().copied().collect();
        b.iter(|| black_box(vec.slice(5000, 5100)));
    });
}

pub fn concat(c: &mut Criterion) {
    let input = [0; 10000];
    let left: Vector<u32, 32> = input[..5000].iter().copied().collect();
    let right: Vector<u32, 32> = input[5000..].iter().copied().collect();
    let mut group = c.benchmark_group("concat");

    group.bench_function("5k ++ 5k, N=32", |b| {
        b.iter(|| black_box(left.concat(&right)));
    });

    group.bench_function("split and rejoin 10k, N=32", |b| {
        let vec = left.concat(&right);
        b.iter(|| {
            let front = vec.slice(0, 3333).unwrap();
            let back = vec.slice(3333, 10000).unwrap();
            black_box(front.concat(&back))
        });
    });
}

criterion_group!(benches, slice, concat);
criterion_main!(benches);
