//! Allocation, environment and collection benchmarks

use burke::eval::{
    machine::env::EnvBuilder,
    memory::{
        collect::collect,
        heap::Heap,
        mutator::{Constants, MutatorHeapView, ObjectBuilder},
        object::Obj,
        symbol::{find_or_intern, make_package, STANDARD_BUCKETS},
    },
};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Build a proper list of `length` fixnums
fn alloc_list(view: MutatorHeapView, nil: Obj, length: i64) -> Obj {
    let mut list = nil;
    for i in 0..length {
        let item = view.make_fixnum(i).unwrap();
        list = view.make_pair(item, list).unwrap();
    }
    list
}

/// A chain of `height` environments each binding `width` symbols
fn fake_env_stack(
    view: MutatorHeapView,
    constants: &Constants,
    symbols: &[Obj],
    height: usize,
) -> Obj {
    let mut env = view.extend(constants.nil, constants.nil).unwrap();
    for _ in 0..height {
        env = view.extend(env, constants.nil).unwrap();
        for (i, symbol) in symbols.iter().enumerate() {
            let value = view.make_fixnum(i as i64).unwrap();
            view.define(env, *symbol, value).unwrap();
        }
    }
    env
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let heap = Heap::new();
    let view = MutatorHeapView::new(&heap);
    let constants = Constants::allocate(&view).unwrap();
    let package = make_package(&view, "bench", STANDARD_BUCKETS, constants.nil).unwrap();
    let symbols: Vec<Obj> = (0..20)
        .map(|i| find_or_intern(&view, package, &format!("s{i}")).unwrap())
        .collect();
    let env_stack = fake_env_stack(view, &constants, &symbols, 4);

    c.bench_function("alloc_list_100", |b| {
        b.iter(|| alloc_list(view, constants.nil, black_box(100)))
    });
    c.bench_function("alloc_vector_1000", |b| {
        b.iter(|| view.make_vector(black_box(1000), constants.nil).unwrap())
    });
    c.bench_function("intern_existing_symbol", |b| {
        b.iter(|| find_or_intern(&view, package, black_box("s13")).unwrap())
    });
    c.bench_function("deep_env_lookup", |b| {
        b.iter(|| view.lookup(env_stack, black_box(symbols[0])).unwrap())
    });
}

pub fn collection_benchmark(c: &mut Criterion) {
    c.bench_function("collect_after_churn", |b| {
        let heap = Heap::new();
        let (constants, live) = {
            let view = MutatorHeapView::new(&heap);
            let constants = Constants::allocate(&view).unwrap();
            let live = alloc_list(view, constants.nil, 1000);
            (constants, live)
        };
        b.iter(|| {
            {
                let view = MutatorHeapView::new(&heap);
                alloc_list(view, constants.nil, 10_000);
            }
            let mut roots = constants.roots().to_vec();
            roots.push(live);
            collect(&roots, &heap, false)
        })
    });
}

criterion_group!(benches, criterion_benchmark, collection_benchmark);
criterion_main!(benches);
