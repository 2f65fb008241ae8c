use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rowpipe::rowpipe_core::expr::Expr;
use rowpipe::rowpipe_core::projection::{OrderedTopNProjection, Projection, RowGranularity};
use rowpipe::rowpipe_core::row;
use rowpipe::rowpipe_core::row::OwnedRow;
use rowpipe::rowpipe_operators::testing::drain;
use rowpipe::rowpipe_operators::InMemoryBatchIterator;
use rowpipe::{ExecutionContext, ProjectorFactory};

fn make_rows(rows: usize) -> Vec<OwnedRow> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..rows)
        .map(|i| row![rng.gen_range(0..1_000_000i64), format!("row-{i}")])
        .collect()
}

fn ordered(limit: Option<usize>) -> Projection {
    OrderedTopNProjection {
        limit,
        offset: 0,
        outputs: Expr::identity(2),
        order_by: vec![0],
        reverse_flags: vec![true],
        nulls_first: vec![None],
    }
    .into()
}

fn bench_ordered_topn(c: &mut Criterion) {
    let rows = make_rows(50_000);
    let ctx = ExecutionContext::unbounded(RowGranularity::Shard);
    let factory = ProjectorFactory::new();
    let mut group = c.benchmark_group("ordered_topn");

    for (name, limit) in [("bounded_heap", Some(100)), ("full_sort", None)] {
        let projection = ordered(limit);
        group.bench_with_input(BenchmarkId::new(name, rows.len()), &rows, |b, rows| {
            b.iter(|| {
                let projector = factory.create(&projection, &ctx).unwrap();
                let source = Box::new(InMemoryBatchIterator::batched(rows.clone(), 1024));
                let mut out = futures::executor::block_on(drain(projector.apply(source))).unwrap();
                out.truncate(100);
                out
            })
        });
    }
    group.finish();
}

criterion_group!(topn, bench_ordered_topn);
criterion_main!(topn);
