//! Top-N laws and bounded vs unbounded equivalence.

mod test_data_gen;

use rand::Rng;

use rowpipe::rowpipe_core::expr::Expr;
use rowpipe::rowpipe_core::projection::{OrderedTopNProjection, Projection, TopNProjection};
use rowpipe::rowpipe_core::row::OwnedRow;
use rowpipe::rowpipe_operators::testing::{drain, range};
use rowpipe::rowpipe_operators::{InMemoryBatchIterator, Projector};
use rowpipe::ProjectorFactory;
use test_data_gen::{random_rows, seeded, shard_context};

fn ordered(limit: Option<usize>, offset: usize, reverse: bool, nulls_first: Option<bool>) -> Projection {
    OrderedTopNProjection {
        limit,
        offset,
        outputs: Expr::identity(2),
        order_by: vec![0],
        reverse_flags: vec![reverse],
        nulls_first: vec![nulls_first],
    }
    .into()
}

async fn run(projection: &Projection, rows: Vec<OwnedRow>, batch_size: usize) -> Vec<OwnedRow> {
    let ctx = shard_context();
    let projector = ProjectorFactory::new().create(projection, &ctx).unwrap();
    let source = Box::new(InMemoryBatchIterator::batched(rows, batch_size));
    let out = drain(projector.apply(source)).await.unwrap();
    assert_eq!(ctx.ram_accounting().total_bytes(), 0);
    out
}

#[tokio::test]
async fn test_topn_cardinality_law() {
    for n in [0usize, 1, 5, 20] {
        for limit in [0usize, 1, 3, 50] {
            for offset in [0usize, 2, 30] {
                let projection: Projection = TopNProjection {
                    limit: Some(limit),
                    offset,
                    outputs: Expr::identity(1),
                }
                .into();
                let out = run(&projection, range(0, n as i64), 4).await;
                let expected = n.saturating_sub(offset).min(limit);
                assert_eq!(out.len(), expected, "n={n} limit={limit} offset={offset}");
                if expected > 0 {
                    assert_eq!(out, range(offset as i64, (offset + expected) as i64));
                }
            }
        }
    }
}

#[tokio::test]
async fn test_bounded_and_unbounded_ordered_topn_agree() {
    let mut rng = seeded(0x5eed);
    for round in 0..50 {
        let n = rng.gen_range(0..300);
        let rows = random_rows(&mut rng, n, 20);
        let limit = rng.gen_range(0..40);
        let offset = rng.gen_range(0..10);
        let reverse = rng.gen_bool(0.5);
        let nulls_first = match rng.gen_range(0..3) {
            0 => None,
            1 => Some(true),
            _ => Some(false),
        };
        let batch = rng.gen_range(1..64);

        let bounded = ordered(Some(limit), offset, reverse, nulls_first);
        let unbounded = ordered(None, offset, reverse, nulls_first);
        assert!(matches!(
            ProjectorFactory::new().create(&bounded, &shard_context()).unwrap(),
            Projector::SortingTopN(_)
        ));

        let heap_out = run(&bounded, rows.clone(), batch).await;
        let mut sort_out = run(&unbounded, rows, batch).await;
        sort_out.truncate(limit);
        assert_eq!(heap_out, sort_out, "round {round}");
    }
}

#[tokio::test]
async fn test_ordered_topn_default_null_placement() {
    use rowpipe::rowpipe_core::row;
    use rowpipe::rowpipe_core::types::Scalar;

    let rows = vec![row![2, "b"], row![Scalar::Null, "n"], row![1, "a"]];
    let asc = run(&ordered(Some(3), 0, false, None), rows.clone(), 2).await;
    assert_eq!(asc, vec![row![1, "a"], row![2, "b"], row![Scalar::Null, "n"]]);

    let desc = run(&ordered(Some(3), 0, true, None), rows, 2).await;
    assert_eq!(desc, vec![row![Scalar::Null, "n"], row![2, "b"], row![1, "a"]]);
}
