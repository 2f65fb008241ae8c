//! Aggregation and grouping: partial/final merge equivalence.

mod test_data_gen;

use std::collections::HashMap;

use rowpipe::rowpipe_core::projection::{
    AggregateKind, AggregateMode, Aggregation, AggregationProjection, GroupProjection, Projection,
    RowGranularity,
};
use rowpipe::rowpipe_core::row;
use rowpipe::rowpipe_core::row::OwnedRow;
use rowpipe::rowpipe_core::types::Scalar;
use rowpipe::rowpipe_operators::testing::drain;
use rowpipe::rowpipe_operators::InMemoryBatchIterator;
use rowpipe::ProjectorFactory;
use test_data_gen::{random_measurements, seeded, shard_context};

const KINDS: [AggregateKind; 7] = [
    AggregateKind::Count,
    AggregateKind::CountStar,
    AggregateKind::Sum,
    AggregateKind::Avg,
    AggregateKind::Min,
    AggregateKind::Max,
    AggregateKind::Arbitrary,
];

async fn run(projection: Projection, rows: Vec<OwnedRow>) -> Vec<OwnedRow> {
    let ctx = shard_context();
    let projector = ProjectorFactory::new().create(&projection, &ctx).unwrap();
    drain(projector.apply(Box::new(InMemoryBatchIterator::batched(rows, 7))))
        .await
        .unwrap()
}

fn aggregation(inputs_from: usize, mode: AggregateMode) -> Projection {
    let aggregations = KINDS
        .iter()
        .enumerate()
        .map(|(i, &kind)| {
            let input = if mode == AggregateMode::PartialFinal {
                inputs_from + i
            } else {
                inputs_from
            };
            Aggregation::new(kind, vec![input])
        })
        .collect();
    AggregationProjection {
        aggregations,
        mode,
        granularity: RowGranularity::Node,
    }
    .into()
}

fn grouping(mode: AggregateMode) -> Projection {
    let aggregations = KINDS
        .iter()
        .enumerate()
        .map(|(i, &kind)| {
            let input = if mode == AggregateMode::PartialFinal { 1 + i } else { 1 };
            Aggregation::new(kind, vec![input])
        })
        .collect();
    GroupProjection {
        keys: vec![0],
        aggregations,
        mode,
        granularity: RowGranularity::Node,
    }
    .into()
}

/// Split into `k` contiguous partitions.
fn partitions(rows: &[OwnedRow], k: usize) -> Vec<Vec<OwnedRow>> {
    let chunk = rows.len().div_ceil(k).max(1);
    rows.chunks(chunk).map(|c| c.to_vec()).collect()
}

/// Arbitrary picks depend on arrival order; compare everything else.
fn without_arbitrary(row: &OwnedRow, arbitrary_at: usize) -> OwnedRow {
    let mut row = row.clone();
    row.remove(arbitrary_at);
    row
}

#[tokio::test]
async fn test_partial_final_merge_matches_single_pass_aggregation() {
    let mut rng = seeded(7);
    let rows = random_measurements(&mut rng, 500);
    let single = run(aggregation(1, AggregateMode::IterFinal), rows.clone()).await;
    assert_eq!(single.len(), 1);

    for k in [1, 2, 3, 8] {
        let mut partials = Vec::new();
        for part in partitions(&rows, k) {
            partials.extend(run(aggregation(1, AggregateMode::IterPartial), part).await);
        }
        let merged = run(aggregation(0, AggregateMode::PartialFinal), partials).await;
        assert_eq!(merged.len(), 1);
        assert_eq!(
            without_arbitrary(&merged[0], 6),
            without_arbitrary(&single[0], 6),
            "k={k}"
        );
        assert!(!merged[0][6].is_null());
    }
}

#[tokio::test]
async fn test_partial_final_merge_matches_single_pass_grouping() {
    let mut rng = seeded(11);
    let rows = random_measurements(&mut rng, 400);
    let by_key = |rows: Vec<OwnedRow>| -> HashMap<String, OwnedRow> {
        rows.into_iter()
            .map(|r| (r[0].to_string(), without_arbitrary(&r, 7)))
            .collect()
    };
    let single = by_key(run(grouping(AggregateMode::IterFinal), rows.clone()).await);

    for k in [2, 5] {
        let mut partials = Vec::new();
        for part in partitions(&rows, k) {
            partials.extend(run(grouping(AggregateMode::IterPartial), part).await);
        }
        let merged = by_key(run(grouping(AggregateMode::PartialFinal), partials).await);
        assert_eq!(merged, single, "k={k}");
    }
}

#[tokio::test]
async fn test_empty_input_aggregation_emits_one_row() {
    let out = run(aggregation(0, AggregateMode::IterFinal), Vec::new()).await;
    assert_eq!(
        out,
        vec![row![
            0i64,
            0i64,
            Scalar::Null,
            Scalar::Null,
            Scalar::Null,
            Scalar::Null,
            Scalar::Null
        ]]
    );
}

#[tokio::test]
async fn test_grouping_emits_one_row_per_key() {
    let rows = vec![row!["a", 1], row!["b", 2], row!["a", 3], row![Scalar::Null, 4], row![Scalar::Null, 5]];
    let projection: Projection = GroupProjection {
        keys: vec![0],
        aggregations: vec![Aggregation::new(AggregateKind::Sum, vec![1])],
        mode: AggregateMode::IterFinal,
        granularity: RowGranularity::Shard,
    }
    .into();
    let out = run(projection, rows).await;
    assert_eq!(out.len(), 3);
    assert!(out.contains(&row!["a", 4i64]));
    assert!(out.contains(&row!["b", 2i64]));
    assert!(out.contains(&row![Scalar::Null, 9i64]));
}
