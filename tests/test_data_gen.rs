//! Shared row generators for integration tests.
#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rowpipe::rowpipe_core::row;
use rowpipe::rowpipe_core::row::OwnedRow;
use rowpipe::rowpipe_core::types::Scalar;
use rowpipe::rowpipe_exec::ExecutionContext;
use rowpipe::rowpipe_core::projection::RowGranularity;

pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `[key, payload]` rows with duplicate keys and roughly 10% null keys.
pub fn random_rows(rng: &mut StdRng, n: usize, distinct_keys: i64) -> Vec<OwnedRow> {
    (0..n)
        .map(|i| {
            let key = if rng.gen_ratio(1, 10) {
                Scalar::Null
            } else {
                Scalar::I64(rng.gen_range(0..distinct_keys))
            };
            row![key, format!("payload-{i}")]
        })
        .collect()
}

/// `[group, value]` rows with a small key space and some null values.
pub fn random_measurements(rng: &mut StdRng, n: usize) -> Vec<OwnedRow> {
    (0..n)
        .map(|_| {
            let group = format!("g{}", rng.gen_range(0..5));
            let value = if rng.gen_ratio(1, 8) {
                Scalar::Null
            } else {
                Scalar::I64(rng.gen_range(-1_000..1_000))
            };
            row![group, value]
        })
        .collect()
}

pub fn shard_context() -> ExecutionContext {
    ExecutionContext::unbounded(RowGranularity::Shard)
}
