//! Circuit breaker and per-job accounting tests

mod test_data_gen;

use std::thread;

use rowpipe::rowpipe_core::config::EngineConfig;
use rowpipe::rowpipe_core::expr::Expr;
use rowpipe::rowpipe_core::id::JobId;
use rowpipe::rowpipe_core::projection::{OrderedTopNProjection, Projection, RowGranularity};
use rowpipe::rowpipe_mem::{CircuitBreaker, Error as MemError, RamAccounting};
use rowpipe::rowpipe_operators::testing::{range, CloseCounting};
use rowpipe::rowpipe_operators::{BatchIterator, InMemoryBatchIterator, OpError};
use rowpipe::{ExecError, ExecutionContext, PipelineRunner, ProjectorFactory};

fn job(breaker: &CircuitBreaker) -> RamAccounting {
    RamAccounting::new(JobId::random(), breaker.clone(), None)
}

#[test]
fn test_breaker_acquire_release() {
    let breaker = CircuitBreaker::new("query", 1024 * 1024);
    let ram = job(&breaker);
    assert_eq!(breaker.used_bytes(), 0);

    let mut scope = ram.scope("test");
    scope.add_bytes(100 * 1024).expect("Acquire failed");
    assert_eq!(breaker.used_bytes(), 100 * 1024);
    assert_eq!(scope.bytes(), 100 * 1024);

    drop(scope);
    assert_eq!(breaker.used_bytes(), 0);
}

#[test]
fn test_breaker_exhaustion() {
    let breaker = CircuitBreaker::new("query", 500 * 1024);
    let ram = job(&breaker);

    let mut first = ram.scope("test");
    first.add_bytes(400 * 1024).expect("First reserve failed");

    // 600KB > 500KB
    let mut second = ram.scope("test");
    let err = second.add_bytes(200 * 1024).unwrap_err();
    match err {
        MemError::CircuitBreaking {
            breaker: name,
            label,
            requested,
            limit,
            used,
        } => {
            assert_eq!(name, "query");
            assert_eq!(label, "test");
            assert_eq!(requested, 200 * 1024);
            assert_eq!(limit, 500 * 1024);
            assert_eq!(used, 400 * 1024);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(breaker.trip_count(), 1);
    assert_eq!(breaker.used_bytes(), 400 * 1024);
    assert_eq!(ram.total_bytes(), 400 * 1024);

    drop(first);
    second
        .add_bytes(200 * 1024)
        .expect("Reserve after release failed");
    assert_eq!(breaker.used_bytes(), 200 * 1024);
}

#[test]
fn test_breaker_concurrent_reservations_never_exceed_limit() {
    let breaker = CircuitBreaker::new("query", 10 * 1024);
    let mut handles = vec![];

    for _ in 0..10 {
        let breaker = breaker.clone();
        handles.push(thread::spawn(move || {
            let ram = job(&breaker);
            let mut scope = ram.scope("thread");
            let mut granted = 0;
            for _ in 0..10 {
                if scope.add_bytes(512).is_ok() {
                    assert!(breaker.used_bytes() <= 10 * 1024);
                    granted += 1;
                }
            }
            granted
        }));
    }

    let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    // every scope dropped by now
    assert_eq!(breaker.used_bytes(), 0);
    assert!(granted <= 100);
    assert!(breaker.peak_bytes() <= 10 * 1024);
}

#[test]
fn test_job_quota_trips_before_breaker() {
    let breaker = CircuitBreaker::new("query", 1024 * 1024);
    let ram = RamAccounting::new(JobId::random(), breaker.clone(), Some(1024));
    let mut scope = ram.scope("sort");

    scope.add_bytes(1000).unwrap();
    let err = scope.add_bytes(100).unwrap_err();
    assert!(matches!(err, MemError::QuotaExceeded { quota: 1024, .. }));
    assert_eq!(breaker.trip_count(), 0);

    drop(scope);
    assert_eq!(ram.total_bytes(), 0);
    assert_eq!(breaker.used_bytes(), 0);
}

fn sort_everything() -> Projection {
    OrderedTopNProjection {
        limit: None,
        offset: 0,
        outputs: Expr::identity(1),
        order_by: vec![0],
        reverse_flags: vec![true],
        nulls_first: vec![None],
    }
    .into()
}

#[tokio::test]
async fn test_sort_over_breaker_limit_fails_and_returns_to_baseline() {
    let config = EngineConfig {
        breaker_limit_bytes: 4 * 1024,
        ..EngineConfig::default()
    };
    let runner = PipelineRunner::new(config).unwrap();
    let ctx = runner.context(RowGranularity::Node);

    let (source, closes) = CloseCounting::new(runner.in_memory_source(range(0, 10_000)));
    let err = runner
        .run(&ctx, Box::new(source), &[sort_everything()])
        .await
        .unwrap_err();

    assert!(err.is_resource_exhaustion(), "{err}");
    assert!(matches!(
        err,
        ExecError::Operator(OpError::Memory(MemError::CircuitBreaking { .. }))
    ));
    assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(runner.breaker().used_bytes(), 0);
    assert_eq!(runner.breaker().trip_count(), 1);
    assert_eq!(ctx.ram_accounting().total_bytes(), 0);
}

#[test]
fn test_closing_mid_iteration_returns_accounting_to_baseline() {
    let breaker = CircuitBreaker::new("query", 1024 * 1024);
    let ctx = ExecutionContext::new(JobId::random(), breaker.clone(), None, RowGranularity::Shard);
    let projector = ProjectorFactory::new().create(&sort_everything(), &ctx).unwrap();
    let mut it = projector.apply(Box::new(InMemoryBatchIterator::new(range(0, 100))));

    assert!(it.move_next().unwrap());
    assert!(it.move_next().unwrap());
    assert!(breaker.used_bytes() > 0);

    it.close();
    it.close();
    assert_eq!(breaker.used_bytes(), 0);
    assert_eq!(ctx.ram_accounting().total_bytes(), 0);
    assert!(matches!(it.move_next(), Err(OpError::Closed)));
}
