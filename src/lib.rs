#![forbid(unsafe_code)]
//! rowpipe: projection execution engine.
//!
//! Facade over the workspace crates so integration tests, benches and
//! embedding services can depend on a single crate.

pub use rowpipe_core;
pub use rowpipe_exec;
pub use rowpipe_mem;
pub use rowpipe_operators;

pub use rowpipe_exec::{
    compose, CollectingConsumer, ExecError, ExecutionContext, KillSwitch, PipelineRunner,
    ProjectorFactory,
};
