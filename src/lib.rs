pub mod assertions;
pub mod config;
pub mod context;
pub mod error;
pub mod mock;
pub mod suite;
pub mod symbols;
pub mod test;

pub use config::RunSettings;
pub use context::{FailureLog, TestAborted, TestInfo, TestResult};
pub use error::{Error, Result};
pub use mock::MockController;
pub use suite::{
    Hooks, MethodDescriptor, MethodOrderResolver, MethodTable, SourcePosition, Suite, SuiteDescriptor, TestFn,
};
pub use test::adapter::{FailureRecord, RunSummary, SuiteReport, TestOutcome, TestPhase, TestStatus};
pub use test::output::{MemoryOutput, Reporter};
pub use test::{Runner, RunnerBuilder};
