//! Per-test run context handed to every lifecycle step.

use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::mock::MockController;
use crate::test::adapter::FailureRecord;

/// Marker for a test step that stopped early after recording its failure.
///
/// Returned through [`TestResult`] by `require_*!` and [`TestInfo::fail`], or
/// carried as a panic payload by [`TestInfo::abort`]. Either way the failure
/// is already on the test's list and the invoker adds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("test aborted after a recorded failure")]
pub struct TestAborted;

/// Result of a test method or per-test hook.
pub type TestResult = Result<(), TestAborted>;

/// Insertion-ordered, lock-guarded list of a test's failures.
#[derive(Debug, Default)]
pub struct FailureLog {
    records: Mutex<Vec<FailureRecord>>,
}

impl FailureLog {
    pub fn push(&self, record: FailureRecord) {
        self.lock().push(record);
    }

    pub fn snapshot(&self) -> Vec<FailureRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock leaves a valid Vec behind.
    fn lock(&self) -> MutexGuard<'_, Vec<FailureRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State of the test currently running: its failures and its mock controller.
#[derive(Debug)]
pub struct TestInfo {
    suite: String,
    method: String,
    failures: Arc<FailureLog>,
    mocks: Arc<MockController>,
}

impl TestInfo {
    pub fn new(suite: impl Into<String>, method: impl Into<String>) -> Self {
        let failures = Arc::new(FailureLog::default());
        let mocks = Arc::new(MockController::new(Arc::clone(&failures)));
        Self {
            suite: suite.into(),
            method: method.into(),
            failures,
            mocks,
        }
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.suite, self.method)
    }

    pub fn add_failure(&self, record: FailureRecord) {
        tracing::debug!("{}: failure at {}:{}", self.full_name(), record.file, record.line);
        self.failures.push(record);
    }

    /// Record a failure at an explicit location.
    pub fn report(&self, file: &str, line: u32, generated: impl Into<String>, note: Option<String>) {
        self.add_failure(FailureRecord::new(file, line, generated, note));
    }

    /// Record a failure at the caller; use as `return Err(t.fail(..))`.
    #[track_caller]
    pub fn fail(&self, message: impl Into<String>) -> TestAborted {
        let caller = Location::caller();
        self.report(caller.file(), caller.line(), message, None);
        TestAborted
    }

    /// Record a failure at the caller and unwind out of the current step.
    ///
    /// For helpers that cannot return [`TestResult`]. The unwind is absorbed
    /// by the invoker without adding a second record.
    #[track_caller]
    pub fn abort(&self, message: impl Into<String>) -> ! {
        let caller = Location::caller();
        self.report(caller.file(), caller.line(), message, None);
        std::panic::panic_any(TestAborted)
    }

    /// Failures recorded so far, in insertion order.
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures.snapshot()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure_log(&self) -> Arc<FailureLog> {
        Arc::clone(&self.failures)
    }

    pub fn mock_controller(&self) -> Arc<MockController> {
        Arc::clone(&self.mocks)
    }
}
