//! Call expectations scoped to a single test.
//!
//! Expectations are registered against a receiver/method pair, consumed by
//! [`MockController::record_call`], and checked by [`MockController::finish`]
//! once the test's lifecycle is over.

use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::FailureLog;
use crate::test::adapter::FailureRecord;

#[derive(Debug, Clone)]
struct Expectation {
    receiver: String,
    method: String,
    expected: u32,
    actual: u32,
    file: &'static str,
    line: u32,
}

impl Expectation {
    fn matches(&self, receiver: &str, method: &str) -> bool {
        self.receiver == receiver && self.method == method
    }
}

#[derive(Debug)]
pub struct MockController {
    failures: Arc<FailureLog>,
    expectations: Mutex<Vec<Expectation>>,
}

impl MockController {
    /// A controller that reports into `failures`.
    pub fn new(failures: Arc<FailureLog>) -> Self {
        Self {
            failures,
            expectations: Mutex::new(Vec::new()),
        }
    }

    /// Expect exactly one call of `receiver.method`.
    #[track_caller]
    pub fn expect_call(&self, receiver: &str, method: &str) {
        self.register(receiver, method, 1, Location::caller());
    }

    /// Expect exactly `times` calls of `receiver.method`.
    #[track_caller]
    pub fn expect_call_times(&self, receiver: &str, method: &str, times: u32) {
        self.register(receiver, method, times, Location::caller());
    }

    fn register(&self, receiver: &str, method: &str, times: u32, at: &'static Location<'static>) {
        self.lock().push(Expectation {
            receiver: receiver.to_string(),
            method: method.to_string(),
            expected: times,
            actual: 0,
            file: at.file(),
            line: at.line(),
        });
    }

    /// Note a call made by a mock object. Returns whether an expectation
    /// accepted it; an unexpected call is recorded as a failure at the caller.
    #[track_caller]
    pub fn record_call(&self, receiver: &str, method: &str) -> bool {
        let mut expectations = self.lock();
        let open = expectations
            .iter_mut()
            .find(|e| e.matches(receiver, method) && e.actual < e.expected);
        if let Some(expectation) = open {
            expectation.actual += 1;
            return true;
        }

        let total = expectations.iter().filter(|e| e.matches(receiver, method)).count();
        drop(expectations);

        let caller = Location::caller();
        let message = if total == 0 {
            format!("Unexpected call to {}.{}", receiver, method)
        } else {
            format!("Unexpected call to {}.{}: all expected calls already made", receiver, method)
        };
        self.failures.push(FailureRecord::new(caller.file(), caller.line(), message, None));
        false
    }

    /// Report every unmet expectation and clear the list.
    pub fn finish(&self) {
        let expectations = std::mem::take(&mut *self.lock());
        for e in expectations.into_iter().filter(|e| e.actual != e.expected) {
            let message = format!(
                "Unsatisfied expectation; expected {}.{} to be called {} times; called {} times.",
                e.receiver, e.method, e.expected, e.actual
            );
            self.failures.push(FailureRecord::new(e.file, e.line, message, None));
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|e| e.actual < e.expected).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Expectation>> {
        self.expectations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
