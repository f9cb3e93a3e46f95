
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use adapter::*;
use filter::TestFilter;
use output::Reporter;

use crate::config::{self, RunSettings};
use crate::context::TestInfo;
use crate::suite::{Hooks, MethodDescriptor, MethodOrderResolver, MethodTable, Suite};

/// A registered suite with its type erased.
trait SuiteEntry: Send + Sync {
    fn name(&self) -> &'static str;

    /// Filtered test methods in declaration order.
    fn planned(&self, runner: &Runner) -> Vec<MethodDescriptor>;

    /// Run the suite; `None` when no test qualified.
    fn run(&self, runner: &Runner) -> Option<SuiteReport>;
}

struct TypedSuite<S: Suite> {
    /// The registered instance; suite-wide hooks run on it.
    prototype: Mutex<S>,
    methods: MethodTable<S>,
    hooks: Hooks<S>,
}

impl<S: Suite> SuiteEntry for TypedSuite<S> {
    fn name(&self) -> &'static str {
        S::name()
    }

    fn planned(&self, runner: &Runner) -> Vec<MethodDescriptor> {
        let descriptor = runner.resolver.resolve(&self.methods);
        runner.filter.filter(&descriptor.name, &descriptor.methods)
    }

    fn run(&self, runner: &Runner) -> Option<SuiteReport> {
        let tests = self.planned(runner);
        if tests.is_empty() {
            tracing::debug!("No tests selected from {}, skipping suite", S::name());
            return None;
        }

        runner.reporter.suite_started(S::name());
        {
            let mut prototype = self.prototype.lock().unwrap_or_else(PoisonError::into_inner);
            engine::run_suite_hook(&mut *prototype, self.hooks.set_up_test_suite, "set_up_test_suite");
        }

        let outcomes = tests
            .iter()
            .map(|method| runner.run_test(S::name(), &method.name, &self.methods, &self.hooks))
            .collect();

        {
            let mut prototype = self.prototype.lock().unwrap_or_else(PoisonError::into_inner);
            engine::run_suite_hook(&mut *prototype, self.hooks.tear_down_test_suite, "tear_down_test_suite");
        }
        runner.reporter.suite_finished(S::name());

        Some(SuiteReport { name: S::name().to_string(), tests: outcomes })
    }
}

/// Collects suites and settings, then validates them into a [`Runner`].
pub struct RunnerBuilder {
    settings: RunSettings,
    suites: Vec<Box<dyn SuiteEntry>>,
    output: Option<Box<dyn Write + Send>>,
}

impl RunnerBuilder {
    /// Builder with default settings and stdout output.
    pub fn new() -> Self {
        Self::with_settings(RunSettings::default())
    }

    pub fn with_settings(settings: RunSettings) -> Self {
        Self { settings, suites: Vec::new(), output: None }
    }

    /// Builder with settings resolved for `project_root` (files, then environment).
    pub fn from_project(project_root: &Path) -> Self {
        Self::with_settings(config::resolve(Some(project_root)))
    }

    /// Send reporter output to `out` instead of stdout.
    pub fn output(mut self, out: impl Write + Send + 'static) -> Self {
        self.output = Some(Box::new(out));
        self
    }

    pub fn filter(mut self, pattern: &str) -> Self {
        self.settings.filter = pattern.to_string();
        self
    }

    /// Register a suite instance. Suites run in registration order.
    pub fn register<S: Suite>(mut self, instance: S) -> crate::Result<Self> {
        let methods = S::methods();
        if let Some(name) = methods.names().find(|name| filter::is_reserved(name)) {
            return Err(crate::Error::MalformedHook {
                suite: S::name().to_string(),
                name: name.to_string(),
            });
        }

        tracing::debug!("Registered suite {} with {} methods", S::name(), methods.len());
        self.suites.push(Box::new(TypedSuite {
            prototype: Mutex::new(instance),
            methods,
            hooks: S::hooks(),
        }));
        Ok(self)
    }

    pub fn build(self) -> crate::Result<Runner> {
        let filter = TestFilter::new(&self.settings.filter)?;
        let slow_threshold = Duration::from_millis(self.settings.slow_threshold_ms);
        let reporter = match self.output {
            Some(out) => Reporter::new(out, slow_threshold),
            None => Reporter::stdout(slow_threshold),
        };

        Ok(Runner {
            suites: self.suites,
            filter,
            resolver: MethodOrderResolver::new(self.settings.source_root.clone()),
            reporter,
            settings: self.settings,
            current: Mutex::new(None),
            summary: OnceLock::new(),
            failed: AtomicBool::new(false),
        })
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the registered suites and runs them, once.
pub struct Runner {
    suites: Vec<Box<dyn SuiteEntry>>,
    filter: TestFilter,
    resolver: MethodOrderResolver,
    reporter: Reporter,
    settings: RunSettings,
    current: Mutex<Option<Arc<TestInfo>>>,
    summary: OnceLock<RunSummary>,
    failed: AtomicBool,
}

/// Clears the current-test slot when dropped.
struct CurrentTest<'a> {
    slot: &'a Mutex<Option<Arc<TestInfo>>>,
}

impl Drop for CurrentTest<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Runner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    /// Run every registered suite. Only the first call runs anything;
    /// concurrent callers wait for it, later callers get the same summary.
    ///
    /// A panic from a suite-level hook propagates out of the first call, but
    /// the run still counts as done: the summary keeps the suites that
    /// finished before it, and later calls return that without running.
    pub fn run(&self) -> &RunSummary {
        let mut hook_panic = None;
        let summary = self.summary.get_or_init(|| {
            let mut suites = Vec::new();
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| self.execute(&mut suites)));
            let summary = RunSummary { suites };
            match outcome {
                Ok(()) => self.write_report(&summary),
                Err(payload) => hook_panic = Some(payload),
            }
            summary
        });
        if let Some(payload) = hook_panic {
            std::panic::resume_unwind(payload);
        }
        summary
    }

    /// Whether any test has recorded a failure so far.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// The summary, if the run has completed.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.get()
    }

    /// The test currently executing, if any.
    pub fn current_test(&self) -> Option<Arc<TestInfo>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// `Suite.method` names that a run would execute, in run order.
    pub fn planned_tests(&self) -> Vec<String> {
        self.suites
            .iter()
            .flat_map(|suite| {
                suite
                    .planned(self)
                    .into_iter()
                    .map(move |m| format!("{}.{}", suite.name(), m.name))
            })
            .collect()
    }

    fn execute(&self, reports: &mut Vec<SuiteReport>) {
        tracing::debug!("Running {} registered suites", self.suites.len());
        for suite in &self.suites {
            if let Some(report) = suite.run(self) {
                reports.push(report);
            }
        }
    }

    fn write_report(&self, summary: &RunSummary) {
        if let Some(path) = &self.settings.report_json_path {
            if let Err(e) = output::write_report(path, summary) {
                tracing::warn!("Failed to write run report to {}: {}", path.display(), e);
            }
        }
    }

    fn publish(&self, info: Arc<TestInfo>) -> CurrentTest<'_> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(info);
        CurrentTest { slot: &self.current }
    }

    fn run_test<S: Suite>(&self, suite: &str, method: &str, table: &MethodTable<S>, hooks: &Hooks<S>) -> TestOutcome {
        self.reporter.test_started(suite, method);
        let info = Arc::new(TestInfo::new(suite, method));
        let started = Instant::now();

        let (phases, failures) = {
            let _current = self.publish(Arc::clone(&info));
            let phases = engine::run_test(&info, table, hooks);
            (phases, info.failures())
        };

        let status = if failures.is_empty() {
            TestStatus::Pass
        } else {
            self.failed.store(true, Ordering::SeqCst);
            TestStatus::Fail
        };
        let outcome = TestOutcome {
            suite: suite.to_string(),
            method: method.to_string(),
            status,
            failures,
            duration: started.elapsed(),
            phases,
        };
        self.reporter.test_finished(&outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestResult;
    use crate::suite::SourcePosition;
    use super::output::MemoryOutput;

    #[derive(Default)]
    struct Ordered {
        suite_calls: u32,
    }

    impl Ordered {
        fn second(&mut self, _t: &TestInfo) -> TestResult {
            Ok(())
        }

        fn first(&mut self, t: &TestInfo) -> TestResult {
            crate::expect_eq!(t, 1, 2);
            Ok(())
        }

        fn count_suite(&mut self) {
            self.suite_calls += 1;
        }
    }

    impl Suite for Ordered {
        fn methods() -> MethodTable<Self> {
            MethodTable::new()
                .method_at("second", Ordered::second, SourcePosition::new(20, 5))
                .method_at("first", Ordered::first, SourcePosition::new(10, 5))
        }

        fn hooks() -> Hooks<Self> {
            Hooks::new().set_up_test_suite(Ordered::count_suite)
        }
    }

    #[derive(Default)]
    struct Reserved;

    impl Reserved {
        fn set_up(&mut self, _t: &TestInfo) -> TestResult {
            Ok(())
        }
    }

    impl Suite for Reserved {
        fn methods() -> MethodTable<Self> {
            MethodTable::new().method("set_up", Reserved::set_up)
        }
    }

    #[derive(Default)]
    struct FailingTearDown;

    impl FailingTearDown {
        fn only(&mut self, _t: &TestInfo) -> TestResult {
            Ok(())
        }

        fn explode(&mut self) {
            panic!("suite tear down failed");
        }
    }

    impl Suite for FailingTearDown {
        fn methods() -> MethodTable<Self> {
            MethodTable::new().method_at("only", FailingTearDown::only, SourcePosition::new(1, 1))
        }

        fn hooks() -> Hooks<Self> {
            Hooks::new().tear_down_test_suite(FailingTearDown::explode)
        }
    }

    fn runner(filter: &str) -> (MemoryOutput, Runner) {
        let out = MemoryOutput::new();
        let runner = RunnerBuilder::new()
            .filter(filter)
            .output(out.clone())
            .register(Ordered::default())
            .unwrap()
            .build()
            .unwrap();
        (out, runner)
    }

    #[test]
    fn test_run_in_declaration_order() {
        let (out, runner) = runner("");
        assert_eq!(runner.planned_tests(), vec!["Ordered.first", "Ordered.second"]);

        let summary = runner.run();
        assert_eq!(summary.failed_tests(), vec!["Ordered.first"]);
        assert!(runner.has_failed());
        assert!(runner.current_test().is_none());

        let text = out.contents();
        let first = text.find("[ RUN      ] Ordered.first").unwrap();
        let second = text.find("[ RUN      ] Ordered.second").unwrap();
        assert!(first < second);
        assert!(text.contains("[  FAILED  ] Ordered.first"));
        assert!(text.contains("[       OK ] Ordered.second"));
    }

    #[test]
    fn test_run_is_executed_once() {
        let (out, runner) = runner("");
        let first = runner.run() as *const RunSummary;
        let second = runner.run() as *const RunSummary;
        assert_eq!(first, second);
        assert_eq!(out.contents().matches("Running tests from Ordered").count(), 1);
        assert_eq!(runner.suites[0].name(), "Ordered");
    }

    #[test]
    fn test_hook_panic_still_completes_the_run() {
        let out = MemoryOutput::new();
        let runner = RunnerBuilder::new()
            .output(out.clone())
            .register(Ordered::default())
            .unwrap()
            .register(FailingTearDown)
            .unwrap()
            .build()
            .unwrap();

        let first = std::panic::catch_unwind(AssertUnwindSafe(|| {
            runner.run();
        }));
        assert!(first.is_err());
        assert!(runner.current_test().is_none());

        let summary = runner.summary().unwrap();
        assert_eq!(summary.suites.len(), 1);
        assert_eq!(summary.suites[0].name, "Ordered");

        let printed = out.contents();
        let second = runner.run();
        assert!(std::ptr::eq(second, summary));
        assert_eq!(out.contents(), printed);
        assert_eq!(printed.matches("[ RUN      ] FailingTearDown.only").count(), 1);
    }

    #[test]
    fn test_summary_absent_before_run() {
        let (_out, runner) = runner("");
        assert!(runner.summary().is_none());
        runner.run();
        assert_eq!(runner.summary().map(RunSummary::test_count), Some(2));
    }

    #[test]
    fn test_suite_without_selected_tests_is_silent() {
        let (out, runner) = runner("NoSuchSuite");
        let summary = runner.run();
        assert!(summary.suites.is_empty());
        assert!(summary.passed());
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_reserved_name_rejected_at_registration() {
        let err = RunnerBuilder::new().register(Reserved).err().unwrap();
        assert!(matches!(err, crate::Error::MalformedHook { ref name, .. } if name == "set_up"));
    }

    #[test]
    fn test_invalid_filter_rejected_at_build() {
        let result = RunnerBuilder::new().filter("(").register(Ordered::default()).unwrap().build();
        assert!(matches!(result, Err(crate::Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_json_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RunSettings {
            report_json_path: Some(dir.path().join("report.json")),
            ..RunSettings::default()
        };
        let runner = RunnerBuilder::with_settings(settings)
            .output(MemoryOutput::new())
            .register(Ordered::default())
            .unwrap()
            .build()
            .unwrap();
        runner.run();
        assert!(dir.path().join("report.json").exists());
    }
}
