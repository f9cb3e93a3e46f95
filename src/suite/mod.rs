//! Suite model: the trait a test suite implements, its method table, and the
//! lifecycle hooks it opts into.
//!
//! A suite is any `Default + Send` type. Its test methods are plain inherent
//! methods with the [`TestFn`] shape, registered in a [`MethodTable`]:
//!
//! ```
//! use suiterun::{suite_methods, Hooks, MethodTable, Suite, TestInfo, TestResult};
//!
//! #[derive(Default)]
//! pub struct MathTest {
//!     base: i64,
//! }
//!
//! impl MathTest {
//!     pub fn set_up(&mut self, _t: &TestInfo) -> TestResult {
//!         self.base = 40;
//!         Ok(())
//!     }
//!
//!     pub fn addition(&mut self, t: &TestInfo) -> TestResult {
//!         suiterun::expect_eq!(t, 42, self.base + 2);
//!         Ok(())
//!     }
//! }
//!
//! impl Suite for MathTest {
//!     fn methods() -> MethodTable<Self> {
//!         suite_methods!(MathTest { addition })
//!     }
//!
//!     fn hooks() -> Hooks<Self> {
//!         Hooks::new().set_up(MathTest::set_up)
//!     }
//! }
//! ```

pub mod order;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::{TestInfo, TestResult};

pub use order::{order_methods, MethodOrderResolver};

/// Shape of a test method, `set_up`, and `tear_down`.
pub type TestFn<S> = fn(&mut S, &TestInfo) -> TestResult;

/// Shape of the suite-wide hooks.
pub type SuiteHookFn<S> = fn(&mut S);

/// A collection of test methods sharing optional setup and teardown.
pub trait Suite: Default + Send + 'static {
    /// Name shown in banners and matched by the test filter.
    fn name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// The registered test methods. Table order carries no meaning.
    fn methods() -> MethodTable<Self>;

    /// Lifecycle hooks this suite provides.
    fn hooks() -> Hooks<Self> {
        Hooks::new()
    }
}

/// Last path segment of a type name, without generic arguments.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Identifier of the suite type as written in `impl` headers.
pub(crate) fn type_ident<S: 'static>() -> &'static str {
    short_type_name(std::any::type_name::<S>())
}

/// 1-based position of a declaration in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A candidate test method as seen by the resolver and the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub position: Option<SourcePosition>,
    /// Declared `pub` (or registered without source information).
    pub exported: bool,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, position: Option<SourcePosition>, exported: bool) -> Self {
        Self {
            name: name.into(),
            position,
            exported,
        }
    }
}

/// A suite's resolved, declaration-ordered methods.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteDescriptor {
    pub name: String,
    pub type_name: String,
    pub methods: Vec<MethodDescriptor>,
}

pub(crate) struct MethodEntry<S> {
    pub(crate) func: TestFn<S>,
    pub(crate) position: Option<SourcePosition>,
}

/// Name-keyed table of a suite's test methods.
///
/// Iteration yields methods by name, never by declaration; the resolver
/// recovers declaration order from source positions.
pub struct MethodTable<S> {
    source_file: Option<&'static str>,
    entries: BTreeMap<String, MethodEntry<S>>,
}

impl<S> MethodTable<S> {
    /// A table with no declaring file; positions must be given explicitly.
    pub fn new() -> Self {
        Self {
            source_file: None,
            entries: BTreeMap::new(),
        }
    }

    /// A table whose methods are declared in `file` (as given by `file!()`).
    pub fn declared_in(file: &'static str) -> Self {
        Self {
            source_file: Some(file),
            entries: BTreeMap::new(),
        }
    }

    /// Register a method whose position is recovered from the declaring file.
    pub fn method(mut self, name: &str, func: TestFn<S>) -> Self {
        self.entries.insert(name.to_string(), MethodEntry { func, position: None });
        self
    }

    /// Register a method at a known declaration position.
    pub fn method_at(mut self, name: &str, func: TestFn<S>, position: SourcePosition) -> Self {
        self.entries.insert(name.to_string(), MethodEntry { func, position: Some(position) });
        self
    }

    pub fn source_file(&self) -> Option<&'static str> {
        self.source_file
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &MethodEntry<S>)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub(crate) fn get(&self, name: &str) -> Option<TestFn<S>> {
        self.entries.get(name).map(|entry| entry.func)
    }
}

impl<S> Default for MethodTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle hooks a suite opts into. Absent hooks are simply not run.
pub struct Hooks<S> {
    pub(crate) set_up_test_suite: Option<SuiteHookFn<S>>,
    pub(crate) tear_down_test_suite: Option<SuiteHookFn<S>>,
    pub(crate) set_up: Option<TestFn<S>>,
    pub(crate) tear_down: Option<TestFn<S>>,
}

impl<S> Hooks<S> {
    pub fn new() -> Self {
        Self {
            set_up_test_suite: None,
            tear_down_test_suite: None,
            set_up: None,
            tear_down: None,
        }
    }

    /// Runs once on the registered instance before the suite's first test.
    pub fn set_up_test_suite(mut self, hook: SuiteHookFn<S>) -> Self {
        self.set_up_test_suite = Some(hook);
        self
    }

    /// Runs once on the registered instance after the suite's last test.
    pub fn tear_down_test_suite(mut self, hook: SuiteHookFn<S>) -> Self {
        self.tear_down_test_suite = Some(hook);
        self
    }

    /// Runs on each fresh instance before the test method.
    pub fn set_up(mut self, hook: TestFn<S>) -> Self {
        self.set_up = Some(hook);
        self
    }

    /// Runs on each instance after the test method, even when earlier steps failed.
    pub fn tear_down(mut self, hook: TestFn<S>) -> Self {
        self.tear_down = Some(hook);
        self
    }
}

impl<S> Default for Hooks<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a [`MethodTable`] declared in the calling file.
///
/// ```ignore
/// suite_methods!(MathTest { addition, subtraction })
/// ```
#[macro_export]
macro_rules! suite_methods {
    ($suite:ty { $($method:ident),* $(,)? }) => {
        $crate::suite::MethodTable::<$suite>::declared_in(file!())
            $(.method(stringify!($method), <$suite>::$method))*
    };
}
