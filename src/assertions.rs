//! Assertion macros that record failures on the running test.
//!
//! `expect_*!` record a failure at the call site and let the step continue;
//! they evaluate to whether the check passed. `require_*!` additionally
//! return `Err(TestAborted)` from the enclosing step. Every macro accepts
//! trailing `format!` arguments, kept as the failure's note.

use std::fmt::Debug;

use crate::context::TestInfo;

#[doc(hidden)]
pub fn check(t: &TestInfo, file: &str, line: u32, passed: bool, generated: impl FnOnce() -> String, note: Option<String>) -> bool {
    if !passed {
        t.report(file, line, generated(), note);
    }
    passed
}

#[doc(hidden)]
pub fn check_eq<E, A>(t: &TestInfo, file: &str, line: u32, expected: &E, actual: &A, note: Option<String>) -> bool
where
    E: Debug + PartialEq<A> + ?Sized,
    A: Debug + ?Sized,
{
    check(t, file, line, expected == actual, || describe("", expected, actual), note)
}

#[doc(hidden)]
pub fn check_ne<E, A>(t: &TestInfo, file: &str, line: u32, unexpected: &E, actual: &A, note: Option<String>) -> bool
where
    E: Debug + PartialEq<A> + ?Sized,
    A: Debug + ?Sized,
{
    check(t, file, line, unexpected != actual, || describe("not ", unexpected, actual), note)
}

#[doc(hidden)]
#[derive(Debug, Clone, Copy)]
pub enum Bound {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Bound {
    fn prefix(self) -> &'static str {
        match self {
            Bound::Lt => "less than ",
            Bound::Le => "less than or equal to ",
            Bound::Gt => "greater than ",
            Bound::Ge => "greater than or equal to ",
        }
    }
}

/// Check `actual <op> bound`.
#[doc(hidden)]
pub fn check_bound<A, B>(t: &TestInfo, file: &str, line: u32, actual: &A, bound: &B, op: Bound, note: Option<String>) -> bool
where
    A: Debug + PartialOrd<B> + ?Sized,
    B: Debug + ?Sized,
{
    let passed = match op {
        Bound::Lt => actual < bound,
        Bound::Le => actual <= bound,
        Bound::Gt => actual > bound,
        Bound::Ge => actual >= bound,
    };
    check(t, file, line, passed, || describe(op.prefix(), bound, actual), note)
}

fn describe<E: Debug + ?Sized, A: Debug + ?Sized>(prefix: &str, expected: &E, actual: &A) -> String {
    format!("Expected: {}{:?}\nActual:   {:?}", prefix, expected, actual)
}

#[macro_export]
macro_rules! expect_that {
    ($t:expr, $cond:expr $(,)?) => {
        $crate::assertions::check(
            $t, file!(), line!(), $cond,
            || format!("Value of: {}\nExpected: true\nActual:   false", stringify!($cond)),
            None,
        )
    };
    ($t:expr, $cond:expr, $($note:tt)+) => {
        $crate::assertions::check(
            $t, file!(), line!(), $cond,
            || format!("Value of: {}\nExpected: true\nActual:   false", stringify!($cond)),
            Some(format!($($note)+)),
        )
    };
}

#[macro_export]
macro_rules! expect_eq {
    ($t:expr, $expected:expr, $actual:expr $(,)?) => {
        $crate::assertions::check_eq($t, file!(), line!(), &$expected, &$actual, None)
    };
    ($t:expr, $expected:expr, $actual:expr, $($note:tt)+) => {
        $crate::assertions::check_eq($t, file!(), line!(), &$expected, &$actual, Some(format!($($note)+)))
    };
}

#[macro_export]
macro_rules! expect_ne {
    ($t:expr, $unexpected:expr, $actual:expr $(,)?) => {
        $crate::assertions::check_ne($t, file!(), line!(), &$unexpected, &$actual, None)
    };
    ($t:expr, $unexpected:expr, $actual:expr, $($note:tt)+) => {
        $crate::assertions::check_ne($t, file!(), line!(), &$unexpected, &$actual, Some(format!($($note)+)))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __expect_bound {
    ($op:ident, $t:expr, $actual:expr, $bound:expr) => {
        $crate::assertions::check_bound(
            $t, file!(), line!(), &$actual, &$bound, $crate::assertions::Bound::$op, None,
        )
    };
    ($op:ident, $t:expr, $actual:expr, $bound:expr, $($note:tt)+) => {
        $crate::assertions::check_bound(
            $t, file!(), line!(), &$actual, &$bound, $crate::assertions::Bound::$op,
            Some(format!($($note)+)),
        )
    };
}

/// `expect_lt!(t, x, y)` checks `x < y`.
#[macro_export]
macro_rules! expect_lt {
    ($t:expr, $actual:expr, $bound:expr $(, $($note:tt)+)?) => {
        $crate::__expect_bound!(Lt, $t, $actual, $bound $(, $($note)+)?)
    };
}

#[macro_export]
macro_rules! expect_le {
    ($t:expr, $actual:expr, $bound:expr $(, $($note:tt)+)?) => {
        $crate::__expect_bound!(Le, $t, $actual, $bound $(, $($note)+)?)
    };
}

#[macro_export]
macro_rules! expect_gt {
    ($t:expr, $actual:expr, $bound:expr $(, $($note:tt)+)?) => {
        $crate::__expect_bound!(Gt, $t, $actual, $bound $(, $($note)+)?)
    };
}

#[macro_export]
macro_rules! expect_ge {
    ($t:expr, $actual:expr, $bound:expr $(, $($note:tt)+)?) => {
        $crate::__expect_bound!(Ge, $t, $actual, $bound $(, $($note)+)?)
    };
}

/// Like `expect_that!`, then returns `Err(TestAborted)` on failure.
#[macro_export]
macro_rules! require_that {
    ($t:expr, $($args:tt)+) => {
        if !$crate::expect_that!($t, $($args)+) {
            return ::std::result::Result::Err($crate::TestAborted);
        }
    };
}

/// Like `expect_eq!`, then returns `Err(TestAborted)` on failure.
#[macro_export]
macro_rules! require_eq {
    ($t:expr, $($args:tt)+) => {
        if !$crate::expect_eq!($t, $($args)+) {
            return ::std::result::Result::Err($crate::TestAborted);
        }
    };
}
