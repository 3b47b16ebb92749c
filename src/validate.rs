//! Contract checks for programming errors
//!
//! Releasing a foreign or already released pointer, or rewinding a stack to a
//! marker it never produced, is a caller bug rather than a runtime condition.
//! These checks abort loudly in debug builds (or with the `validation`
//! feature) and compile away otherwise.

/// Whether contract checks are compiled in
pub const ENABLED: bool = cfg!(any(debug_assertions, feature = "validation"));

/// Panic with the given message when `cond` is false and checks are enabled
macro_rules! contract {
    ($cond:expr, $($arg:tt)+) => {
        if $crate::validate::ENABLED && !$cond {
            panic!("contract violation: {}", format_args!($($arg)+));
        }
    };
}

pub(crate) use contract;
