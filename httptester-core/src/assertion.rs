//! Result-checking macros for test code.
//!
//! They behave like their `assert*` counterparts from `pretty_assertions`, but
//! return an error from the enclosing function instead of panicking. That lets
//! a test returning `eyre::Result<()>` release its client through `?` and print
//! an `eyre` report.

/// Error produced by the checking macros.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Eq(String),
    #[error("{0}")]
    Ne(String),
    #[error("{0}")]
    Failed(String),
}

/// Fails when a boolean expression is false.
///
/// ```rust
/// use httptester_core::check;
///
/// fn status_is_ok(status: u16) -> eyre::Result<()> {
///     check!(status == 200, "unexpected status {status}");
///     Ok(())
/// }
///
/// assert!(status_is_ok(200).is_ok());
/// assert!(status_is_ok(404).is_err());
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        $crate::check!(@ $cond, "", "");
    };
    ($cond:expr, $($arg:tt)+) => {
        $crate::check!(@ $cond, ": ", $($arg)+);
    };
    (@ $cond:expr, $maybe_colon:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::eyre::bail!(
                "check failed: {}{}{}",
                stringify!($cond),
                $maybe_colon,
                format_args!($($arg)*)
            );
        }
    };
}

/// Fails with a colored diff when two expressions are not equal.
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr$(,)?) => ({
        $crate::check_eq!(@ $left, $right, "", "");
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        $crate::check_eq!(@ $left, $right, ": ", $($arg)+);
    });
    (@ $left:expr, $right:expr, $maybe_colon:expr, $($arg:tt)*) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    let __message = format!("check failed: `(left == right)`{}{}\
                       \n\
                       \n{}\
                       \n",
                       $maybe_colon,
                       format_args!($($arg)*),
                       $crate::pretty_assertions::Comparison::new(left_val, right_val)
                    );
                    Err($crate::assertion::Error::Eq(__message))?;
                }
            }
        }
    });
}

/// Fails when two expressions are equal.
#[macro_export]
macro_rules! check_ne {
    ($left:expr, $right:expr$(,)?) => ({
        $crate::check_ne!(@ $left, $right, "", "");
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        $crate::check_ne!(@ $left, $right, ": ", $($arg)+);
    });
    (@ $left:expr, $right:expr, $maybe_colon:expr, $($arg:tt)*) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if *left_val == *right_val {
                    let __message = format!("check failed: `(left != right)`{}{}\
                        \n\
                        \nBoth sides:\
                        \n{:#?}\
                        \n",
                        $maybe_colon,
                        format_args!($($arg)*),
                        left_val
                    );
                    Err($crate::assertion::Error::Ne(__message))?;
                }
            }
        }
    });
}

/// Fails unless every [`AssertResult`](crate::AssertResult) is true. The
/// error lists each false result on its own line, in collection order.
///
/// ```rust
/// use httptester_core::{check_all, http::Response, HttpTestAsserter, StatusCode};
/// use reqwest::header::HeaderMap;
///
/// fn verify(response: &Response) -> eyre::Result<()> {
///     let mut asserter = HttpTestAsserter::new(response);
///     asserter.status_code_equals(StatusCode::OK).body_is_empty();
///     check_all!(asserter.collect_results());
///     Ok(())
/// }
///
/// let response = Response::new(StatusCode::OK, HeaderMap::new(), "");
/// assert!(verify(&response).is_ok());
/// let response = Response::new(StatusCode::NOT_FOUND, HeaderMap::new(), "");
/// assert!(verify(&response).is_err());
/// ```
#[macro_export]
macro_rules! check_all {
    ($results:expr$(,)?) => ({
        let __failed: ::std::vec::Vec<::std::string::String> = ::std::iter::IntoIterator::into_iter($results)
            .filter(|r| !r.is_true)
            .map(|r| r.to_string())
            .collect();
        if !__failed.is_empty() {
            Err($crate::assertion::Error::Failed(format!(
                "{} check(s) failed:\n{}",
                __failed.len(),
                __failed.join("\n")
            )))?;
        }
    });
}
