//! Diagnostics helpers for code that drives callables from UI or event loops.

mod churn;

pub use churn::{ChangeLimit, ChangeRateGuard};

use std::fmt::Display;

/// Logs the error side of a call result at `error` level and hands the result back.
///
/// Useful at the edge of an application that only wants to surface failures, e.g.
/// `log_call_error("createUser", caller.call::<CreateUser>(&input).await)`.
pub fn log_call_error<T, E: Display>(operation: &str, result: Result<T, E>) -> Result<T, E> {
    if let Err(error) = &result {
        log::error!("callable `{operation}` failed: {error}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_call_error_returns_result_untouched() {
        let ok: Result<u8, String> = Ok(1);
        assert_eq!(log_call_error("op", ok), Ok(1));

        let err: Result<u8, String> = Err("boom".into());
        assert_eq!(log_call_error("op", err), Err("boom".to_string()));
    }
}
