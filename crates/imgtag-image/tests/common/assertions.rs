//! Assertions for resolution results

use imgtag_core::{Error, ErrorKind};

/// Assert `result` failed with `kind` and its message contains `needle`
pub fn assert_error_kind<T: std::fmt::Debug>(
    result: Result<T, Error>,
    kind: ErrorKind,
    needle: &str,
) -> Error {
    let err = result.expect_err("resolution should have failed");
    assert_eq!(err.kind(), kind, "unexpected error: {}", err);
    assert!(
        err.to_string().contains(needle),
        "error {:?} does not contain {:?}",
        err.to_string(),
        needle
    );
    err
}
