//! Internal helper macros.

/// Returns early with `$error` unless `$predicate` holds.
///
/// Like `assert!`, but for validation that should surface as an error instead of a panic.
///
/// ```ignore
/// ensure!(buffer_size > 0, TransferError::invalid_body("empty buffer"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
