#![allow(unused_macros)]

/// Helper macro for creating malformed data errors with source location information
///
/// ```rust, ignore
/// return Err(malformed_error!("Invalid stream count"));
/// return Err(malformed_error!("Table {} has too many rows - {}", id, rows));
/// ```
macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Helper macro for out of bounds errors
///
/// ```rust, ignore
/// if offset_end > self.data.len() {
///     return Err(out_of_bounds_error!());
/// }
/// ```
macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}
