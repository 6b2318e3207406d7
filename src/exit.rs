//! Process exit codes.
//!
//! Handlers report [`Status`]; [`map`] turns their result into a [`Report`], the only
//! thing `main` needs to set the exit status and print error text.

use std::fmt;

/// A process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub u8);

impl ExitCode {
    /// The run succeeded
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// The command line was incomplete or invalid
    pub const USAGE: ExitCode = ExitCode(2);
    /// The input lacks data the mode needs (`EX_DATAERR`)
    pub const DATA_ERROR: ExitCode = ExitCode(65);
    /// Any other failure (`EX_SOFTWARE`)
    pub const SOFTWARE: ExitCode = ExitCode(70);
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.0)
    }
}

/// Outcome of a mode handler that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Everything was written
    Success,
    /// A precondition on the input failed; nothing was written
    DataError(String),
}

/// What `main` reports for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Exit status
    pub code: ExitCode,
    /// Text for the error stream
    pub error: Option<String>,
}

impl Report {
    /// A report without error text.
    #[must_use]
    pub fn new(code: ExitCode) -> Self {
        Report { code, error: None }
    }
}

/// Map a handler result to a report.
#[must_use]
pub fn map(result: anyhow::Result<Status>) -> Report {
    match result {
        Ok(Status::Success) => Report::new(ExitCode::SUCCESS),
        Ok(Status::DataError(message)) => Report {
            code: ExitCode::DATA_ERROR,
            error: Some(message),
        },
        Err(error) => Report {
            code: ExitCode::SOFTWARE,
            error: Some(format!("{error:?}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn mapping() {
        assert_eq!(map(Ok(Status::Success)), Report::new(ExitCode::SUCCESS));

        let report = map(Ok(Status::DataError("no CodeView".into())));
        assert_eq!(report.code, ExitCode::DATA_ERROR);
        assert_eq!(report.error.as_deref(), Some("no CodeView"));

        let failure: anyhow::Result<Status> = Err(crate::Error::Empty).context("failed to load assembly: a.dll");
        let report = map(failure);
        assert_eq!(report.code, ExitCode::SOFTWARE);
        let text = report.error.unwrap();
        assert!(text.starts_with("failed to load assembly: a.dll"));
        assert!(text.contains("Provided input was empty"));
    }
}
