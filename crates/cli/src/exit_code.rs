// Consistent exit codes for the folio CLI.
//
//   0 = success
//   1 = general error
//   2 = usage/argument error (bad token, unknown command)

use folio_common::protocol::{CommandError, TokenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let usage = err.chain().any(|cause| {
            cause.downcast_ref::<TokenError>().is_some() || cause.downcast_ref::<CommandError>().is_some()
        });
        if usage || format!("{err}").starts_with("unknown command") {
            Self::Usage
        } else {
            Self::Error
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code() as u8)
    }
}
