//! Exit code standardization for dasein-tests
//!
//! Provides consistent exit codes so CI jobs can tell a failing provider
//! apart from a broken harness setup.
//!
//! ## Exit Code Convention
//!
//! - `0` = Success (every selected test passed or was skipped)
//! - `1` = Test failure, or user error (invalid input, resource not found)
//! - `2` = System error (cloud provider failure, I/O)
//! - `3` = Configuration error (missing config, unknown provider, parse error)

use crate::error::DaseinError;

/// Standard exit codes for dasein-tests
pub mod codes {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// At least one test failed
    pub const TEST_FAILURE: i32 = 1;
    /// User error (invalid input, validation failure)
    pub const USER_ERROR: i32 = 1;
    /// System error (provider failure, I/O)
    pub const SYSTEM_ERROR: i32 = 2;
    /// Configuration error (missing config, unknown provider)
    pub const CONFIG_ERROR: i32 = 3;
}

/// Map a DaseinError to an appropriate exit code
pub fn exit_code_for_error(error: &DaseinError) -> i32 {
    use DaseinError::*;
    match error {
        // Configuration errors
        Config(_) | Toml(_) => codes::CONFIG_ERROR,

        // User errors (invalid input, validation failures)
        Validation { .. } => codes::USER_ERROR,
        ResourceNotFound { .. } => codes::USER_ERROR,
        Assertion(_) => codes::USER_ERROR,

        // Missing features are not the harness's fault
        Unsupported { .. } | NotSubscribed { .. } => codes::USER_ERROR,

        // System errors (cloud provider, I/O)
        CloudProvider { .. } => codes::SYSTEM_ERROR,
        Provisioning { .. } => codes::SYSTEM_ERROR,
        Timeout { .. } | TerminalState { .. } => codes::SYSTEM_ERROR,
        Io(_) => codes::SYSTEM_ERROR,
        Json(_) => codes::SYSTEM_ERROR,
    }
}

/// Exit code for a finished run
pub fn exit_code_for_run(success: bool) -> i32 {
    if success {
        codes::SUCCESS
    } else {
        codes::TEST_FAILURE
    }
}
