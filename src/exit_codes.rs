//! Exit code standardization for ec2-replacement-sim
//!
//! ## Exit Code Convention
//!
//! - `0` = Success
//! - `1` = User error (no reference price for the replacement type)
//! - `2` = System error (AWS API failure, stalled pricing source, I/O)
//! - `3` = Configuration error (invalid pattern, missing replacement, bad config file)

use crate::error::SimError;

/// Standard exit codes
pub mod codes {
    /// Success
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    /// User error (input that cannot be priced)
    pub const USER_ERROR: i32 = 1;
    /// System error (AWS API failure, network error)
    pub const SYSTEM_ERROR: i32 = 2;
    /// Configuration error
    pub const CONFIG_ERROR: i32 = 3;
}

/// Map a SimError to an appropriate exit code
pub fn exit_code_for_error(error: &SimError) -> i32 {
    use SimError::*;
    match error {
        Config(_) => codes::CONFIG_ERROR,

        PriceNotFound { .. } => codes::USER_ERROR,

        StalledReadiness { .. } => codes::SYSTEM_ERROR,
        Pricing(_) => codes::SYSTEM_ERROR,
        Retryable { .. } => codes::SYSTEM_ERROR,
        Aws(_) => codes::SYSTEM_ERROR,
        Io(_) => codes::SYSTEM_ERROR,
        Json(_) => codes::SYSTEM_ERROR,
        Yaml(_) => codes::SYSTEM_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            exit_code_for_error(&SimError::Config(ConfigError::MissingField(
                "replacement".to_string()
            ))),
            codes::CONFIG_ERROR
        );
        assert_eq!(
            exit_code_for_error(&SimError::PriceNotFound {
                instance_type: "r5.xlarge".to_string()
            }),
            codes::USER_ERROR
        );
        assert_eq!(
            exit_code_for_error(&SimError::StalledReadiness { waited_secs: 300 }),
            codes::SYSTEM_ERROR
        );
    }
}
