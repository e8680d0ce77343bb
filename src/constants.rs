//! # Constants
//!
//! Shared constants used throughout the rotator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Secrets Manager staging label for the live credential
pub const STAGE_CURRENT: &str = "AWSCURRENT";

/// Secrets Manager staging label for the credential under rotation
pub const STAGE_PENDING: &str = "AWSPENDING";

/// Secrets Manager staging label for the credential displaced by the last rotation
pub const STAGE_PREVIOUS: &str = "AWSPREVIOUS";

/// Default MySQL port when the payload does not carry one
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Default database connect timeout (seconds)
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Upper bound for the database connect timeout (seconds)
/// A step must never hold its execution slot on a stuck connect
pub const MAX_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default Secrets Manager connect and operation timeout (seconds)
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

/// Upper bound for the Secrets Manager timeout (seconds)
pub const MAX_STORE_TIMEOUT_SECS: u64 = 60;

/// Default generated password length
pub const DEFAULT_PASSWORD_LENGTH: usize = 24;

/// Minimum generated password length
pub const MIN_PASSWORD_LENGTH: usize = 20;

/// Maximum generated password length
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Symbols allowed in generated passwords, in addition to letters and digits.
/// None of them need escaping inside a MySQL string literal.
pub const PASSWORD_SYMBOLS: &str = "!@#%^&*-_";

/// Host part of the MySQL account whose password is rotated
pub const DEFAULT_DB_ACCOUNT_HOST: &str = "%";

/// Liveness query issued by `testSecret`
pub const LIVENESS_QUERY: &str = "SELECT 1";

/// Region used by the ad-hoc retrieval helper when none is configured
pub const DEFAULT_RETRIEVAL_REGION: &str = "ap-south-1";
