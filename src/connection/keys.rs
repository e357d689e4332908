//! Connection-string key aliases
//!
//! Each list names the spellings drivers accept for one setting. Lookups try
//! them in order; setters write the first alias when none is present.

pub const SERVER: &[&str] = &["Server", "Data Source", "Host"];
pub const PORT: &[&str] = &["Port"];
pub const USER_NAME: &[&str] = &["User ID", "UID", "User", "Username"];
pub const PASSWORD: &[&str] = &["Password", "PWD"];
pub const DATABASE_NAME: &[&str] = &["Database", "Initial Catalog", "AttachDbFilename", "Data Source"];

// Optional parameters
pub const INTEGRATED_SECURITY: &[&str] = &["Integrated Security", "Trusted_Connection"];
pub const CONNECTION_TIMEOUT: &[&str] = &["Connection Timeout", "Timeout"];
pub const ENCRYPT: &[&str] = &["Encrypt"];
pub const TRUST_SERVER_CERTIFICATE: &[&str] = &["Trust Server Certificate", "TrustServerCertificate"];
pub const APPLICATION_NAME: &[&str] = &["Application Name"];
pub const POOLING: &[&str] = &["Pooling"];
pub const MIN_POOL_SIZE: &[&str] = &["Min Pool Size", "Minimum Pool Size"];
pub const MAX_POOL_SIZE: &[&str] = &["Max Pool Size", "Maximum Pool Size"];
pub const PERSIST_SECURITY_INFO: &[&str] = &["Persist Security Info"];
pub const MULTIPLE_ACTIVE_RESULT_SETS: &[&str] = &["Multiple Active Result Sets", "MARS"];
pub const CONNECTION_LIFETIME: &[&str] = &["Connection Lifetime"];

// PostgreSQL
pub const SSL_MODE: &[&str] = &["Ssl Mode", "SslMode"];
pub const COMMAND_TIMEOUT: &[&str] = &["Command Timeout", "CommandTimeout"];
pub const SEARCH_PATH: &[&str] = &["Search Path"];

// MySQL
pub const ALLOW_USER_VARIABLES: &[&str] = &["Allow User Variables"];
pub const USE_COMPRESSION: &[&str] = &["Use Compression"];

// Oracle
pub const SERVICE_NAME: &[&str] = &["Service Name", "SID"];

// SQLite
pub const DATA_SOURCE: &[&str] = &["Data Source"];
pub const VERSION: &[&str] = &["Version"];
pub const CACHE: &[&str] = &["Cache"];
pub const FAIL_IF_MISSING: &[&str] = &["FailIfMissing"];
pub const READ_ONLY: &[&str] = &["ReadOnly"];

/// Value written in place of a password when a connection string is displayed
pub const PASSWORD_MASK: &str = "********";
