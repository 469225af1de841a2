// Application Constants
// Centralized constants to avoid magic numbers

/// Default server configuration
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 4500;

/// Database defaults
pub const DEFAULT_DATABASE_PORT: u16 = 1433;

/// Database connection pool defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 5;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;

/// Pagination defaults
pub const DEFAULT_PAGE_SIZE: i32 = 20;
pub const MAX_PAGE_SIZE: i32 = 100;

/// Pool monitoring interval
pub const POOL_MONITOR_INTERVAL_SECS: u64 = 60;
pub const POOL_HIGH_USAGE_THRESHOLD: f64 = 80.0;
pub const POOL_ELEVATED_USAGE_THRESHOLD: f64 = 70.0;

/// Ledger tables expected at startup
pub const LEDGER_TABLES: [&str; 4] = ["Pallets", "DiscountTasks", "Discounts", "Movements"];
