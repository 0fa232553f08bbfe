pub const DEFAULT_MANAGEMENT_PORT: u16 = 1099;
pub const DEFAULT_ADVERTISED_HOST: &str = "localhost";
pub const DEFAULT_SERVICE_NAME: &str = "jmxrmi";
pub const SERVICE_PROTOCOL: &str = "jmx";
pub const CONNECT_TIMEOUT_SECS: u64 = 5;
