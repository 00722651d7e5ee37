/*!
 * Driver Configuration
 *
 * Connection target, timeouts and decoder limits. Everything the driver
 * waits on or defaults to is carried here so tests can inject short
 * timeouts instead of relying on process-wide constants.
 */

use std::time::Duration;

/// Well-known RESP server port used when `open` is given port 0
pub const DEFAULT_PORT: u16 = 6379;

/// Host used when `open` is given an empty host
pub const DEFAULT_HOST: &str = "localhost";

/// Configuration for a single driver instance
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Host used by `Driver::open_default`
    pub host: String,

    /// Port used by `Driver::open_default`
    pub port: u16,

    /// How long `open` waits for the transport to reach the connected state
    pub connect_timeout: Duration,

    /// How long one wait-for-bytes call may go without receiving anything
    pub read_timeout: Duration,

    /// Upper bound on a single readiness wait inside the read/connect loops
    pub poll_interval: Duration,

    /// Maximum array nesting accepted by the decoder
    pub max_depth: usize,

    /// Reject integer lines with stray bytes instead of stopping at the first non-digit
    pub strict_integers: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_millis(5000),
            read_timeout: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(10),
            max_depth: 512,
            strict_integers: false,
        }
    }
}

impl DriverConfig {
    /// Create a new config builder
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }
}

/// Builder for `DriverConfig`
#[derive(Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// Set the default host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the default port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the readiness wait granularity
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the maximum array nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Enable or disable strict integer parsing
    pub fn strict_integers(mut self, strict: bool) -> Self {
        self.config.strict_integers = strict;
        self
    }

    pub fn build(self) -> DriverConfig {
        self.config
    }
}
