use std::time::Duration;

use crate::{ping, query, McstatError, ServerStatus};

/// Default network timeout, applied to the full connect, send and receive
/// sequence of every protocol step.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_PORT: u16 = 25565;

/// Probe target configuration.
///
/// Carries everything one probe call needs; there is no ambient or global
/// configuration anywhere in the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conf {
    /// Server IP address or a domain name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Timeout bounding every connect, send and receive of one probe.
    pub timeout: Duration,
    /// Attach the raw request/response bytes to the returned status.
    pub debug: bool,
}

impl Conf {
    /// Create a probe configuration using the default port (25565).
    ///
    /// # Examples
    ///
    /// ```
    /// # use mcstat::{Conf, DEFAULT_TIMEOUT};
    /// #
    /// let conf = Conf::create("www.example.com");
    /// #
    /// # assert_eq!(conf.host, "www.example.com");
    /// # assert_eq!(conf.port, 25565);
    /// # assert_eq!(conf.timeout, DEFAULT_TIMEOUT);
    /// ```
    pub fn create(host: &str) -> Self {
        Self::create_with_port(host, DEFAULT_PORT)
    }

    /// Create a probe configuration using the specified port.
    ///
    /// # Example
    ///
    /// ```
    /// # use mcstat::Conf;
    /// #
    /// let conf = Conf::create_with_port("www.example.com", 25566);
    /// #
    /// # assert_eq!(conf.port, 25566);
    /// ```
    pub fn create_with_port(host: &str, port: u16) -> Self {
        Self {
            host: host.trim().into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }

    /// Create a probe configuration from a `host:port` string.
    ///
    /// # Example
    ///
    /// ```
    /// # use mcstat::{Conf, McstatError};
    /// #
    /// # fn main() -> Result<(), McstatError> {
    ///     let conf = Conf::create_from_str("www.example.com:25565")?;
    /// #
    /// #   assert_eq!(conf.host, "www.example.com");
    /// #   assert_eq!(conf.port, 25565);
    /// #
    /// #   assert!(Conf::create_from_str("25565").is_err());
    /// #   assert!(Conf::create_from_str("www.example.com:-1").is_err());
    /// #   Ok(())
    /// # }
    /// ```
    pub fn create_from_str(addr: &str) -> Result<Self, McstatError> {
        let addr_split = addr.split(':').map(|x| x.trim()).collect::<Vec<_>>();

        if addr_split.len() != 2 {
            return Err(McstatError::MalformedField(format!(
                "invalid socket address syntax: {}",
                addr
            )));
        }

        match addr_split[1].parse::<u16>() {
            Ok(port) => Ok(Self::create_with_port(addr_split[0], port)),
            Err(_) => Err(McstatError::MalformedField(format!(
                "invalid port: {}",
                addr_split[1]
            ))),
        }
    }

    /// Replace the default 5 second timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;

        self
    }

    /// Request raw request/response bytes on the returned status.
    pub fn with_debug(mut self) -> Self {
        self.debug = true;

        self
    }

    /// Ping using the pre-1.7 [Server List Ping](https://wiki.vg/Server_List_Ping#1.4_to_1.5)
    /// protocol.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcstat::{Conf, McstatError};
    ///
    /// fn main() -> Result<(), McstatError> {
    ///     let server = Conf::create("www.example.com");
    ///     let status = server.legacy_ping()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn legacy_ping(&self) -> Result<ServerStatus, McstatError> {
        ping::legacy::ping(self)
    }

    /// Ping using the 1.7+ [Server List Ping](https://wiki.vg/Server_List_Ping#Current_.281.7.2B.29)
    /// protocol.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcstat::{Conf, McstatError};
    ///
    /// fn main() -> Result<(), McstatError> {
    ///     let server = Conf::create("www.example.com");
    ///     let status = server.modern_ping()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn modern_ping(&self) -> Result<ServerStatus, McstatError> {
        ping::modern::ping(self)
    }

    /// Get **basic** info using the [Query](https://wiki.vg/Query) protocol.
    ///
    /// The server side must have the enable-query option switched on, see
    /// [Server Config](https://wiki.vg/Query#Server_Config).
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcstat::{Conf, McstatError};
    ///
    /// fn main() -> Result<(), McstatError> {
    ///     let server = Conf::create_with_port("www.example.com", 25565);
    ///     let status = server.query()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn query(&self) -> Result<ServerStatus, McstatError> {
        query::basic_query(self)
    }

    /// Get **full** info using the [Query](https://wiki.vg/Query) protocol,
    /// including the plugin and player lists.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcstat::{Conf, McstatError};
    ///
    /// fn main() -> Result<(), McstatError> {
    ///     let server = Conf::create_with_port("www.example.com", 25565);
    ///     let status = server.query_full()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn query_full(&self) -> Result<ServerStatus, McstatError> {
        query::full_query(self)
    }
}

impl std::fmt::Display for Conf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
