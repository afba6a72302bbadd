//! Server configuration, timeouts and queue behaviour
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! # Examples
//!
//! ```
//! use handoff_web::config::{ServerConfig, WaitStrategy};
//! use std::time::Duration;
//!
//! let config = ServerConfig::from_toml_str(r#"
//!     port = 9000
//!     read_timeout_ms = 2500
//!     wait_strategy = "yield"
//! "#).unwrap();
//!
//! assert_eq!(config.port, 9000);
//! assert_eq!(config.read_timeout(), Duration::from_millis(2500));
//! assert!(matches!(config.wait_strategy(), WaitStrategy::Yield));
//! assert_eq!(config.min_header_read, 18);
//! ```

use serde::Deserialize;
use std::{fs, path::Path, time::Duration};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Listener, framing and hand-off settings.
///
/// # Connection management
/// ```text
///  [ Tcp accept ] ==> [ one task per connection ] ==> [ frame + parse ]
///                                                          ||
///              [ consumer ] <== [ poll (wait_strategy) ] <== [ queue ]
/// ```
///
/// The queue between the connection tasks and the consumer is unbounded.
/// A consumer that stops pulling makes it grow without limit; the server
/// only logs a warning once the depth reaches `queue_depth_warning`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the listener binds to (default: `127.0.0.1`).
    pub bind_address: String,

    /// Listen port (default: `8000`).
    pub port: u16,

    /// Delay between two empty polls of the context queue (default: `10`).
    pub poll_interval_ms: u64,

    /// How the consumer waits on an empty queue (default: `sleep`).
    pub wait_strategy: WaitMode,

    /// Timeout of each individual socket read while framing (default: `5000`).
    ///
    /// A connection that stalls longer than this between two reads is
    /// closed without a response.
    pub read_timeout_ms: u64,

    /// Timeout of each socket write (default: `5000`).
    pub write_timeout_ms: u64,

    /// Size of the first bulk read (default: `18`, the length of
    /// `GET / HTTP/1.1\r\n\r\n`).
    pub min_header_read: usize,

    /// Largest header block accepted before the connection is dropped
    /// (default: `65536`).
    pub max_header_size: usize,

    /// Queue depth at which enqueues start logging a capacity warning
    /// (default: `1024`).
    pub queue_depth_warning: usize,

    /// Format for canned error responses (default: `true`)
    ///
    /// # Examples
    /// If `true`, then on error the server will return:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// connection: close\r
    /// content-length: 66\r
    /// content-type: application/json\r
    /// \r
    /// {"error":"Malformed request line","code":"MALFORMED_REQUEST_LINE"}
    /// ```
    /// If `false`, the body is empty and `content-length` is `0`.
    pub json_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            poll_interval_ms: 10,
            wait_strategy: WaitMode::Sleep,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            min_header_read: 18,
            max_header_size: 64 * 1024,
            queue_depth_warning: 1024,
            json_errors: true,
        }
    }
}

impl ServerConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_header_read == 0 {
            return Err(ConfigError::Invalid("min_header_read must be > 0".into()));
        }
        if self.max_header_size < self.min_header_read {
            return Err(ConfigError::Invalid(format!(
                "max_header_size ({}) is smaller than min_header_read ({})",
                self.max_header_size, self.min_header_read
            )));
        }
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be > 0".into()));
        }
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_address is empty".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[inline]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    #[inline]
    pub fn wait_strategy(&self) -> WaitStrategy {
        match self.wait_strategy {
            WaitMode::Yield => WaitStrategy::Yield,
            WaitMode::Sleep => WaitStrategy::Sleep(Duration::from_millis(self.poll_interval_ms)),
        }
    }

    #[inline]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Serialized form of [`WaitStrategy`]; the interval comes from
/// `poll_interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMode {
    Sleep,
    Yield,
}

/// Strategy for the consumer waiting on an empty context queue
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`]
    ///
    /// # Note
    /// Keeps one core busy while the queue is empty.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`]
    ///
    /// ```
    /// # #[tokio::main]
    /// async fn main() {
    /// # let mut pool = vec![1, 2, 3];
    /// # let time = std::time::Duration::from_millis(10);
    /// #
    /// let value = loop {
    ///     if let Some(value) = pool.pop() {
    ///         break value;
    ///     }
    ///
    ///     tokio::time::sleep(time).await;
    /// };
    /// # }
    /// ```
    Sleep(Duration),
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Sleep(Duration::from_millis(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();

        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.read_timeout(), Duration::from_millis(5000));
        assert_eq!(config.min_header_read, 18);
        assert_eq!(config.listen_addr(), "127.0.0.1:8000");
        assert!(matches!(
            config.wait_strategy(),
            WaitStrategy::Sleep(d) if d == Duration::from_millis(10)
        ));
    }

    #[test]
    fn overrides() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind_address = "0.0.0.0"
            port = 8080
            poll_interval_ms = 25
            max_header_size = 1024
            json_errors = false
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.max_header_size, 1024);
        assert!(!config.json_errors);
        assert!(matches!(
            config.wait_strategy(),
            WaitStrategy::Sleep(d) if d == Duration::from_millis(25)
        ));
    }

    #[test]
    fn rejects_invalid() {
        #[rustfmt::skip]
        let cases = [
            "min_header_read = 0",
            "min_header_read = 64\nmax_header_size = 32",
            "read_timeout_ms = 0",
            "bind_address = \"  \"",
        ];

        for case in cases {
            assert!(
                matches!(ServerConfig::from_toml_str(case), Err(ConfigError::Invalid(_))),
                "{case}"
            );
        }

        assert!(matches!(
            ServerConfig::from_toml_str("port = \"eighty\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml_str("unknown_key = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
