//! Endpoint configuration.
//!
//! Both ends default to the reference deployment: the server listens on
//! every interface at port 1111 and ticks every 60 ms; viewers connect to
//! loopback. Values are normalised when applied so a zero backlog or a zero
//! tick cannot reach the socket or timer layers.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use crate::{
    codec::RecoveryPolicy,
    frame::{DEFAULT_MAX_FRAME_LENGTH, clamp_frame_length},
    server::BackoffConfig,
};

/// Port the server listens on by default.
pub const DEFAULT_PORT: u16 = 1111;

/// Minimum number of pending connections the listener queues.
pub const DEFAULT_BACKLOG: u32 = 10;

/// Default interval between produced frames.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(60);

/// Default bound on a single socket write before the peer counts as stalled.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Address viewers connect to by default.
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Server-side settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use framecast::config::ServerConfig;
///
/// let config = ServerConfig::default()
///     .tick_interval(Duration::ZERO)
///     .backlog(0);
/// assert_eq!(config.tick_interval_value(), Duration::from_millis(1));
/// assert_eq!(config.backlog_value(), 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    bind_addr: SocketAddr,
    backlog: u32,
    tick_interval: Duration,
    max_frame_length: usize,
    send_timeout: Option<Duration>,
    backoff: BackoffConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            backlog: DEFAULT_BACKLOG,
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            send_timeout: Some(DEFAULT_SEND_TIMEOUT),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Address the listener binds to.
    #[must_use]
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Listen backlog; values below one are raised to one.
    #[must_use]
    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog.max(1);
        self
    }

    /// Interval between produced frames; at least one millisecond.
    #[must_use]
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Largest frame the server will broadcast.
    #[must_use]
    pub fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = clamp_frame_length(len);
        self
    }

    /// Per-connection write deadline; `None` waits indefinitely.
    #[must_use]
    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Back-off applied after accept failures.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff.normalized();
        self
    }

    /// Configured bind address.
    #[must_use]
    pub fn bind_addr_value(&self) -> SocketAddr { self.bind_addr }

    /// Configured listen backlog.
    #[must_use]
    pub fn backlog_value(&self) -> u32 { self.backlog }

    /// Configured tick interval.
    #[must_use]
    pub fn tick_interval_value(&self) -> Duration { self.tick_interval }

    /// Configured frame bound.
    #[must_use]
    pub fn max_frame_length_value(&self) -> usize { self.max_frame_length }

    /// Configured write deadline.
    #[must_use]
    pub fn send_timeout_value(&self) -> Option<Duration> { self.send_timeout }

    /// Configured accept back-off.
    #[must_use]
    pub fn backoff_value(&self) -> BackoffConfig { self.backoff }
}

/// Viewer-side settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    server_addr: SocketAddr,
    max_frame_length: usize,
    recovery: RecoveryPolicy,
    read_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::new(DEFAULT_HOST, DEFAULT_PORT),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            recovery: RecoveryPolicy::default(),
            read_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Address of the frame server.
    #[must_use]
    pub fn server_addr(mut self, addr: SocketAddr) -> Self {
        self.server_addr = addr;
        self
    }

    /// Largest frame the viewer will buffer.
    #[must_use]
    pub fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = clamp_frame_length(len);
        self
    }

    /// Policy for frames declaring more than the bound.
    #[must_use]
    pub fn recovery_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.recovery = policy;
        self
    }

    /// Longest wait for the next chunk before the session is abandoned.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Configured server address.
    #[must_use]
    pub fn server_addr_value(&self) -> SocketAddr { self.server_addr }

    /// Configured frame bound.
    #[must_use]
    pub fn max_frame_length_value(&self) -> usize { self.max_frame_length }

    /// Configured recovery policy.
    #[must_use]
    pub fn recovery_policy_value(&self) -> RecoveryPolicy { self.recovery }

    /// Configured read timeout.
    #[must_use]
    pub fn read_timeout_value(&self) -> Option<Duration> { self.read_timeout }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults_match_reference_deployment() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr_value().port(), 1111);
        assert!(config.bind_addr_value().ip().is_unspecified());
        assert!(config.backlog_value() >= 10);
        assert_eq!(config.tick_interval_value(), Duration::from_millis(60));
        assert_eq!(config.max_frame_length_value(), 1024 * 1024);
        assert_eq!(config.send_timeout_value(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn client_defaults_target_loopback() {
        let config = ClientConfig::default();
        assert_eq!(
            config.server_addr_value(),
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 1111)
        );
        assert_eq!(config.read_timeout_value(), None);
        assert_eq!(config.recovery_policy_value(), RecoveryPolicy::Drop);
    }

    #[test]
    fn server_backoff_is_normalised() {
        let config = ServerConfig::default().backoff(BackoffConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::ZERO,
        });
        let backoff = config.backoff_value();
        assert!(backoff.initial_delay <= backoff.max_delay);
    }
}
