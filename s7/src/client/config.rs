use std::time::Duration;

use crate::constants::DEFAULT_PORT;
use crate::decode::DecodeLevel;

/// Settings applied when a [`Connection`](crate::client::Connection) is opened and used
///
/// ```
/// use std::time::Duration;
/// use s7::client::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .with_port(1102)
///     .with_response_timeout(Duration::from_millis(500));
/// assert_eq!(config.port, 1102);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// TCP port of the PLC
    pub port: u16,
    /// limit on opening the transport and completing the session setup
    pub connect_timeout: Duration,
    /// default per-request timeout, overridable per read
    pub response_timeout: Duration,
    /// capacity of the queue between callers and the session task
    pub max_queued_requests: usize,
    /// PDU length proposed during setup communication
    pub pdu_length: u16,
    /// parallel jobs proposed during setup communication
    pub max_amq: u16,
    /// wire logging
    pub decode: DecodeLevel,
}

impl ConnectionConfig {
    /// default connect timeout
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    /// default response timeout
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
    /// default request queue capacity
    pub const DEFAULT_MAX_QUEUED_REQUESTS: usize = 16;
    /// default proposed PDU length
    pub const DEFAULT_PDU_LENGTH: u16 = 480;
    /// default proposed parallel jobs
    pub const DEFAULT_MAX_AMQ: u16 = 8;

    /// change the TCP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// change the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// change the default response timeout
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// change the request queue capacity, at least 1
    pub fn with_max_queued_requests(mut self, max: usize) -> Self {
        self.max_queued_requests = max.max(1);
        self
    }

    /// change the proposed PDU length
    pub fn with_pdu_length(mut self, length: u16) -> Self {
        self.pdu_length = length;
        self
    }

    /// change the proposed number of parallel jobs, at least 1
    pub fn with_max_amq(mut self, max: u16) -> Self {
        self.max_amq = max.max(1);
        self
    }

    /// change the decode level
    pub fn with_decode_level(mut self, decode: DecodeLevel) -> Self {
        self.decode = decode;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
            max_queued_requests: Self::DEFAULT_MAX_QUEUED_REQUESTS,
            pdu_length: Self::DEFAULT_PDU_LENGTH,
            max_amq: Self::DEFAULT_MAX_AMQ,
            decode: DecodeLevel::nothing(),
        }
    }
}
