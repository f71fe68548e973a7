//! Configuration for mDNS connections.
//!
//! [`Config`] is a plain value prepared by the embedding application (for
//! example from its own configuration loader). It carries the query
//! retransmission interval and the record set the connection starts with;
//! the core never reads files or the environment itself.
//!
//! ```rust
//! use mdns::Config;
//! use std::net::Ipv4Addr;
//! use std::time::Duration;
//!
//! let config = Config::default()
//!     .with_query_interval(Duration::from_secs(1))
//!     .with_a_record("printer.local", Some(Ipv4Addr::new(10, 0, 0, 5)), false)
//!     .with_srv_record("_print._tcp.local", 0, 0, 631, "printer.local");
//! ```

use std::net::Ipv4Addr;
use std::time::Duration;

/// Default interval between query retransmissions (2 seconds).
pub(crate) const DEFAULT_QUERY_INTERVAL: Duration = Duration::from_secs(2);

/// Size of the inbound datagram buffer; one datagram is read at a time.
pub(crate) const INBOUND_BUFFER_SIZE: usize = 512;

/// Maximum number of answer records processed per inbound message.
///
/// This bounds the work done on malformed or hostile packets.
pub(crate) const MAX_MESSAGE_RECORDS: usize = 3;

/// Maximum number of questions answered per inbound message, mirroring the
/// sender side, which never batches questions.
pub(crate) const MAX_QUERY_MESSAGE_RECORDS: usize = 1;

/// TTL (in seconds) carried by every record this responder emits.
pub(crate) const RESPONSE_TTL: u32 = 10;

/// An A record supplied via configuration.
#[derive(Debug, Clone)]
pub struct ARecordConfig {
    /// Owner name, with or without the trailing dot.
    pub name: String,
    /// Fixed address for a static record. Ignored when `dynamic` is set; a
    /// missing address also makes the record dynamic.
    pub addr: Option<Ipv4Addr>,
    /// Resolve the address per response from the querier's source address.
    pub dynamic: bool,
}

/// An SRV record supplied via configuration.
#[derive(Debug, Clone)]
pub struct SrvRecordConfig {
    /// Owner name, with or without the trailing dot.
    pub name: String,
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    /// Target host name. If the catalog also holds an A record under this
    /// name, SRV answers carry it along.
    pub target: String,
}

/// Configuration for an mDNS connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// How often an unanswered query is retransmitted. Zero selects the
    /// default (2 seconds).
    pub query_interval: Duration,

    /// A records the connection starts serving.
    pub a_records: Vec<ARecordConfig>,

    /// SRV records the connection starts serving.
    pub srv_records: Vec<SrvRecordConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_interval: DEFAULT_QUERY_INTERVAL,
            a_records: Vec::new(),
            srv_records: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the query retransmission interval.
    pub fn with_query_interval(mut self, interval: Duration) -> Self {
        self.query_interval = interval;
        self
    }

    /// Adds an initial A record. See [`DnsConn::add_a_record`] for the
    /// static/dynamic semantics.
    ///
    /// [`DnsConn::add_a_record`]: crate::DnsConn::add_a_record
    pub fn with_a_record(mut self, name: &str, addr: Option<Ipv4Addr>, dynamic: bool) -> Self {
        self.a_records.push(ARecordConfig {
            name: name.to_owned(),
            addr,
            dynamic,
        });
        self
    }

    /// Adds an initial SRV record.
    pub fn with_srv_record(
        mut self,
        name: &str,
        priority: u16,
        weight: u16,
        port: u16,
        target: &str,
    ) -> Self {
        self.srv_records.push(SrvRecordConfig {
            name: name.to_owned(),
            priority,
            weight,
            port,
            target: target.to_owned(),
        });
        self
    }
}
