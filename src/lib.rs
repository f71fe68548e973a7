//! # mdns
//!
//! An embeddable mDNS (Multicast DNS, RFC 6762) responder and resolver for
//! service-discovery agents.
//!
//! The connection serves A and SRV records from an in-memory catalog and
//! issues outbound queries with automatic retransmission. A records can be
//! *dynamic*: instead of a fixed address, each response carries the local
//! address of the interface used to reach the querier, so a host advertising
//! on several networks always answers with an address the querier can route
//! to.
//!
//! ## Responder
//!
//! ```rust,no_run
//! use mdns::{Config, DnsConn};
//!
//! # async fn run() -> mdns::Result<()> {
//! let conn = DnsConn::new_server(Config::default())?;
//! conn.add_a_record("printer.local", Some("10.0.0.5".parse().unwrap()), false)?;
//! conn.add_srv_record("_print._tcp.local", 0, 0, 631, "printer.local")?;
//!
//! // The packet engine runs until the socket fails or close() is called.
//! conn.start().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Resolver
//!
//! ```rust,no_run
//! use mdns::{Config, DnsConn, DnsType};
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> mdns::Result<()> {
//! let conn = DnsConn::new_server(Config::default())?;
//! let engine = conn.clone();
//! tokio::spawn(async move { engine.start().await });
//!
//! // Cancel the query by sending on (or dropping) cancel_tx.
//! let (cancel_tx, cancel_rx) = mpsc::channel(1);
//! let result = conn.query("printer.local", DnsType::A, cancel_rx).await?;
//! println!("answered by {} with {:?}", result.addr, result.answers);
//! # drop(cancel_tx);
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through the [`log`](https://docs.rs/log) facade; install
//! whatever logger the embedding application uses.

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub(crate) mod config;
pub(crate) mod conn;
pub(crate) mod error;
pub(crate) mod message;
pub(crate) mod records;
pub(crate) mod socket;

pub use config::{ARecordConfig, Config, SrvRecordConfig};
pub use conn::{DnsConn, MDNS_DEST_ADDR, MDNS_MULTICAST_IPV4, MDNS_PORT, QueryResult};
pub use error::{Error, Result};
pub use message::DnsType;
pub use records::{RData, ResourceRecord};
pub use socket::MulticastSocket;
