
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc, watch};

use crate::config::{
    Config, DEFAULT_QUERY_INTERVAL, INBOUND_BUFFER_SIZE, MAX_MESSAGE_RECORDS,
    MAX_QUERY_MESSAGE_RECORDS,
};
use crate::error::{Error, Result};
use crate::message::header::Header;
use crate::message::name::Name;
use crate::message::parser::Parser;
use crate::message::question::Question;
use crate::message::resource::a::AResource;
use crate::message::resource::srv::SrvResource;
use crate::message::resource::{Resource, ResourceBody, ResourceHeader};
use crate::message::{DNSCLASS_INET, DnsType, HEADER_LEN, Message, RCode};
use crate::records::{RData, RecordStore, ResourceRecord, canonical_name};
use crate::socket::MulticastSocket;

/// The mDNS multicast group address (224.0.0.251).
pub const MDNS_MULTICAST_IPV4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// The standard mDNS port (5353).
pub const MDNS_PORT: u16 = 5353;

/// The destination every mDNS query and response is sent to
/// (224.0.0.251:5353).
pub const MDNS_DEST_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(MDNS_MULTICAST_IPV4), MDNS_PORT);

type QueryId = u64;

// An outstanding outbound query. The sink accepts exactly one answer set;
// the engine removes the entry upon delivery.
struct Query {
    id: QueryId,
    name_with_suffix: String,
    typ: DnsType,
    query_result_chan: mpsc::Sender<QueryResult>,
}

/// The answer set delivered for one outbound query.
#[derive(Debug)]
pub struct QueryResult {
    /// Every A/SRV record carried by the matching response message.
    pub answers: Vec<ResourceRecord>,
    /// The peer that sent the response.
    pub addr: SocketAddr,
}

/// An mDNS connection: a responder answering questions for the local record
/// catalog, and a resolver issuing queries with retransmission.
///
/// `DnsConn` is a cheap handle; clones share the socket, the record catalog,
/// and the query registry. Create one with [`DnsConn::new_server`] (or
/// [`DnsConn::server`] over a prepared socket), then run the packet engine
/// with [`DnsConn::start`]:
///
/// ```rust,no_run
/// use mdns::{Config, DnsConn};
///
/// # async fn run() -> mdns::Result<()> {
/// let conn = DnsConn::new_server(Config::default())?;
/// conn.add_a_record("myhost.local", None, true)?;
///
/// let engine = conn.clone();
/// tokio::spawn(async move { engine.start().await });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DnsConn {
    socket: Arc<UdpSocket>,
    dst_addr: SocketAddr,
    query_interval: Duration,
    records: RecordStore,
    queries: Arc<Mutex<Vec<Query>>>,
    next_query_id: Arc<AtomicU64>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    is_closed: Arc<AtomicBool>,
    dropped_packets: Arc<AtomicU64>,
}

impl DnsConn {
    /// Establishes an mDNS connection over a socket that is already bound and
    /// joined to the multicast group. The socket must be non-blocking.
    ///
    /// The record catalog is seeded from the configuration; a zero query
    /// interval selects the default.
    pub fn server(socket: std::net::UdpSocket, config: Config) -> Result<Self> {
        Self::server_with_dest(socket, config, MDNS_DEST_ADDR)
    }

    /// Convenience constructor: binds the published mDNS endpoint, joins the
    /// multicast group on every interface, and builds the connection.
    pub fn new_server(config: Config) -> Result<Self> {
        let socket = MulticastSocket::new().into_std()?;
        Self::server(socket, config)
    }

    pub(crate) fn server_with_dest(
        socket: std::net::UdpSocket,
        config: Config,
        dst_addr: SocketAddr,
    ) -> Result<Self> {
        let socket = UdpSocket::from_std(socket)?;

        let query_interval = if config.query_interval == Duration::ZERO {
            DEFAULT_QUERY_INTERVAL
        } else {
            config.query_interval
        };

        let records = RecordStore::default();
        for rec in &config.a_records {
            records.add_a(&rec.name, rec.addr, rec.dynamic)?;
        }
        for rec in &config.srv_records {
            records.add_srv(&rec.name, rec.priority, rec.weight, rec.port, &rec.target)?;
        }

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            socket: Arc::new(socket),
            dst_addr,
            query_interval,
            records,
            queries: Arc::new(Mutex::new(Vec::new())),
            next_query_id: Arc::new(AtomicU64::new(1)),
            shutdown_tx: Arc::new(shutdown_tx),
            is_closed: Arc::new(AtomicBool::new(false)),
            dropped_packets: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Runs the packet engine on the current task, blocking until the socket
    /// fails or the connection is closed. On exit the shutdown signal is
    /// broadcast and every pending query is woken.
    pub async fn start(&self) {
        log::info!("mDNS server starting");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return;
        }

        let mut b = vec![0u8; INBOUND_BUFFER_SIZE];
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                result = self.socket.recv_from(&mut b) => {
                    match result {
                        Ok((n, src)) => self.handle_packet(&b[..n], src).await,
                        Err(err) => {
                            log::warn!("mDNS socket read failed: {err}");
                            break;
                        }
                    }
                }
            }
        }

        self.is_closed.store(true, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);
        log::info!("mDNS server stopped");
    }

    /// Closes the connection. The packet engine exits, pending queries return
    /// [`Error::ErrConnectionClosed`], and further mutations are rejected.
    ///
    /// A second close returns [`Error::ErrConnectionClosed`].
    pub fn close(&self) -> Result<()> {
        if self.is_closed.swap(true, Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }
        self.shutdown_tx.send_replace(true);
        log::info!("mDNS server closing");
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called or the engine has
    /// exited.
    pub fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::SeqCst)
    }

    /// Number of inbound datagrams dropped by the header sanity check, parse
    /// failures, or the protocol gates.
    pub fn dropped_packet_count(&self) -> u64 {
        self.dropped_packets.load(Ordering::Relaxed)
    }

    /// Adds an A record for `name`.
    ///
    /// With `dynamic` set the record has no fixed address; each response
    /// carries the local address of the interface used to reach the querier.
    /// Passing `dynamic = false` without an address also creates a dynamic
    /// record.
    pub fn add_a_record(&self, name: &str, addr: Option<Ipv4Addr>, dynamic: bool) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ErrConnectionClosed);
        }
        self.records.add_a(name, addr, dynamic)
    }

    /// Adds an SRV record for `name` pointing at `target`.
    pub fn add_srv_record(
        &self,
        name: &str,
        priority: u16,
        weight: u16,
        port: u16,
        target: &str,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ErrConnectionClosed);
        }
        self.records.add_srv(name, priority, weight, port, target)
    }

    /// Removes the A record under `name`.
    pub fn remove_a_record(&self, name: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ErrConnectionClosed);
        }
        self.records.remove_a(name)
    }

    /// Removes the SRV record under `name`.
    pub fn remove_srv_record(&self, name: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ErrConnectionClosed);
        }
        self.records.remove_srv(name)
    }

    /// Sends mDNS queries for `name` until a matching answer arrives, the
    /// caller's cancellation signal fires, or the connection closes.
    ///
    /// The question is transmitted immediately and retransmitted every query
    /// interval. `cancel_rx` is the caller-supplied cancellation signal:
    /// sending `()` or dropping the sender cancels the query with
    /// [`Error::ErrContextElapsed`].
    pub async fn query(
        &self,
        name: &str,
        typ: DnsType,
        mut cancel_rx: mpsc::Receiver<()>,
    ) -> Result<QueryResult> {
        if self.is_closed() {
            return Err(Error::ErrConnectionClosed);
        }

        let name_with_suffix = canonical_name(name);
        let (id, mut result_rx) = self.register_query(&name_with_suffix, typ).await?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            self.unregister_query(id).await;
            return Err(Error::ErrConnectionClosed);
        }

        // The first tick completes immediately and transmits the initial
        // question; later ticks are retransmissions. The ticker is dropped on
        // every exit path.
        let mut ticker = tokio::time::interval(self.query_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.send_question(&name_with_suffix, typ).await;
                }
                res = result_rx.recv() => {
                    return res.ok_or(Error::ErrConnectionClosed);
                }
                _ = cancel_rx.recv() => {
                    self.unregister_query(id).await;
                    return Err(Error::ErrContextElapsed);
                }
                _ = shutdown_rx.changed() => {
                    self.unregister_query(id).await;
                    return Err(Error::ErrConnectionClosed);
                }
            }
        }
    }

    /// Variant of [`query`](Self::query) that drives the same state machine
    /// in a background task and surfaces the result via a channel.
    ///
    /// The channel holds at most one result. It closes without a value when
    /// the query is cancelled, the connection shuts down, or the result was
    /// already taken.
    pub fn query_nonblocking(
        &self,
        name: &str,
        typ: DnsType,
        cancel_rx: mpsc::Receiver<()>,
    ) -> mpsc::Receiver<QueryResult> {
        let (result_tx, result_rx) = mpsc::channel(1);
        let conn = self.clone();
        let name = name.to_owned();
        tokio::spawn(async move {
            match conn.query(&name, typ, cancel_rx).await {
                Ok(res) => {
                    let _ = result_tx.try_send(res);
                }
                Err(err) => {
                    log::debug!("mDNS query for {name} ended without an answer: {err}");
                }
            }
        });
        result_rx
    }

    async fn register_query(
        &self,
        name_with_suffix: &str,
        typ: DnsType,
    ) -> Result<(QueryId, mpsc::Receiver<QueryResult>)> {
        // Capacity 1: the engine delivers with a non-blocking send, so the
        // sink must be able to hold the answer until the waiter wakes.
        let (tx, rx) = mpsc::channel(1);
        let id = self.next_query_id.fetch_add(1, Ordering::Relaxed);

        let mut queries = self.queries.lock().await;
        if self.is_closed() {
            return Err(Error::ErrConnectionClosed);
        }
        queries.push(Query {
            id,
            name_with_suffix: name_with_suffix.to_owned(),
            typ,
            query_result_chan: tx,
        });
        Ok((id, rx))
    }

    async fn unregister_query(&self, id: QueryId) {
        let mut queries = self.queries.lock().await;
        queries.retain(|q| q.id != id);
    }

    async fn handle_packet(&self, b: &[u8], src: SocketAddr) {
        if b.len() < HEADER_LEN {
            log::debug!("mDNS packet from {src} is shorter than the DNS header");
            self.dropped_packets.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut p = Parser::default();
        let header = match p.start(b) {
            Ok(header) => header,
            Err(err) => {
                log::warn!("failed to parse mDNS packet from {src}: {err}");
                self.dropped_packets.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        // RFC 6762 section 18: messages with a non-zero OPCODE or RCODE are
        // silently ignored. Truncated messages would need known-answer
        // continuation, which this responder does not implement.
        if header.op_code != 0 || header.rcode != RCode::Success || header.truncated {
            log::debug!(
                "dropping mDNS packet from {src} (opcode: {}, rcode: {}, tc: {})",
                header.op_code,
                header.rcode,
                header.truncated
            );
            self.dropped_packets.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if self.handle_questions(&mut p, src).await {
            self.handle_answers(&mut p, src).await;
        }
    }

    // handle_questions answers the questions the catalog can serve. Returns
    // false if the packet should not be processed further.
    async fn handle_questions(&self, p: &mut Parser<'_>, src: SocketAddr) -> bool {
        for _ in 0..MAX_QUERY_MESSAGE_RECORDS {
            let q = match p.question() {
                Ok(q) => q,
                Err(Error::ErrSectionDone) => break,
                Err(err) => {
                    log::debug!("failed to parse mDNS question: {err}");
                    return false;
                }
            };
            log::debug!("mDNS question from {src}: {} {}", q.name, q.typ);

            let answers = match self.records.lookup(&q.name.data, q.typ, src) {
                Ok(answers) => answers,
                Err(err) => {
                    log::debug!("lookup for {} failed: {err}", q.name);
                    continue;
                }
            };
            if answers.is_empty() {
                // Not our name; silently decline.
                continue;
            }
            self.send_answer(&answers).await;
        }

        p.skip_all_questions().is_ok()
    }

    // handle_answers matches inbound answers against the query registry and
    // delivers the answer section to every matched sink.
    async fn handle_answers(&self, p: &mut Parser<'_>, src: SocketAddr) {
        let mut answers: Vec<ResourceRecord> = Vec::new();
        for _ in 0..MAX_MESSAGE_RECORDS {
            let header = match p.answer_header() {
                Ok(header) => header,
                Err(Error::ErrSectionDone) => break,
                Err(err) => {
                    log::debug!("failed to parse mDNS answer: {err}");
                    return;
                }
            };

            if header.typ != DnsType::A && header.typ != DnsType::Srv {
                if p.skip_answer().is_err() {
                    return;
                }
                continue;
            }

            match p.answer() {
                Ok(resource) => {
                    if let Some(rec) = resource_record_from(&resource) {
                        answers.push(rec);
                    }
                }
                Err(err) => {
                    log::debug!("failed to parse mDNS answer body: {err}");
                    return;
                }
            }
        }
        if answers.is_empty() {
            return;
        }

        // First match wins: the entry is gone before anything else can see
        // the answer, and the bounded sink is sent without blocking so a slow
        // waiter cannot stall the engine.
        let mut queries = self.queries.lock().await;
        for answer in &answers {
            let answer_name = canonical_name(&answer.name);
            let answer_type = answer.dns_type();
            queries.retain(|q| {
                if q.name_with_suffix == answer_name && q.typ == answer_type {
                    log::debug!("answer for {answer_name} matched a pending query");
                    let _ = q.query_result_chan.try_send(QueryResult {
                        answers: answers.clone(),
                        addr: src,
                    });
                    false
                } else {
                    true
                }
            });
        }
    }

    async fn send_question(&self, name: &str, typ: DnsType) {
        let packed_name = match Name::new(name) {
            Ok(packed_name) => packed_name,
            Err(err) => {
                log::warn!("failed to construct mDNS packet: {err}");
                return;
            }
        };

        // mDNS ignores message IDs; the header carries only the RD bit.
        let mut msg = Message {
            header: Header {
                recursion_desired: true,
                ..Default::default()
            },
            questions: vec![Question {
                typ,
                class: DNSCLASS_INET,
                name: packed_name,
            }],
            answers: vec![],
        };

        let raw_query = match msg.pack() {
            Ok(raw_query) => raw_query,
            Err(err) => {
                log::warn!("failed to construct mDNS packet: {err}");
                return;
            }
        };

        if let Err(err) = self.socket.send_to(&raw_query, self.dst_addr).await {
            log::warn!("failed to send mDNS packet: {err}");
        }
    }

    async fn send_answer(&self, answers: &[ResourceRecord]) {
        // Answers only; an mDNS response never echoes the question back.
        let mut msg = Message {
            header: Header {
                response: true,
                authoritative: true,
                ..Default::default()
            },
            questions: vec![],
            answers: answers.iter().filter_map(resource_from_record).collect(),
        };

        let raw_answer = match msg.pack() {
            Ok(raw_answer) => raw_answer,
            Err(err) => {
                log::warn!("failed to construct mDNS packet: {err}");
                return;
            }
        };

        if let Err(err) = self.socket.send_to(&raw_answer, self.dst_addr).await {
            log::warn!("failed to send mDNS packet: {err}");
        }
    }

    #[cfg(test)]
    pub(crate) async fn pending_query_count(&self) -> usize {
        self.queries.lock().await.len()
    }
}

// resource_record_from lifts a parsed A or SRV resource into a catalog-level
// record. Other types have no materialized body and yield None.
fn resource_record_from(res: &Resource) -> Option<ResourceRecord> {
    let body = res.body.as_ref()?;
    let rdata = match body.real_type() {
        DnsType::A => {
            let a = body.as_any().downcast_ref::<AResource>()?;
            RData::A(Ipv4Addr::from(a.a))
        }
        DnsType::Srv => {
            let srv = body.as_any().downcast_ref::<SrvResource>()?;
            RData::Srv {
                priority: srv.priority,
                weight: srv.weight,
                port: srv.port,
                target: srv.target.data.clone(),
            }
        }
        _ => return None,
    };
    Some(ResourceRecord {
        name: res.header.name.data.clone(),
        ttl: res.header.ttl,
        rdata,
    })
}

fn resource_from_record(rec: &ResourceRecord) -> Option<Resource> {
    let name = Name::new(&rec.name).ok()?;
    let (typ, body): (DnsType, Box<dyn ResourceBody>) = match &rec.rdata {
        RData::A(ip) => (DnsType::A, Box::new(AResource { a: ip.octets() })),
        RData::Srv {
            priority,
            weight,
            port,
            target,
        } => (
            DnsType::Srv,
            Box::new(SrvResource {
                priority: *priority,
                weight: *weight,
                port: *port,
                target: Name::new(target).ok()?,
            }),
        ),
    };
    Some(Resource {
        header: ResourceHeader {
            name,
            typ,
            class: DNSCLASS_INET,
            ttl: rec.ttl,
            ..Default::default()
        },
        body: Some(body),
    })
}
