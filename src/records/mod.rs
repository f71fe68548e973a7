#[cfg(test)]
mod records_test;

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, RwLock};

use crate::config::RESPONSE_TTL;
use crate::error::{Error, Result};
use crate::message::DnsType;
use crate::socket::interface_for_remote;

// canonical_name lowercases a DNS name and appends the trailing dot if it is
// missing. Every store key and comparison uses this form.
pub(crate) fn canonical_name(name: &str) -> String {
    let mut name = name.to_ascii_lowercase();
    if !name.ends_with('.') {
        name.push('.');
    }
    name
}

/// The address carried by an A record.
///
/// A dynamic record has no fixed address; its RDATA is computed per response
/// from the local interface used to reach the querier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAddr {
    Static(Ipv4Addr),
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ARecord {
    ttl: u32,
    addr: RecordAddr,
}

impl ARecord {
    // materialize resolves the record into a concrete answer. For dynamic
    // records the address depends on which local interface routes to src.
    fn materialize(&self, name: &str, src: SocketAddr) -> Result<ResourceRecord> {
        let ip = match self.addr {
            RecordAddr::Static(ip) => ip,
            RecordAddr::Dynamic => interface_for_remote(src)?,
        };
        Ok(ResourceRecord {
            name: name.to_owned(),
            ttl: self.ttl,
            rdata: RData::A(ip),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SrvRecord {
    ttl: u32,
    priority: u16,
    weight: u16,
    port: u16,
    target: String,
}

// At most one A and one SRV record may live under the same owner name.
#[derive(Debug, Default, Clone)]
struct RecordSet {
    a: Option<ARecord>,
    srv: Option<SrvRecord>,
}

/// A single answer, either produced from the local catalog or delivered from
/// a matched response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Canonical owner name.
    pub name: String,
    /// Time to live, in seconds.
    pub ttl: u32,
    /// The record data.
    pub rdata: RData,
}

/// Record data for the types this crate serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
}

impl ResourceRecord {
    /// The DNS type of this record.
    pub fn dns_type(&self) -> DnsType {
        match self.rdata {
            RData::A(_) => DnsType::A,
            RData::Srv { .. } => DnsType::Srv,
        }
    }
}

// RecordStore is the catalog of locally served names. Reads proceed in
// parallel; mutations are serialized by the write lock. Dynamic addresses are
// materialized after the lock is released so a slow route lookup never blocks
// the engine's readers.
#[derive(Default, Debug, Clone)]
pub(crate) struct RecordStore {
    sets: Arc<RwLock<HashMap<String, RecordSet>>>,
}

impl RecordStore {
    // add_a inserts an A record. With dynamic set, or with no destination
    // address given, the record resolves per response from the querier's
    // source address.
    pub(crate) fn add_a(&self, name: &str, dst: Option<Ipv4Addr>, dynamic: bool) -> Result<()> {
        if name.is_empty() {
            return Err(Error::ErrInvalidParameter);
        }
        let name = canonical_name(name);

        let addr = match (dynamic, dst) {
            (false, Some(ip)) => RecordAddr::Static(ip),
            (dynamic, _) => {
                if !dynamic {
                    log::debug!("add_a: no address given for {name}, creating dynamic record");
                }
                RecordAddr::Dynamic
            }
        };

        let mut sets = self.sets.write()?;
        let set = sets.entry(name.clone()).or_default();
        if set.a.is_some() {
            return Err(Error::ErrRecordExists);
        }
        set.a = Some(ARecord {
            ttl: RESPONSE_TTL,
            addr,
        });
        log::debug!("added A record for {name}");
        Ok(())
    }

    pub(crate) fn add_srv(
        &self,
        name: &str,
        priority: u16,
        weight: u16,
        port: u16,
        target: &str,
    ) -> Result<()> {
        if name.is_empty() || target.is_empty() {
            return Err(Error::ErrInvalidParameter);
        }
        let name = canonical_name(name);
        let target = canonical_name(target);

        let mut sets = self.sets.write()?;
        let set = sets.entry(name.clone()).or_default();
        if set.srv.is_some() {
            return Err(Error::ErrRecordExists);
        }
        set.srv = Some(SrvRecord {
            ttl: RESPONSE_TTL,
            priority,
            weight,
            port,
            target: target.clone(),
        });
        log::debug!("added SRV record for {name} -> {target}");
        Ok(())
    }

    pub(crate) fn remove_a(&self, name: &str) -> Result<()> {
        let name = canonical_name(name);
        let mut sets = self.sets.write()?;
        let now_empty = match sets.get_mut(&name) {
            Some(set) if set.a.is_some() => {
                set.a = None;
                set.srv.is_none()
            }
            _ => return Err(Error::ErrRecordNotFound),
        };
        if now_empty {
            sets.remove(&name);
        }
        log::debug!("removed A record for {name}");
        Ok(())
    }

    pub(crate) fn remove_srv(&self, name: &str) -> Result<()> {
        let name = canonical_name(name);
        let mut sets = self.sets.write()?;
        let now_empty = match sets.get_mut(&name) {
            Some(set) if set.srv.is_some() => {
                set.srv = None;
                set.a.is_none()
            }
            _ => return Err(Error::ErrRecordNotFound),
        };
        if now_empty {
            sets.remove(&name);
        }
        log::debug!("removed SRV record for {name}");
        Ok(())
    }

    // lookup answers a question from the catalog. An SRV hit additionally
    // chases the target name for its A record, one level deep; a missing
    // target is not an error. An empty result means we decline to answer.
    pub(crate) fn lookup(
        &self,
        qname: &str,
        qtype: DnsType,
        src: SocketAddr,
    ) -> Result<Vec<ResourceRecord>> {
        let qname = canonical_name(qname);
        let mut answers = Vec::new();

        match qtype {
            DnsType::A => {
                if let Some(rec) = self.get_a(&qname)? {
                    answers.push(rec.materialize(&qname, src)?);
                }
            }
            DnsType::Srv => {
                if let Some(rec) = self.get_srv(&qname)? {
                    let chased = self.get_a(&rec.target)?;
                    answers.push(ResourceRecord {
                        name: qname,
                        ttl: rec.ttl,
                        rdata: RData::Srv {
                            priority: rec.priority,
                            weight: rec.weight,
                            port: rec.port,
                            target: rec.target.clone(),
                        },
                    });
                    if let Some(a) = chased {
                        answers.push(a.materialize(&rec.target, src)?);
                    }
                }
            }
            _ => {}
        }

        Ok(answers)
    }

    fn get_a(&self, name: &str) -> Result<Option<ARecord>> {
        Ok(self.sets.read()?.get(name).and_then(|s| s.a.clone()))
    }

    fn get_srv(&self, name: &str) -> Result<Option<SrvRecord>> {
        Ok(self.sets.read()?.get(name).and_then(|s| s.srv.clone()))
    }
}
