use super::*;
use crate::error::Error;
use crate::message::DnsType;

fn src() -> SocketAddr {
    "127.0.0.1:5353".parse().unwrap()
}

#[test]
fn test_add_and_lookup_static_a() {
    let store = RecordStore::default();
    store
        .add_a("printer.local", Some(Ipv4Addr::new(10, 0, 0, 5)), false)
        .unwrap();

    let answers = store.lookup("printer.local", DnsType::A, src()).unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].name, "printer.local.");
    assert_eq!(answers[0].ttl, 10);
    assert_eq!(answers[0].rdata, RData::A(Ipv4Addr::new(10, 0, 0, 5)));
}

#[test]
fn test_lookup_canonicalizes_names() {
    let store = RecordStore::default();
    store
        .add_a("Printer.Local", Some(Ipv4Addr::new(10, 0, 0, 5)), false)
        .unwrap();

    // Mixed case and an explicit trailing dot still match.
    let answers = store.lookup("PRINTER.local.", DnsType::A, src()).unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].name, "printer.local.");
}

#[test]
fn test_add_a_empty_name() {
    let store = RecordStore::default();
    assert_eq!(
        store.add_a("", Some(Ipv4Addr::new(10, 0, 0, 5)), false),
        Err(Error::ErrInvalidParameter)
    );
}

#[test]
fn test_add_srv_empty_name_or_target() {
    let store = RecordStore::default();
    assert_eq!(
        store.add_srv("", 0, 0, 8080, "node.local"),
        Err(Error::ErrInvalidParameter)
    );
    assert_eq!(
        store.add_srv("_svc._tcp.local", 0, 0, 8080, ""),
        Err(Error::ErrInvalidParameter)
    );
}

#[test]
fn test_add_a_without_addr_becomes_dynamic() {
    let store = RecordStore::default();
    // Static requested but no address given: coerced to dynamic.
    store.add_a("host.local", None, false).unwrap();

    let answers = store.lookup("host.local", DnsType::A, src()).unwrap();
    assert_eq!(answers.len(), 1);
    // Resolved against the loopback peer.
    assert_eq!(answers[0].rdata, RData::A(Ipv4Addr::LOCALHOST));
}

#[test]
fn test_dynamic_a_resolves_from_source() {
    let store = RecordStore::default();
    store.add_a("host.local", None, true).unwrap();

    let answers = store.lookup("host.local", DnsType::A, src()).unwrap();
    assert_eq!(answers.len(), 1);
    let expected = crate::socket::interface_for_remote(src()).unwrap();
    assert_eq!(answers[0].rdata, RData::A(expected));
}

#[test]
fn test_duplicate_a_record() {
    let store = RecordStore::default();
    store
        .add_a("x.local.", Some(Ipv4Addr::new(10, 0, 0, 1)), false)
        .unwrap();
    assert_eq!(
        store.add_a("x.local.", Some(Ipv4Addr::new(10, 0, 0, 2)), false),
        Err(Error::ErrRecordExists)
    );

    // The original record is untouched.
    let answers = store.lookup("x.local.", DnsType::A, src()).unwrap();
    assert_eq!(answers[0].rdata, RData::A(Ipv4Addr::new(10, 0, 0, 1)));
}

#[test]
fn test_duplicate_srv_record() {
    let store = RecordStore::default();
    store
        .add_srv("_svc._tcp.local", 0, 0, 8080, "a.local")
        .unwrap();
    assert_eq!(
        store.add_srv("_svc._tcp.local", 0, 0, 9090, "b.local"),
        Err(Error::ErrRecordExists)
    );
}

#[test]
fn test_a_and_srv_share_owner_name() {
    let store = RecordStore::default();
    store
        .add_a("svc.local", Some(Ipv4Addr::new(10, 0, 0, 1)), false)
        .unwrap();
    store.add_srv("svc.local", 0, 0, 8080, "svc.local").unwrap();

    assert_eq!(store.lookup("svc.local", DnsType::A, src()).unwrap().len(), 1);
    // SRV plus the chased A under the same name.
    assert_eq!(
        store.lookup("svc.local", DnsType::Srv, src()).unwrap().len(),
        2
    );
}

#[test]
fn test_remove_a_record() {
    let store = RecordStore::default();
    store
        .add_a("host.local", Some(Ipv4Addr::new(10, 0, 0, 5)), false)
        .unwrap();
    store.remove_a("host.local").unwrap();

    assert!(store.lookup("host.local", DnsType::A, src()).unwrap().is_empty());
    assert_eq!(store.remove_a("host.local"), Err(Error::ErrRecordNotFound));
}

#[test]
fn test_remove_srv_record() {
    let store = RecordStore::default();
    store
        .add_srv("_svc._tcp.local", 0, 0, 8080, "node.local")
        .unwrap();
    store.remove_srv("_svc._tcp.local").unwrap();

    assert!(
        store
            .lookup("_svc._tcp.local", DnsType::Srv, src())
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        store.remove_srv("_svc._tcp.local"),
        Err(Error::ErrRecordNotFound)
    );
}

#[test]
fn test_remove_keeps_other_record_type() {
    let store = RecordStore::default();
    store
        .add_a("svc.local", Some(Ipv4Addr::new(10, 0, 0, 1)), false)
        .unwrap();
    store.add_srv("svc.local", 0, 0, 8080, "svc.local").unwrap();

    store.remove_a("svc.local").unwrap();
    let answers = store.lookup("svc.local", DnsType::Srv, src()).unwrap();
    // SRV survives; the chased A is gone.
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].dns_type(), DnsType::Srv);
}

#[test]
fn test_srv_lookup_chases_target() {
    let store = RecordStore::default();
    store
        .add_srv("_svc._tcp.local", 0, 0, 8080, "node.local")
        .unwrap();
    store
        .add_a("node.local", Some(Ipv4Addr::new(10, 0, 0, 9)), false)
        .unwrap();

    let answers = store.lookup("_svc._tcp.local", DnsType::Srv, src()).unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].name, "_svc._tcp.local.");
    assert_eq!(
        answers[0].rdata,
        RData::Srv {
            priority: 0,
            weight: 0,
            port: 8080,
            target: "node.local.".to_owned(),
        }
    );
    assert_eq!(answers[1].name, "node.local.");
    assert_eq!(answers[1].rdata, RData::A(Ipv4Addr::new(10, 0, 0, 9)));
}

#[test]
fn test_srv_lookup_missing_target_is_not_an_error() {
    let store = RecordStore::default();
    store
        .add_srv("_svc._tcp.local", 0, 0, 8080, "nowhere.local")
        .unwrap();

    let answers = store.lookup("_svc._tcp.local", DnsType::Srv, src()).unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].dns_type(), DnsType::Srv);
}

#[test]
fn test_lookup_no_match() {
    let store = RecordStore::default();
    assert!(store.lookup("ghost.local", DnsType::A, src()).unwrap().is_empty());
}

#[test]
fn test_lookup_unhandled_type() {
    let store = RecordStore::default();
    store
        .add_a("host.local", Some(Ipv4Addr::new(10, 0, 0, 5)), false)
        .unwrap();
    assert!(
        store
            .lookup("host.local", DnsType::Txt, src())
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_canonical_name() {
    assert_eq!(canonical_name("Host.Local"), "host.local.");
    assert_eq!(canonical_name("host.local."), "host.local.");
}
