use super::header::*;
use super::name::*;
use super::parser::*;
use super::question::*;
use super::resource::a::*;
use super::resource::srv::*;
use super::resource::*;
use super::*;
use crate::error::Error;

// Appends the uncompressed wire form of a DNS name.
fn append_name(b: &mut Vec<u8>, name: &str) {
    for label in name.trim_end_matches('.').split('.') {
        b.push(label.len() as u8);
        b.extend_from_slice(label.as_bytes());
    }
    b.push(0);
}

fn a_answer(name: &str, ttl: u32, octets: [u8; 4]) -> Resource {
    Resource {
        header: ResourceHeader {
            name: Name::new(name).unwrap(),
            typ: DnsType::A,
            class: DNSCLASS_INET,
            ttl,
            ..Default::default()
        },
        body: Some(Box::new(AResource { a: octets })),
    }
}

fn srv_answer(name: &str, ttl: u32, port: u16, target: &str) -> Resource {
    Resource {
        header: ResourceHeader {
            name: Name::new(name).unwrap(),
            typ: DnsType::Srv,
            class: DNSCLASS_INET,
            ttl,
            ..Default::default()
        },
        body: Some(Box::new(SrvResource {
            priority: 0,
            weight: 0,
            port,
            target: Name::new(target).unwrap(),
        })),
    }
}

#[test]
fn test_pack_query_golden_bytes() {
    let mut msg = Message {
        header: Header {
            recursion_desired: true,
            ..Default::default()
        },
        questions: vec![Question {
            name: Name::new("printer.local.").unwrap(),
            typ: DnsType::A,
            class: DNSCLASS_INET,
        }],
        answers: vec![],
    };

    let packed = msg.pack().unwrap();

    let mut expected = vec![
        0x00, 0x00, // id
        0x01, 0x00, // flags: RD
        0x00, 0x01, // qdcount
        0x00, 0x00, // ancount
        0x00, 0x00, // nscount
        0x00, 0x00, // arcount
    ];
    append_name(&mut expected, "printer.local.");
    expected.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // type A, class IN

    assert_eq!(packed, expected);
}

#[test]
fn test_query_round_trip() {
    let mut msg = Message {
        header: Header {
            recursion_desired: true,
            ..Default::default()
        },
        questions: vec![Question {
            name: Name::new("host.local.").unwrap(),
            typ: DnsType::Srv,
            class: DNSCLASS_INET,
        }],
        answers: vec![],
    };
    let packed = msg.pack().unwrap();

    let mut parsed = Message::default();
    parsed.unpack(&packed).unwrap();

    assert!(!parsed.header.response);
    assert!(parsed.header.recursion_desired);
    assert_eq!(parsed.header.op_code, 0);
    assert_eq!(parsed.questions.len(), 1);
    assert_eq!(parsed.questions[0].name.data, "host.local.");
    assert_eq!(parsed.questions[0].typ, DnsType::Srv);
    assert_eq!(parsed.questions[0].class, DNSCLASS_INET);
    assert!(parsed.answers.is_empty());
}

#[test]
fn test_response_round_trip() {
    let mut msg = Message {
        header: Header {
            response: true,
            authoritative: true,
            ..Default::default()
        },
        questions: vec![],
        answers: vec![
            srv_answer("_svc._tcp.local.", 10, 8080, "node.local."),
            a_answer("node.local.", 10, [10, 0, 0, 9]),
        ],
    };
    let packed = msg.pack().unwrap();

    let mut parsed = Message::default();
    parsed.unpack(&packed).unwrap();

    assert!(parsed.header.response);
    assert!(parsed.header.authoritative);
    assert_eq!(parsed.header.rcode, RCode::Success);
    assert_eq!(parsed.answers.len(), 2);

    let srv = &parsed.answers[0];
    assert_eq!(srv.header.name.data, "_svc._tcp.local.");
    assert_eq!(srv.header.ttl, 10);
    let body = srv
        .body
        .as_ref()
        .unwrap()
        .as_any()
        .downcast_ref::<SrvResource>()
        .unwrap();
    assert_eq!(body.port, 8080);
    assert_eq!(body.target.data, "node.local.");

    let a = &parsed.answers[1];
    assert_eq!(a.header.name.data, "node.local.");
    assert_eq!(a.header.typ, DnsType::A);
    let body = a
        .body
        .as_ref()
        .unwrap()
        .as_any()
        .downcast_ref::<AResource>()
        .unwrap();
    assert_eq!(body.a, [10, 0, 0, 9]);
}

#[test]
fn test_pack_compresses_repeated_names() {
    let mut msg = Message {
        header: Header {
            response: true,
            authoritative: true,
            ..Default::default()
        },
        questions: vec![],
        answers: vec![
            a_answer("host.local.", 10, [10, 0, 0, 1]),
            a_answer("host.local.", 10, [10, 0, 0, 2]),
        ],
    };
    let packed = msg.pack().unwrap();

    // First answer: 12-byte name + 10-byte fixed header fields + 4-byte
    // RDATA. Second answer starts at offset 38 with a 2-byte pointer back to
    // the name at offset 12.
    assert_eq!(packed.len(), 54);
    assert_eq!(packed[38], 0xC0);
    assert_eq!(packed[39], 12);

    let mut parsed = Message::default();
    parsed.unpack(&packed).unwrap();
    assert_eq!(parsed.answers.len(), 2);
    assert_eq!(parsed.answers[0].header.name.data, "host.local.");
    assert_eq!(parsed.answers[1].header.name.data, "host.local.");
}

#[test]
fn test_unpack_skips_unsupported_answer_types() {
    let mut b = vec![
        0x00, 0x00, // id
        0x84, 0x00, // flags: QR | AA
        0x00, 0x00, // qdcount
        0x00, 0x02, // ancount
        0x00, 0x00, // nscount
        0x00, 0x00, // arcount
    ];
    // TXT record, which this parser does not materialize.
    append_name(&mut b, "info.local.");
    b.extend_from_slice(&[0x00, 0x10, 0x00, 0x01]); // type TXT, class IN
    b.extend_from_slice(&[0x00, 0x00, 0x00, 0x0A]); // ttl 10
    b.extend_from_slice(&[0x00, 0x05]); // rdlength
    b.extend_from_slice(&[0x04, b't', b'e', b's', b't']);
    // A record.
    append_name(&mut b, "host.local.");
    b.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // type A, class IN
    b.extend_from_slice(&[0x00, 0x00, 0x00, 0x0A]); // ttl 10
    b.extend_from_slice(&[0x00, 0x04]); // rdlength
    b.extend_from_slice(&[10, 0, 0, 9]);

    let mut parsed = Message::default();
    parsed.unpack(&b).unwrap();

    assert_eq!(parsed.answers.len(), 1);
    assert_eq!(parsed.answers[0].header.typ, DnsType::A);
    assert_eq!(parsed.answers[0].header.name.data, "host.local.");
}

#[test]
fn test_parser_short_header() {
    let mut p = Parser::default();
    assert_eq!(p.start(&[0u8; 11]), Err(Error::ErrBaseLen));
}

#[test]
fn test_parser_section_order() {
    let mut msg = Message {
        header: Header::default(),
        questions: vec![Question {
            name: Name::new("a.local.").unwrap(),
            typ: DnsType::A,
            class: DNSCLASS_INET,
        }],
        answers: vec![a_answer("a.local.", 10, [1, 2, 3, 4])],
    };
    let packed = msg.pack().unwrap();

    let mut p = Parser::default();
    p.start(&packed).unwrap();

    assert!(p.question().is_ok());
    assert_eq!(p.question(), Err(Error::ErrSectionDone));

    // The question section is exhausted, answers are now parseable.
    let header = p.answer_header().unwrap();
    assert_eq!(header.typ, DnsType::A);
    assert!(p.answer().is_ok());
    assert_eq!(p.answer_header().map(|h| h.typ), Err(Error::ErrSectionDone));
}

#[test]
fn test_unpack_truncated_rdata() {
    let mut b = vec![
        0x00, 0x00, 0x84, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
    ];
    append_name(&mut b, "host.local.");
    b.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // type A, class IN
    b.extend_from_slice(&[0x00, 0x00, 0x00, 0x0A]); // ttl
    b.extend_from_slice(&[0x00, 0x04]); // rdlength says 4...
    b.extend_from_slice(&[10, 0]); // ...but only 2 bytes follow

    let mut parsed = Message::default();
    assert!(parsed.unpack(&b).is_err());
}

#[test]
fn test_name_round_trip() {
    let name = Name::new("Printer._tcp.local.").unwrap();
    let packed = name.pack(vec![], &mut None, 0).unwrap();

    let mut unpacked = Name::default();
    let off = unpacked.unpack(&packed, 0).unwrap();
    assert_eq!(off, packed.len());
    assert_eq!(unpacked.data, "Printer._tcp.local.");

    assert_eq!(Name::skip(&packed, 0).unwrap(), packed.len());
}

#[test]
fn test_name_requires_trailing_dot() {
    let name = Name::new("printer.local").unwrap();
    assert_eq!(
        name.pack(vec![], &mut None, 0),
        Err(Error::ErrNonCanonicalName)
    );
}

#[test]
fn test_name_root() {
    let name = Name::new(".").unwrap();
    let packed = name.pack(vec![], &mut None, 0).unwrap();
    assert_eq!(packed, vec![0]);
}

#[test]
fn test_name_too_long() {
    let long = "a".repeat(256);
    assert_eq!(Name::new(&long), Err(Error::ErrCalcLen));
}

#[test]
fn test_name_unpack_pointer_loop() {
    // A name whose pointer points at itself must not be followed forever.
    let mut b = vec![0u8; 12];
    b.extend_from_slice(&[0xC0, 12]);

    let mut name = Name::default();
    assert_eq!(name.unpack(&b, 12), Err(Error::ErrTooManyPtr));
}

#[test]
fn test_name_unpack_reserved_prefix() {
    let b = [0x80, 0x00];
    let mut name = Name::default();
    assert_eq!(name.unpack(&b, 0), Err(Error::ErrReserved));
}

#[test]
fn test_name_unpack_dangling_pointer() {
    let b = [0xC0];
    let mut name = Name::default();
    assert_eq!(name.unpack(&b, 0), Err(Error::ErrInvalidPtr));
}

#[test]
fn test_header_flags_round_trip() {
    let header = Header {
        id: 0,
        response: true,
        op_code: 2,
        authoritative: true,
        truncated: true,
        recursion_desired: false,
        recursion_available: true,
        rcode: RCode::NameError,
    };
    let (id, bits) = header.pack();

    let internal = HeaderInternal {
        id,
        bits,
        ..Default::default()
    };
    let view = internal.header();

    assert!(view.response);
    assert_eq!(view.op_code, 2);
    assert!(view.authoritative);
    assert!(view.truncated);
    assert!(!view.recursion_desired);
    assert!(view.recursion_available);
    assert_eq!(view.rcode, RCode::NameError);
}

#[test]
fn test_srv_target_not_compressed() {
    // The SRV target must be emitted in full even when the suffix is already
    // in the compression table.
    let mut msg = Message {
        header: Header {
            response: true,
            authoritative: true,
            ..Default::default()
        },
        questions: vec![],
        answers: vec![
            a_answer("node.local.", 10, [10, 0, 0, 9]),
            srv_answer("_svc._tcp.local.", 10, 8080, "node.local."),
        ],
    };
    let packed = msg.pack().unwrap();

    // "node.local." appears once for the A record's owner name and once,
    // uncompressed, inside the SRV RDATA.
    let needle: &[u8] = &[4, b'n', b'o', b'd', b'e', 5, b'l', b'o', b'c', b'a', b'l', 0];
    let count = packed
        .windows(needle.len())
        .filter(|w| *w == needle)
        .count();
    assert_eq!(count, 2);

    let mut parsed = Message::default();
    parsed.unpack(&packed).unwrap();
    let body = parsed.answers[1]
        .body
        .as_ref()
        .unwrap()
        .as_any()
        .downcast_ref::<SrvResource>()
        .unwrap();
    assert_eq!(body.target.data, "node.local.");
}
