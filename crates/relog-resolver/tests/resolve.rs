//! End-to-end pipeline tests against an in-process fake nameserver.
//!
//! The fake server answers scripted PTR and NS queries over a real UDP
//! socket, so these tests exercise the full path: scan, enqueue, dispatch,
//! react, sweep, recursion, commit, store write-back.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use relog_proto::{Message, Name, RecordType, ResourceRecord, ResponseCode, SoaData};
use relog_resolver::{Config, Resolver};
use relog_store::{Origin, Store};
use tempfile::TempDir;
use tokio::io::BufReader;
use tokio::net::UdpSocket;

/// What the fake server does for one (qname, qtype) pair.
#[derive(Clone)]
enum Reply {
    /// Answer with a PTR record.
    Ptr(&'static str),
    /// Answer with an NS record in the answer section.
    Ns(&'static str),
    /// NOERROR with an SOA in the authority section (the shape a negative
    /// NS lookup takes at a real server).
    SoaAuthority(&'static str),
    /// Never answer; the client must time out.
    Silent,
}

/// Binds a fake nameserver and serves the scripted replies. Unknown
/// queries get an empty NXDOMAIN.
async fn spawn_fake_dns(script: Vec<((&str, RecordType), Reply)>) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let map: HashMap<(String, u16), Reply> = script
        .into_iter()
        .map(|((qname, rtype), reply)| ((qname.to_string(), rtype.to_u16()), reply))
        .collect();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(query) = Message::parse(&buf[..len]) else {
                continue;
            };
            let Some(question) = query.first_question() else {
                continue;
            };

            let key = (
                question.name.to_dotless_string().to_ascii_lowercase(),
                question.rtype.to_u16(),
            );

            let mut response = Message::response_to(&query);
            match map.get(&key) {
                Some(Reply::Silent) => continue,
                Some(Reply::Ptr(target)) => {
                    response.push_answer(ResourceRecord::ptr(
                        question.name.clone(),
                        300,
                        Name::from_str(target).unwrap(),
                    ));
                }
                Some(Reply::Ns(nsdname)) => {
                    response.push_answer(ResourceRecord::ns(
                        question.name.clone(),
                        300,
                        Name::from_str(nsdname).unwrap(),
                    ));
                }
                Some(Reply::SoaAuthority(mname)) => {
                    response.push_authority(ResourceRecord::soa(
                        question.name.clone(),
                        300,
                        SoaData::new(
                            Name::from_str(mname).unwrap(),
                            Name::from_str("hostmaster.invalid.").unwrap(),
                            1,
                        ),
                    ));
                }
                None => response.set_rcode(ResponseCode::NxDomain),
            }

            let _ = socket.send_to(&response.to_bytes(), peer).await;
        }
    });

    addr
}

/// A config pointed at the fake server, with timings tight enough for
/// timeout paths to run in test time.
fn quick_config(server: SocketAddr) -> Config {
    Config {
        server,
        timeout: Duration::from_millis(400),
        reactor_wait: Duration::from_millis(50),
        ..Config::default()
    }
}

async fn run_to_string(resolver: &mut Resolver, input: &str) -> String {
    let mut output = Vec::new();
    resolver
        .run(BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();
    String::from_utf8(output).unwrap()
}

#[tokio::test]
async fn ptr_resolution_rewrites_and_persists() {
    let server = spawn_fake_dns(vec![(
        ("4.3.2.1.in-addr.arpa", RecordType::Ptr),
        Reply::Ptr("host.example."),
    )])
    .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("resolve.db");
    let store = Store::open(&db).unwrap();

    let mut resolver = Resolver::new(quick_config(server), Some(store));
    let output = run_to_string(&mut resolver, "1.2.3.4 x\n").await;

    assert_eq!(output, "host.example. x\n");
    assert_eq!(resolver.stats().queries_sent, 1);
    assert_eq!(resolver.stats().resolved_ns, 1);
    drop(resolver);

    let store = Store::open(&db).unwrap();
    let record = store.get("1.2.3.4").unwrap();
    assert_eq!(record.name, "host.example.");
    assert_eq!(record.origin, Origin::Nameserver);
}

#[tokio::test]
async fn dbfirst_store_hit_sends_no_queries() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(dir.path().join("resolve.db")).unwrap();
    store.insert("1.2.3.4", "host.example", Origin::Nameserver);

    // The server address is never contacted; a store hit short-circuits.
    let mut config = quick_config("127.0.0.1:9".parse().unwrap());
    config.db_first = true;

    let mut resolver = Resolver::new(config, Some(store));
    let output = run_to_string(&mut resolver, "1.2.3.4 GET /\n").await;

    assert_eq!(output, "host.example GET /\n");
    assert_eq!(resolver.stats().queries_sent, 0);
    assert_eq!(resolver.stats().resolved_store, 1);
}

#[tokio::test]
async fn second_dbfirst_run_replays_first_answers() {
    let server = spawn_fake_dns(vec![(
        ("4.3.2.1.in-addr.arpa", RecordType::Ptr),
        Reply::Ptr("host.example."),
    )])
    .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("resolve.db");

    let mut first = Resolver::new(quick_config(server), Some(Store::open(&db).unwrap()));
    let first_output = run_to_string(&mut first, "1.2.3.4 x\n").await;
    assert_eq!(first.stats().queries_sent, 1);
    drop(first);

    let mut config = quick_config(server);
    config.db_first = true;
    let mut second = Resolver::new(config, Some(Store::open(&db).unwrap()));
    let second_output = run_to_string(&mut second, "1.2.3.4 x\n").await;

    assert_eq!(second_output, first_output);
    assert_eq!(second.stats().queries_sent, 0);
}

#[tokio::test]
async fn recursion_synthesizes_name_from_class() {
    let server = spawn_fake_dns(vec![
        // Direct PTR never answers; the /24 NS lookup finds the zone.
        (("4.3.2.1.in-addr.arpa", RecordType::Ptr), Reply::Silent),
        (
            ("3.2.1.in-addr.arpa", RecordType::Ns),
            Reply::SoaAuthority("ns.net.example."),
        ),
    ])
    .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("resolve.db");

    let mut config = quick_config(server);
    config.recursive = true;
    config.timeout = Duration::from_millis(300);

    let mut resolver = Resolver::new(config, Some(Store::open(&db).unwrap()));
    let output = run_to_string(&mut resolver, "1.2.3.4 x\n").await;

    assert_eq!(output, "1.2.3.4.net.example x\n");
    assert_eq!(resolver.stats().resolved_recursion, 1);
    assert_eq!(resolver.stats().timeouts, 1);
    // One PTR plus up to three class queries.
    assert!((2..=4).contains(&resolver.stats().queries_sent));
    drop(resolver);

    let store = Store::open(&db).unwrap();
    let host = store.get("1.2.3.4").unwrap();
    assert_eq!(host.name, "1.2.3.4.net.example");
    assert_eq!(host.origin, Origin::Recursed);

    let class = store.get("1.2.3").unwrap();
    assert_eq!(class.name, "net.example");
    assert_eq!(class.origin, Origin::Nameserver);

    // The failed wider classes are not persisted.
    assert!(store.get("1.2").is_none());
    assert!(store.get("1").is_none());
}

#[tokio::test]
async fn timeout_without_recursion_leaves_address() {
    let server = spawn_fake_dns(vec![(
        ("9.9.9.9.in-addr.arpa", RecordType::Ptr),
        Reply::Silent,
    )])
    .await;

    let mut config = quick_config(server);
    config.timeout = Duration::from_millis(200);

    let mut resolver = Resolver::new(config, None);
    let output = run_to_string(&mut resolver, "9.9.9.9 x\n").await;

    assert_eq!(output, "9.9.9.9 x\n");
    assert_eq!(resolver.stats().timeouts, 1);
    assert_eq!(resolver.stats().failed, 1);
}

#[tokio::test]
async fn cached_answer_adopted_after_timeout() {
    let server = spawn_fake_dns(vec![(
        ("4.3.2.1.in-addr.arpa", RecordType::Ptr),
        Reply::Silent,
    )])
    .await;

    let dir = TempDir::new().unwrap();
    let mut store = Store::open(dir.path().join("resolve.db")).unwrap();
    store.insert("1.2.3.4", "stale.example.", Origin::Merged);

    // db-first off: the query is tried first and the store is the fallback.
    let mut config = quick_config(server);
    config.timeout = Duration::from_millis(200);

    let mut resolver = Resolver::new(config, Some(store));
    let output = run_to_string(&mut resolver, "1.2.3.4 x\n").await;

    assert_eq!(output, "stale.example. x\n");
    assert_eq!(resolver.stats().queries_sent, 1);
    assert_eq!(resolver.stats().resolved_store, 1);

    // Store answers are never written back; the record keeps origin M.
    assert_eq!(
        resolver.store().unwrap().get("1.2.3.4").unwrap().origin,
        Origin::Merged
    );
}

#[tokio::test]
async fn anywhere_replaces_every_occurrence() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(dir.path().join("resolve.db")).unwrap();
    store.insert("10.0.0.1", "dup.example", Origin::Nameserver);

    let mut config = quick_config("127.0.0.1:9".parse().unwrap());
    config.anywhere = true;
    config.db_first = true;

    let mut resolver = Resolver::new(config, Some(store));
    let output = run_to_string(&mut resolver, "a 10.0.0.1 b 10.0.0.1 c\n").await;

    assert_eq!(output, "a dup.example b dup.example c\n");
    assert_eq!(resolver.stats().queries_sent, 0);
}

#[tokio::test]
async fn anchored_mode_ignores_midline_addresses() {
    // No server needed: nothing is ever scanned out of the line.
    let mut resolver = Resolver::new(quick_config("127.0.0.1:9".parse().unwrap()), None);
    let output = run_to_string(&mut resolver, "GET / from 1.2.3.4\n").await;

    assert_eq!(output, "GET / from 1.2.3.4\n");
    assert_eq!(resolver.stats().queries_sent, 0);
    assert_eq!(resolver.stats().hosts, 0);
}

#[tokio::test]
async fn output_order_survives_mixed_latency() {
    let server = spawn_fake_dns(vec![
        (("1.1.1.1.in-addr.arpa", RecordType::Ptr), Reply::Silent),
        (
            ("2.2.2.2.in-addr.arpa", RecordType::Ptr),
            Reply::Ptr("two.example."),
        ),
    ])
    .await;

    let mut config = quick_config(server);
    config.timeout = Duration::from_millis(300);

    let mut resolver = Resolver::new(config, None);
    let output = run_to_string(&mut resolver, "1.1.1.1 a\n2.2.2.2 b\n").await;

    // The second line resolves quickly but must wait for the head.
    assert_eq!(output, "1.1.1.1 a\ntwo.example. b\n");
    assert_eq!(resolver.stats().lines_written, 2);
}

#[tokio::test]
async fn ns_answer_record_defines_class_name() {
    let server = spawn_fake_dns(vec![
        (("4.3.2.1.in-addr.arpa", RecordType::Ptr), Reply::Silent),
        (
            ("3.2.1.in-addr.arpa", RecordType::Ns),
            Reply::Ns("NS1.Wide.Example."),
        ),
    ])
    .await;

    let mut config = quick_config(server);
    config.recursive = true;
    config.timeout = Duration::from_millis(300);

    let mut resolver = Resolver::new(config, None);
    let output = run_to_string(&mut resolver, "1.2.3.4 x\n").await;

    // nsdname lowercased, leading label cut: wide.example.
    assert_eq!(output, "1.2.3.4.wide.example x\n");
}
