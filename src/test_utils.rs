//! Fixtures for unit tests: tiny MaxMind DB files, tar bundles and a local HTTP server

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use ipnetwork::IpNetwork;
use std::convert::Infallible;
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;

const DATA_SECTION_SEPARATOR: [u8; 16] = [0; 16];
const METADATA_START_MARKER: &[u8] = b"\xab\xcd\xefMaxMind.com";

/// Subset of MaxMind DB data types
pub enum Value {
    String(String),
    U16(u16),
    U32(u32),
    U64(u64),
    Map(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::String(s) => {
                control(out, 2, s.len());
                out.extend_from_slice(s.as_bytes());
            }
            Value::U16(v) => unsigned(out, 5, *v as u64),
            Value::U32(v) => unsigned(out, 6, *v as u64),
            Value::U64(v) => unsigned(out, 9, *v),
            Value::Map(entries) => {
                control(out, 7, entries.len());
                for (key, value) in entries {
                    Value::String(key.clone()).encode(out);
                    value.encode(out);
                }
            }
            Value::Array(items) => {
                control(out, 11, items.len());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

fn control(out: &mut Vec<u8>, type_number: u8, size: usize) {
    assert!(size < 29, "long payloads are not supported");
    if type_number <= 7 {
        out.push((type_number << 5) | size as u8);
    } else {
        out.push(size as u8);
        out.push(type_number - 7);
    }
}

fn unsigned(out: &mut Vec<u8>, type_number: u8, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    control(out, type_number, bytes.len() - skip);
    out.extend_from_slice(&bytes[skip..]);
}

/// A GeoIP2-Country-like record
pub fn country_record(iso_code: &str) -> Value {
    Value::Map(vec![
        (
            "country".to_owned(),
            Value::Map(vec![("iso_code".to_owned(), Value::String(iso_code.to_owned()))]),
        ),
        (
            "registered_country".to_owned(),
            Value::Map(vec![
                ("geoname_id".to_owned(), Value::U32(6252001)),
                ("iso_code".to_owned(), Value::String(iso_code.to_owned())),
            ]),
        ),
    ])
}

#[derive(Default)]
enum Slot {
    #[default]
    Empty,
    Node(Box<TrieNode>),
    Data(u32),
}

#[derive(Default)]
struct TrieNode {
    children: [Slot; 2],
}

#[derive(Clone, Copy)]
enum Record {
    Empty,
    Node(u32),
    Data(u32),
}

/// Writes MaxMind DB files with 24-bit records
pub struct MmdbWriter {
    ip_version: u16,
    root: TrieNode,
    data: Vec<u8>,
}

impl MmdbWriter {
    pub fn new(ip_version: u16) -> Self {
        Self {
            ip_version,
            root: TrieNode::default(),
            data: vec![],
        }
    }

    /// Networks must not overlap, IPv4 networks of IPv6 databases go to `::/96`
    pub fn insert(mut self, network: &str, value: Value) -> Self {
        let network: IpNetwork = network.parse().unwrap();
        let mut bits = vec![];
        match network {
            IpNetwork::V4(v4) => {
                if self.ip_version == 6 {
                    bits.extend(std::iter::repeat(false).take(96));
                }
                bits.extend(address_bits(&v4.network().octets(), v4.prefix()));
            }
            IpNetwork::V6(v6) => {
                assert_eq!(self.ip_version, 6);
                bits.extend(address_bits(&v6.network().octets(), v6.prefix()));
            }
        }
        assert!(!bits.is_empty(), "zero prefix is not supported");

        let offset = self.data.len() as u32;
        value.encode(&mut self.data);

        let mut node = &mut self.root;
        let (last, path) = bits.split_last().unwrap();
        for &bit in path {
            let slot = &mut node.children[bit as usize];
            if !matches!(slot, Slot::Node(_)) {
                *slot = Slot::Node(Box::default());
            }
            node = match slot {
                Slot::Node(child) => &mut **child,
                _ => unreachable!(),
            };
        }
        node.children[*last as usize] = Slot::Data(offset);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut nodes = vec![];
        flatten(&self.root, &mut nodes);
        let node_count = nodes.len() as u32;
        let record_value = |record: Record| match record {
            Record::Empty => node_count,
            Record::Node(index) => index,
            Record::Data(offset) => node_count + DATA_SECTION_SEPARATOR.len() as u32 + offset,
        };

        let mut buf = vec![];
        for node in nodes {
            for record in node {
                buf.extend_from_slice(&record_value(record).to_be_bytes()[1..]);
            }
        }
        buf.extend_from_slice(&DATA_SECTION_SEPARATOR);
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(METADATA_START_MARKER);
        Value::Map(vec![
            ("binary_format_major_version".to_owned(), Value::U16(2)),
            ("binary_format_minor_version".to_owned(), Value::U16(0)),
            ("build_epoch".to_owned(), Value::U64(1704067200)),
            (
                "database_type".to_owned(),
                Value::String("GeoLite2-Country".to_owned()),
            ),
            (
                "description".to_owned(),
                Value::Map(vec![("en".to_owned(), Value::String("test".to_owned()))]),
            ),
            ("ip_version".to_owned(), Value::U16(self.ip_version)),
            (
                "languages".to_owned(),
                Value::Array(vec![Value::String("en".to_owned())]),
            ),
            ("node_count".to_owned(), Value::U32(node_count)),
            ("record_size".to_owned(), Value::U16(24)),
        ])
        .encode(&mut buf);
        buf
    }
}

fn address_bits(octets: &[u8], prefix: u8) -> impl Iterator<Item = bool> + '_ {
    (0..prefix as usize).map(move |i| octets[i / 8] & (0x80 >> (i % 8)) != 0)
}

/// Pre-order numbering, so the root gets index zero
fn flatten(node: &TrieNode, nodes: &mut Vec<[Record; 2]>) -> u32 {
    let index = nodes.len();
    nodes.push([Record::Empty; 2]);
    for bit in 0..2 {
        let record = match &node.children[bit] {
            Slot::Empty => Record::Empty,
            Slot::Data(offset) => Record::Data(*offset),
            Slot::Node(child) => Record::Node(flatten(child, nodes)),
        };
        nodes[index][bit] = record;
    }
    index as u32
}

pub fn tar_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, *contents).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip(buf: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(buf).unwrap();
    encoder.finish().unwrap()
}

/// Run an HTTP server on a background thread, it lives until the test process exits
pub fn serve<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    let (sender, receiver) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let make_service = make_service_fn(move |_: &AddrStream| {
                let handler = handler.clone();
                async move {
                    Ok::<_, Infallible>(service_fn(move |request: Request<Body>| {
                        let response = handler(request);
                        async move { Ok::<_, Infallible>(response.await) }
                    }))
                }
            });
            let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_service);
            sender.send(server.local_addr()).unwrap();
            server.await.unwrap();
        });
    });
    receiver.recv().unwrap()
}
