#![allow(dead_code)]
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use rustls::pki_types::CertificateDer;
use std::net::Ipv4Addr;

pub const ANSWER_IP: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

pub fn make_query(id: u16, domain: &str) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(Query::query(
        Name::from_ascii(domain).unwrap(),
        RecordType::A,
    ));
    message
}

pub fn make_keepalive_query(id: u16, domain: &str) -> Message {
    let mut message = make_query(id, domain);
    let mut edns = Edns::new();
    edns.options_mut().insert(EdnsOption::Unknown(
        u16::from(EdnsCode::Keepalive),
        vec![0x00, 0x64],
    ));
    message.set_edns(edns);
    message
}

pub fn make_response(query: &Message, ip: Ipv4Addr) -> Message {
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .set_recursion_available(true);
    for q in query.queries() {
        response.add_query(q.clone());
        response.add_answer(Record::from_rdata(q.name().clone(), 60, RData::A(A(ip))));
    }
    response
}

pub fn wire(message: &Message) -> Vec<u8> {
    message.to_bytes().unwrap()
}

pub fn root_store_for(cert: &CertificateDer<'static>) -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert.clone()).unwrap();
    roots
}

pub fn answer_ip(response: &Message) -> Option<Ipv4Addr> {
    response.answers().iter().find_map(|record| match record.data() {
        Some(RData::A(a)) => Some(a.0),
        _ => None,
    })
}
