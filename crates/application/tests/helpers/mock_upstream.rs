use async_trait::async_trait;
use ferrous_doq_application::ports::Upstream;
use ferrous_doq_domain::DomainError;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

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

/// Upstream that answers from a script of outcomes; once the script is
/// exhausted it answers with 192.0.2.1.
pub struct MockUpstream {
    script: Mutex<VecDeque<Result<(), DomainError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    seen_ids: Mutex<Vec<u16>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay: None,
            seen_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_next(&self, error: DomainError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_ids(&self) -> Vec<u16> {
        self.seen_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    fn address(&self) -> String {
        "quic://mock.upstream:853".to_string()
    }

    async fn exchange(&self, query: &mut Message) -> Result<Message, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_ids.lock().unwrap().push(query.id());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(Err(e)) => Err(e),
            _ => Ok(make_response(query, Ipv4Addr::new(192, 0, 2, 1))),
        }
    }
}
