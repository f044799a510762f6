#![allow(dead_code)]

mod builders;
mod doq_server_mock;
mod scripted_server;

pub use builders::{
    answer_ip, make_keepalive_query, make_query, make_response, root_store_for, wire, ANSWER_IP,
};
pub use doq_server_mock::{
    CountingBootstrapper, RawClient, RecordingProcessor, SeenQuery, TestDoqServer,
};
pub use scripted_server::{ScriptedDoqServer, SLOW_REPLY};
