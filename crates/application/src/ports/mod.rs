mod query_processor;
mod upstream;

pub use query_processor::{DnsContext, QueryProcessor};
pub use upstream::Upstream;
