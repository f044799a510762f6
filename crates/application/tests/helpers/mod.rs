#![allow(dead_code)]

mod mock_upstream;

pub use mock_upstream::{make_query, make_response, MockUpstream};
