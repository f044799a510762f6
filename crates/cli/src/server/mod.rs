pub mod doq;

pub use doq::start_doq_server;
