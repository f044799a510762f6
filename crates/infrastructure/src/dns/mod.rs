pub mod doq;
pub mod message;

pub use doq::{
    BytesPool, BytesPoolStats, ClientSession, DoqServer, DoqUpstream, StreamResponder,
    UpstreamBootstrapper,
};
