use bytes::Bytes;
use futures::stream::BoxStream;

pub mod consumer;
pub mod fallback;
pub mod orchestrator;

/// A reply as delivered to the caller: canonical frames, always terminated,
/// never failing.
pub type ReplyStream = BoxStream<'static, Bytes>;
