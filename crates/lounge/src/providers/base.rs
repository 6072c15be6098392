use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;

/// Boxed provider handle produced by the factory.
pub type BoxedProvider = Box<dyn Provider + Send + Sync>;

/// A live reply in canonical event-stream framing: `data: ` lines carrying
/// `{"choices":[{"delta":{"content":...}}]}` payloads, closed by a
/// `data: [DONE]` frame. Consumed exactly once, front to back; dropping it
/// releases the upstream connection.
pub type DeltaStream = BoxStream<'static, Result<Bytes, ProviderError>>;

/// Base trait for streaming chat providers (OpenAI, Anthropic, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Vendor name used in logs and error classification.
    fn name(&self) -> &'static str;

    /// Open one upstream connection and return the reply token stream,
    /// translated into the canonical framing.
    async fn stream_chat(&self, messages: &[Message]) -> ProviderResult<DeltaStream>;
}
