pub mod streaming;
pub mod types;

pub use streaming::{StreamAccumulator, StreamBox, StreamDelta};
pub use types::*;

/// A chat model that streams its response.
///
/// The returned stream is lazy: nothing is sent upstream until it is polled,
/// and dropping it aborts the in-flight generation.
pub trait LlmProvider: Send + Sync {
    fn chat_stream(&self, request: ChatRequest) -> StreamBox<'_>;
    fn model(&self) -> &str;
    fn provider(&self) -> &'static str;
}
