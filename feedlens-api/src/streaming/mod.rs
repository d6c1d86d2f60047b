pub mod sse_stream;

pub use sse_stream::{SseStream, StreamEvent};
