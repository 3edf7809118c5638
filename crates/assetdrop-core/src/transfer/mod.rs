//! Transfer layer: turns a source URL into a stream of body chunks.
//!
//! The orchestrator treats sources opaquely through `TransferSource`. Fetches are
//! blocking and run on `spawn_blocking`; the sink receives the response head once,
//! then every body chunk in order.

mod error;
mod http;

pub use error::TransferError;
pub use http::CurlSource;

/// Response metadata, delivered before the first body chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status, or 0 for protocols without one (e.g. `file://`).
    pub status: u32,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        self.status == 0 || (200..300).contains(&self.status)
    }
}

/// Receives a transfer's output. A `write` error aborts the transfer and is
/// reported as `TransferError::Sink`.
pub trait TransferSink {
    fn begin(&mut self, head: &ResponseHead);
    fn write(&mut self, chunk: &[u8]) -> anyhow::Result<()>;
}

/// A source of asset bytes. Implementations block until the body is fully
/// delivered or the transfer fails.
pub trait TransferSource: Send + Sync + 'static {
    fn fetch(&self, url: &str, sink: &mut dyn TransferSink) -> Result<ResponseHead, TransferError>;
}
