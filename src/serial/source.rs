use super::Result;

/// Anything the monitoring loop can pull raw device bytes from.
///
/// The loop always asks `bytes_available` first and only calls
/// `read_available` when something is waiting, so implementations never have
/// to block on an idle line.
#[async_trait::async_trait]
pub trait ByteSource: Send {
    /// Number of bytes currently waiting to be read.
    async fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `buffer.len()` waiting bytes, returning how many were copied.
    async fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize>;
}
