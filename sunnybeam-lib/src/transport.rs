use crate::error::SBError;
use bytes::Bytes;

/// The narrow interface the protocol engine needs from the USB link.
///
/// Implementations are expected to be opened, configured and claimed already.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Issue the one-time feature activation control request.
    async fn set_feature(&mut self) -> Result<(), SBError>;

    /// Write `data` to the bulk OUT endpoint and return the bytes written.
    async fn write(&mut self, data: &[u8]) -> Result<usize, SBError>;

    /// Read whatever the bulk IN endpoint has, up to `max_len` bytes.
    /// A read that times out yields empty bytes rather than an error.
    async fn read(&mut self, max_len: usize) -> Result<Bytes, SBError>;
}
