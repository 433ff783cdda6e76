use anyhow::bail;
use bytes::{
    Bytes,
    BytesMut,
};
use tokio_util::codec::Decoder;

/// Chunk decoder for an unframed raw print stream.
///
/// Raw printing carries no message structure; the job ends when the peer
/// closes the connection. The codec passes chunks straight through while
/// enforcing the job size cap: once `cap` bytes have been produced, the job
/// is cut off and any further input is refused.
#[derive(Debug, Copy, Clone)]
pub struct JobCodec {
    remaining: usize,
    truncated: bool,
}

impl JobCodec {
    pub fn new(cap: usize) -> Self {
        Self {
            remaining: cap,
            truncated: false,
        }
    }

    /// True once the stream has been cut off at the size cap.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl Decoder for JobCodec {
    type Error = anyhow::Error;
    type Item = Bytes;

    fn decode(&mut self, src: &mut BytesMut) -> anyhow::Result<Option<Self::Item>, Self::Error> {
        if self.truncated {
            bail!("size cap exceeded");
        }

        if src.is_empty() {
            return Ok(None);
        }

        if src.len() > self.remaining {
            self.truncated = true;
            let head = src.split_to(self.remaining).freeze();
            src.clear();
            return Ok(Some(head));
        }

        self.remaining -= src.len();
        Ok(Some(src.split().freeze()))
    }
}
