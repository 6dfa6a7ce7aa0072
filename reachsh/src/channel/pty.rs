//! PTY channel abstraction for interactive sessions.

use std::pin::Pin;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ChannelError;

/// Default number of bytes requested per read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Interactive shell channel over any async byte stream.
///
/// The SSH implementation hands in a russh channel stream; tests hand in a
/// scripted mock.
pub struct PtyChannel<S> {
    stream: Pin<Box<S>>,

    /// Upper bound on bytes returned by one read.
    chunk_size: usize,

    scratch: BytesMut,

    /// Whether the channel is open.
    is_open: bool,
}

impl<S> PtyChannel<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    /// Wrap a shell stream, reading at most `chunk_size` bytes at a time.
    pub fn new(stream: S, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            stream: Box::pin(stream),
            chunk_size,
            scratch: BytesMut::with_capacity(chunk_size),
            is_open: true,
        }
    }

    /// Check if the channel is open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Bytes requested per read.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Write raw bytes and flush.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        if !self.is_open {
            return Err(ChannelError::Closed);
        }
        self.stream.as_mut().write_all(data).await?;
        self.stream.as_mut().flush().await?;
        Ok(())
    }

    /// Write `text` followed by a newline.
    pub async fn send_line(&mut self, text: &str) -> Result<(), ChannelError> {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');
        self.send(&line).await
    }

    /// Read the next chunk, waiting at most `timeout`.
    ///
    /// End of stream marks the channel closed and returns
    /// [`ChannelError::Closed`].
    pub async fn recv_chunk(&mut self, timeout: Duration) -> Result<Bytes, ChannelError> {
        if !self.is_open {
            return Err(ChannelError::Closed);
        }

        self.scratch.clear();
        self.scratch.reserve(self.chunk_size);

        let read = {
            let mut limited = (&mut self.scratch).limit(self.chunk_size);
            tokio::time::timeout(timeout, self.stream.as_mut().read_buf(&mut limited)).await
        };

        let n = read.map_err(|_| ChannelError::Timeout(timeout))??;
        if n == 0 {
            self.is_open = false;
            return Err(ChannelError::Closed);
        }

        trace!("Received {} bytes", n);
        Ok(self.scratch.split().freeze())
    }

    /// Shut down the write half. Safe to call more than once.
    pub async fn shutdown(&mut self) -> Result<(), ChannelError> {
        if self.is_open {
            self.is_open = false;
            self.stream.as_mut().shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_send_line_appends_newline() {
        let mock = Builder::new().write(b"uname -a\n").build();
        let mut channel = PtyChannel::new(mock, DEFAULT_CHUNK_SIZE);
        channel.send_line("uname -a").await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_respects_chunk_size() {
        let mock = Builder::new().read(b"abcdefgh").build();
        let mut channel = PtyChannel::new(mock, 3);

        let mut collected = Vec::new();
        for _ in 0..3 {
            let chunk = channel.recv_chunk(Duration::from_secs(1)).await.unwrap();
            assert!(chunk.len() <= 3);
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"abcdefgh");
    }

    #[tokio::test]
    async fn test_eof_closes_channel() {
        let mock = Builder::new().read(b"bye").build();
        let mut channel = PtyChannel::new(mock, DEFAULT_CHUNK_SIZE);

        channel.recv_chunk(Duration::from_secs(1)).await.unwrap();
        let err = channel.recv_chunk(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ChannelError::Closed));
        assert!(!channel.is_open());
        assert!(matches!(channel.send(b"x").await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let mock = Builder::new().wait(Duration::from_secs(5)).build();
        let mut channel = PtyChannel::new(mock, DEFAULT_CHUNK_SIZE);

        let err = channel
            .recv_chunk(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Timeout(_)));
        assert!(channel.is_open());
    }
}
