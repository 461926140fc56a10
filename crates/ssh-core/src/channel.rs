use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use crate::endpoint::Endpoint;

// Internal Result type alias for convenience
type Result<T> = crate::SshResult<T>;

/// Trait for byte streams that can back a logical channel.
pub trait ChannelStreamIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ChannelStreamIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// A bidirectional byte stream bound to one target, multiplexed over a transport session.
///
/// The channel is closed when the value is dropped, so ownership decides its lifetime:
/// whoever holds it last releases it on every exit path.
pub struct LogicalChannel {
    target: Endpoint,
    stream: Box<dyn ChannelStreamIo>,
}

impl LogicalChannel {
    pub fn new(target: Endpoint, stream: impl ChannelStreamIo + 'static) -> Self {
        Self {
            target,
            stream: Box::new(stream),
        }
    }

    pub fn target(&self) -> &Endpoint {
        &self.target
    }

    /// Half-close the write side, then release the channel.
    pub async fn close(mut self) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        self.stream.shutdown().await?;
        Ok(())
    }
}

impl Drop for LogicalChannel {
    fn drop(&mut self) {
        debug!(target = %self.target, "logical channel released");
    }
}

impl std::fmt::Debug for LogicalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalChannel").field("target", &self.target).finish_non_exhaustive()
    }
}

impl AsyncRead for LogicalChannel {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for LogicalChannel {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().stream).poll_shutdown(cx)
    }
}

/// Trait for sessions that can mint logical channels.
///
/// Implementations must allow concurrent `open_channel` calls; callers share one
/// session across every in-flight request.
#[async_trait]
pub trait ChannelOpener: Send + Sync + 'static {
    async fn open_channel(&self, target: &Endpoint) -> Result<LogicalChannel>;
}
