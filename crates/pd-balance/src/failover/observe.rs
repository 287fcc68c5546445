//! Connection observation / 连接观测
//!
//! A failover dial only proves that a handshake completed. Whether the
//! candidate actually works is learned later, from the connection itself:
//!
//! - the first read that yields data reports success, once;
//! - a read error or an early EOF marks the connection as failed;
//! - on drop, a connection that failed before ever yielding data reports
//!   failure.
//!
//! Each connection reports at most one outcome. Writes and shutdown pass
//! through untouched.

use super::feedback::FeedbackHandle;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Stream wrapper that feeds read outcomes back to a failover group.
pub struct ObservedConn<S> {
    inner: S,
    feedback: FeedbackHandle,
    succeeded: bool,
    read_failed: bool,
}

impl<S> ObservedConn<S> {
    pub fn new(inner: S, feedback: FeedbackHandle) -> Self {
        Self {
            inner,
            feedback,
            succeeded: false,
            read_failed: false,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn candidate(&self) -> usize {
        self.feedback.candidate()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ObservedConn<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let res = Pin::new(&mut this.inner).poll_read(cx, buf);
        match &res {
            Poll::Ready(Ok(())) => {
                if buf.filled().len() > before {
                    if !this.succeeded {
                        this.succeeded = true;
                        this.feedback.success();
                    }
                } else if buf.remaining() > 0 {
                    // EOF
                    this.read_failed = true;
                }
            }
            Poll::Ready(Err(_)) => this.read_failed = true,
            Poll::Pending => {}
        }
        res
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ObservedConn<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

impl<S> Drop for ObservedConn<S> {
    fn drop(&mut self) {
        if !self.succeeded && self.read_failed {
            self.feedback.failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failover::feedback::testing::{handle, recorder};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn first_data_reports_success_once() {
        let rec = recorder();
        let (client, mut server) = duplex(64);
        let mut conn = ObservedConn::new(client, handle(&rec, 1));

        server.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 2];
        conn.read_exact(&mut buf).await.unwrap();
        conn.read_exact(&mut buf).await.unwrap();
        drop(server);
        let mut rest = Vec::new();
        conn.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"o");
        drop(conn);

        assert_eq!(rec.lock().events, vec![(1, true)]);
    }

    #[tokio::test]
    async fn eof_before_data_reports_failure_on_drop() {
        let rec = recorder();
        let (client, server) = duplex(64);
        let mut conn = ObservedConn::new(client, handle(&rec, 0));
        drop(server);

        let mut buf = [0u8; 8];
        assert_eq!(conn.read(&mut buf).await.unwrap(), 0);
        assert!(rec.lock().events.is_empty(), "reported only at close");
        drop(conn);
        assert_eq!(rec.lock().events, vec![(0, false)]);
    }

    #[tokio::test]
    async fn unused_connection_reports_nothing() {
        let rec = recorder();
        let (client, _server) = duplex(64);
        let mut conn = ObservedConn::new(client, handle(&rec, 0));
        conn.write_all(b"ping").await.unwrap();
        conn.shutdown().await.unwrap();
        drop(conn);
        assert!(rec.lock().events.is_empty());
    }

    #[tokio::test]
    async fn writes_pass_through() {
        let rec = recorder();
        let (client, mut server) = duplex(64);
        let mut conn = ObservedConn::new(client, handle(&rec, 3));
        conn.write_all(b"abc").await.unwrap();
        let mut buf = [0u8; 3];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abc");
        assert_eq!(conn.candidate(), 3);
    }
}
