//! # Memory Transport Module / 内存传输模块
//!
//! This module provides a memory-pipe based dialer, primarily used for:
//! 该模块提供基于内存管道的拨号器实现，主要用于：
//! - Mocking proxy hops in unit and integration tests
//!   单元测试与集成测试中模拟代理跳点
//! - Exercising connection observers without real sockets
//!   在没有真实套接字的情况下测试连接观察者
//!
//! ## Design Philosophy / 设计理念
//! - **Zero Network**: Runs entirely in memory on `tokio::io::duplex`.
//!   **零网络**: 完全基于 `tokio::io::duplex` 在内存中运行。
//! - **Reusable**: Every dial yields a fresh pipe; the server half is
//!   delivered to the test through a channel together with the requested
//!   network and address.
//!   **可重复使用**: 每次拨号都会产生新的管道，服务端一侧通过通道交付。
//! - **Refusal on demand**: Once the receiving side is dropped, dials fail
//!   with `ConnectionRefused`, like a listener that went away.
//!   **按需拒绝**: 接收端被丢弃后，拨号返回 `ConnectionRefused`。

use crate::context::DialContext;
use crate::dialer::{ContextDialer, DialError, Dialer, IoStream, Network};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{duplex, DuplexStream};
use tokio::sync::mpsc;

/// Default in-memory buffer per pipe direction.
/// 默认的管道缓冲区大小。
pub const PIPE_BUFFER: usize = 4096;

/// Server side of one dialled pipe.
/// 一次拨号产生的服务端流。
#[derive(Debug)]
pub struct PipeAccept {
    pub network: Network,
    pub addr: String,
    pub stream: DuplexStream,
}

/// Memory pipe dialer / 内存管道拨号器
///
/// Satisfies both capabilities. The counters tell tests which path a
/// caller took.
#[derive(Debug)]
pub struct PipeDialer {
    accepts: mpsc::UnboundedSender<PipeAccept>,
    buffer: usize,
    blocking: AtomicUsize,
    contextual: AtomicUsize,
}

impl PipeDialer {
    /// Create a dialer and the receiver its server halves arrive on.
    /// 创建拨号器及其服务端接收通道。
    pub fn new_pair() -> (Self, mpsc::UnboundedReceiver<PipeAccept>) {
        Self::with_buffer(PIPE_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> (Self, mpsc::UnboundedReceiver<PipeAccept>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                accepts: tx,
                buffer,
                blocking: AtomicUsize::new(0),
                contextual: AtomicUsize::new(0),
            },
            rx,
        )
    }

    /// Number of dials that arrived through the blocking capability.
    pub fn blocking_dials(&self) -> usize {
        self.blocking.load(Ordering::Relaxed)
    }

    /// Number of dials that arrived through the context capability.
    pub fn context_dials(&self) -> usize {
        self.contextual.load(Ordering::Relaxed)
    }

    fn open(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        let (client, server) = duplex(self.buffer);
        self.accepts
            .send(PipeAccept {
                network,
                addr: addr.to_owned(),
                stream: server,
            })
            .map_err(|_| {
                DialError::op(
                    network,
                    addr,
                    std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into(),
                )
            })?;
        Ok(Box::new(client))
    }
}

impl Dialer for PipeDialer {
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        self.blocking.fetch_add(1, Ordering::Relaxed);
        self.open(network, addr)
    }

    fn as_context_dialer(&self) -> Option<&dyn ContextDialer> {
        Some(self)
    }
}

#[async_trait]
impl ContextDialer for PipeDialer {
    async fn dial_context(
        &self,
        ctx: &DialContext,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError> {
        self.contextual.fetch_add(1, Ordering::Relaxed);
        if let Some(e) = ctx.err() {
            return Err(e);
        }
        self.open(network, addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn pipe_carries_bytes_both_ways() {
        let (dialer, mut accepts) = PipeDialer::new_pair();
        let mut client = dialer.dial(Network::Tcp, "example.com:80").unwrap();
        let mut accept = accepts.recv().await.unwrap();
        assert_eq!(accept.addr, "example.com:80");
        assert_eq!(accept.network, Network::Tcp);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        accept.stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        accept.stream.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
        assert_eq!(dialer.blocking_dials(), 1);
    }

    #[tokio::test]
    async fn refuses_after_receiver_dropped() {
        let (dialer, accepts) = PipeDialer::new_pair();
        drop(accepts);
        let err = dialer
            .dial_context(&DialContext::background(), Network::Tcp, "a:1")
            .await
            .err()
            .unwrap();
        match err.root() {
            DialError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionRefused),
            other => panic!("unexpected {other:?}"),
        }
    }
}
