//! # 拨号器能力模型 / Dialer capability model
//!
//! This module defines the two connection-establishing capabilities every
//! dialer in the chain must satisfy:
//! - [`Dialer`]: the blocking capability, `dial(network, addr)`
//! - [`ContextDialer`]: the cancellation-aware refinement, `dial_context(ctx, network, addr)`
//!
//! plus the shared vocabulary used across the workspace:
//! - [`DialError`]: 拨号过程中可能出现的错误类型
//! - [`IoStream`]: 统一的异步 IO 流类型别名 (the Connection)
//! - [`Network`]: the stream network kinds a dial may request
//! - [`DirectDialer`]: 直连拨号器, the bottom of every forwarding chain
//! - [`FnDialer`]: 基于闭包的阻塞拨号器

use crate::context::DialContext;
use crate::util::split_host_port;
use async_trait::async_trait;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

/// 拨号过程中可能出现的错误类型
///
/// Configuration errors (`UnknownNetwork`, `InvalidAddress`) are not worth
/// retrying; cancellation errors (`Canceled`, `DeadlineExceeded`) are kept
/// distinct from network failures so callers can tell "your deadline passed"
/// from "the network failed".
#[derive(Debug, Error)]
pub enum DialError {
    /// IO 错误：底层网络 IO 操作失败
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The context's cancellation signal fired before the dial completed.
    #[error("context canceled")]
    Canceled,

    /// The context's deadline passed before the dial completed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The requested network kind is not a stream network this library knows.
    #[error("unknown network {0}")]
    UnknownNetwork(String),

    /// The destination is not a well-formed `host:port`.
    #[error("invalid address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// A dial against `addr` failed; `source` is the underlying cause.
    #[error("dial {network} {addr}: {source}")]
    Op {
        network: Network,
        addr: String,
        #[source]
        source: Box<DialError>,
    },

    /// 不支持的操作：当前拨号器不支持请求的操作
    #[error("not supported")]
    NotSupported,

    /// 其他错误
    #[error("other: {0}")]
    Other(String),
}

impl DialError {
    /// Tag `source` with the network and address that failed.
    ///
    /// Errors that already carry an address, and cancellation errors, are
    /// returned unchanged so the chain never double-wraps.
    pub fn op(network: Network, addr: impl Into<String>, source: DialError) -> Self {
        match source {
            e @ (DialError::Op { .. } | DialError::Canceled | DialError::DeadlineExceeded) => e,
            other => DialError::Op {
                network,
                addr: addr.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost cause, looking through `Op` tags.
    pub fn root(&self) -> &DialError {
        match self {
            DialError::Op { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error means the caller's context ended the wait.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self.root(),
            DialError::Canceled | DialError::DeadlineExceeded
        )
    }

    /// Whether this is a configuration error (bad network or address).
    pub fn is_config(&self) -> bool {
        matches!(
            self.root(),
            DialError::UnknownNetwork(_) | DialError::InvalidAddress { .. }
        )
    }
}

/// 将 tokio 超时错误统一映射为 `DialError::DeadlineExceeded`
impl From<tokio::time::error::Elapsed> for DialError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DialError::DeadlineExceeded
    }
}

/// Stream network kinds. Names follow the usual `tcp`/`tcp4`/`tcp6` spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Tcp,
    Tcp4,
    Tcp6,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }

    /// Whether a resolved address belongs to this network's address family.
    pub fn admits(&self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = DialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(DialError::UnknownNetwork(other.to_string())),
        }
    }
}

/// 异步读写 trait 标记
pub trait AsyncReadWrite: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}

impl<T> AsyncReadWrite for T where T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}

/// The Connection: a boxed bidirectional byte stream.
///
/// Ownership passes to whoever receives it from a dial; dropping it closes
/// the underlying socket.
pub type IoStream = Box<dyn AsyncReadWrite + 'static>;

/// Shared handle to a dialer. The same underlying dialer may sit below any
/// number of composed dialers.
pub type SharedDialer = Arc<dyn Dialer>;

/// 阻塞拨号器 trait
///
/// `dial` may block the calling thread for as long as the underlying
/// connection attempt takes. Call sites on an async runtime should go
/// through [`crate::dial_safely`], which runs the blocking path off the
/// runtime and honours cancellation.
///
/// Dialers that can also honour a [`DialContext`] natively override
/// [`Dialer::as_context_dialer`]; callers check it at composition time and
/// prefer it when present.
pub trait Dialer: Send + Sync {
    /// Connect to `addr` over `network`, blocking until the attempt resolves.
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError>;

    /// The cancellation-aware view of this dialer, if it has one.
    fn as_context_dialer(&self) -> Option<&dyn ContextDialer> {
        None
    }
}

/// Cancellation-aware refinement of [`Dialer`].
///
/// Implementations must return a connection only once their handshake fully
/// succeeded, and must close any partially established connection before
/// returning an error (dropping it is enough).
#[async_trait]
pub trait ContextDialer: Dialer {
    async fn dial_context(
        &self,
        ctx: &DialContext,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError>;
}

impl<D> Dialer for Arc<D>
where
    D: Dialer + ?Sized,
{
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        (**self).dial(network, addr)
    }

    fn as_context_dialer(&self) -> Option<&dyn ContextDialer> {
        (**self).as_context_dialer()
    }
}

/// 直连拨号器
///
/// Makes network connections directly. The blocking path uses `std::net`
/// (with an optional connect timeout) and then registers the socket with
/// the current tokio runtime; the context path uses `tokio::net` raced
/// against the context.
///
/// Addresses are handed to the system resolver verbatim and every resolved
/// address admitted by the requested network is tried in order.
#[derive(Debug, Clone, Default)]
pub struct DirectDialer {
    /// Per-address connect timeout for the blocking path.
    pub connect_timeout: Option<Duration>,
    /// Set `TCP_NODELAY` on established connections.
    pub nodelay: bool,
}

impl DirectDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    fn dial_blocking(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        let (host, port) = split_host_port(addr)?;
        // from_std needs a reactor; fail cleanly instead of panicking.
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(DialError::Other(
                "direct dial requires a tokio runtime context".into(),
            ));
        }

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()?
            .filter(|a| network.admits(a))
            .collect();
        if addrs.is_empty() {
            return Err(DialError::Other("no addresses found".into()));
        }

        let mut last_error = DialError::Other("no addresses provided".into());
        for sa in addrs {
            let attempt = match self.connect_timeout {
                Some(t) => std::net::TcpStream::connect_timeout(&sa, t),
                None => std::net::TcpStream::connect(sa),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_nonblocking(true)?;
                    stream.set_nodelay(self.nodelay)?;
                    debug!("Successfully connected to {}", sa);
                    return Ok(Box::new(TcpStream::from_std(stream)?));
                }
                Err(e) => {
                    debug!("Failed to connect to {}: {}", sa, e);
                    last_error = DialError::from(e);
                }
            }
        }
        Err(last_error)
    }

    async fn resolve_and_connect(
        &self,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError> {
        let (host, port) = split_host_port(addr)?;
        let addrs: Vec<SocketAddr> = lookup_host((host, port))
            .await?
            .filter(|a| network.admits(a))
            .collect();
        if addrs.is_empty() {
            return Err(DialError::Other("no addresses found".into()));
        }
        self.try_connect_addrs(&addrs).await
    }

    /// 尝试连接地址列表中的第一个可用地址
    async fn try_connect_addrs(&self, addrs: &[SocketAddr]) -> Result<IoStream, DialError> {
        let mut last_error = DialError::Other("no addresses provided".into());

        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    debug!("Successfully connected to {}", addr);
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    debug!("Failed to connect to {}: {}", addr, e);
                    last_error = DialError::from(e);
                }
            }
        }

        Err(last_error)
    }
}

impl Dialer for DirectDialer {
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        self.dial_blocking(network, addr)
            .map_err(|e| DialError::op(network, addr, e))
    }

    fn as_context_dialer(&self) -> Option<&dyn ContextDialer> {
        Some(self)
    }
}

#[async_trait]
impl ContextDialer for DirectDialer {
    async fn dial_context(
        &self,
        ctx: &DialContext,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError> {
        ctx.run(self.resolve_and_connect(network, addr))
            .await
            .map_err(|e| DialError::op(network, addr, e))
    }
}

/// 基于闭包的阻塞拨号器
///
/// Wraps a blocking closure as a [`Dialer`] without the cancellation-aware
/// refinement. Handy for thin adapters and for tests that need a dialer
/// exercising the fallback path of [`crate::dial_safely`].
///
/// ```rust,no_run
/// use pd_transport::{DialError, FnDialer, IoStream, Network};
///
/// let refuse = FnDialer::new(|_network: Network, _addr: &str| -> Result<IoStream, DialError> {
///     Err(DialError::NotSupported)
/// });
/// ```
pub struct FnDialer<F> {
    inner: Arc<F>,
}

impl<F> Clone for FnDialer<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F> FnDialer<F> {
    pub fn new(f: F) -> Self {
        Self { inner: Arc::new(f) }
    }
}

impl<F> Dialer for FnDialer<F>
where
    F: Fn(Network, &str) -> Result<IoStream, DialError> + Send + Sync,
{
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        (self.inner)(network, addr)
    }
}
