//! # pd-transport: Dialer capability layer / 拨号能力层
//!
//! This crate is the bottom layer of the proxydial workspace. It defines
//! what it means to be "something that can establish a connection" and the
//! one way every caller and adapter is expected to invoke it.
//!
//! 这个 crate 是 proxydial 工作区的底层，定义了"可以建立连接的东西"的能力模型，
//! 以及所有调用方和适配器统一使用的拨号入口。
//!
//! ## Modules / 模块
//! - `dialer`: `Dialer` / `ContextDialer` capabilities, `DialError`, `IoStream`,
//!   the direct connector and the closure dialer / 拨号能力、错误类型与直连拨号器
//! - `context`: `DialContext`, a deadline plus a cancellation signal / 拨号上下文
//! - `dial`: `dial_safely`, the cancellation-safe dial primitive / 可取消的安全拨号
//! - `per_host`: routing between a default and a bypass dialer by host / 按主机分流
//! - `util`: address parsing and timeout helpers / 地址解析与超时工具
//! - `retry`: caller-side retry with backoff / 调用方重试
//! - `mem`: in-memory pipe dialer for tests / 内存管道拨号器
//!
//! ## Features
//! - `metrics`: count cancellation races and late connections closed by the
//!   supervisor / 统计取消竞争与迟到连接的回收
//!
//! ## Example
//! ```rust,no_run
//! use pd_transport::{dial_safely, DialContext, DirectDialer, Network, SharedDialer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! async fn example() -> Result<(), pd_transport::DialError> {
//!     let direct: SharedDialer = Arc::new(DirectDialer::new());
//!     let ctx = DialContext::background().with_timeout(Duration::from_secs(5));
//!     let _conn = dial_safely(&ctx, &direct, Network::Tcp, "example.com:443").await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod dial;
pub mod dialer;
pub mod mem;
pub mod per_host;
pub mod retry;
pub mod util;

pub use context::DialContext;
pub use dial::dial_safely;
pub use dialer::{
    AsyncReadWrite, ContextDialer, DialError, Dialer, DirectDialer, FnDialer, IoStream, Network,
    SharedDialer,
};
pub use per_host::PerHost;
pub use retry::RetryPolicy;
pub use util::{dial_with_timeout, dial_with_timeout_future, split_host_port};
