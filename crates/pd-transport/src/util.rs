//! # 传输层工具函数模块
//!
//! - `split_host_port`: 目标地址解析 (`host:port`, `[v6]:port`)
//! - `dial_with_timeout`: 带超时控制的安全拨号
//! - `dial_with_timeout_future`: 通用 Future 超时包装器
//!
//! Timeouts are clamped to 10 ms..60 s so a misconfigured value can neither
//! fail every dial instantly nor pin a caller for minutes.

use crate::context::DialContext;
use crate::dial::dial_safely;
use crate::dialer::{DialError, Dialer, IoStream, Network};
use std::sync::Arc;
use tokio::time::{timeout, Duration};

const MIN_TIMEOUT_MS: u64 = 10;
const MAX_TIMEOUT_MS: u64 = 60_000;

fn clamp_timeout(ms: u64) -> Duration {
    Duration::from_millis(ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
}

/// Split `addr` into host and port.
///
/// IPv6 literals must be bracketed (`[::1]:443`); the brackets are removed
/// from the returned host. A missing or non-numeric port, or an empty host
/// part left by a stray colon, is an `InvalidAddress` error.
///
/// Service names are not resolved: `example.com:http` is rejected here
/// rather than handed on to the dialer.
pub fn split_host_port(addr: &str) -> Result<(&str, u16), DialError> {
    let invalid = |reason: &str| DialError::InvalidAddress {
        addr: addr.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let end = rest.find(']').ok_or_else(|| invalid("missing ']'"))?;
        let host = &rest[..end];
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or_else(|| invalid("missing port"))?;
        (host, port)
    } else {
        let idx = addr.rfind(':').ok_or_else(|| invalid("missing port"))?;
        let host = &addr[..idx];
        if host.contains(':') {
            return Err(invalid("too many colons"));
        }
        (host, &addr[idx + 1..])
    };

    let port = port
        .parse::<u16>()
        .map_err(|_| invalid("invalid port"))?;
    Ok((host, port))
}

/// 带超时控制的拨号函数
///
/// Runs [`dial_safely`] under a context whose deadline is `ms` from now
/// (clamped to 10 ms..60 s).
///
/// ```rust,no_run
/// use pd_transport::{dial_with_timeout, DirectDialer, Network};
/// use std::sync::Arc;
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let dialer = Arc::new(DirectDialer::new());
///     let _stream = dial_with_timeout(&dialer, Network::Tcp, "example.com:80", 10_000).await?;
///     Ok(())
/// }
/// ```
pub async fn dial_with_timeout<D>(
    d: &Arc<D>,
    network: Network,
    addr: &str,
    ms: u64,
) -> Result<IoStream, DialError>
where
    D: Dialer + ?Sized + 'static,
{
    let ctx = DialContext::background().with_timeout(clamp_timeout(ms));
    dial_safely(&ctx, d, network, addr).await
}

/// 通用 Future 超时包装器
///
/// Same clamping as [`dial_with_timeout`]; an elapsed timer maps to
/// `DialError::DeadlineExceeded`.
pub async fn dial_with_timeout_future<F, T, E>(fut: F, ms: u64) -> Result<T, DialError>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<DialError>,
{
    match timeout(clamp_timeout(ms), fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => Err(DialError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_host() {
        assert_eq!(split_host_port("example.com:80").unwrap(), ("example.com", 80));
        assert_eq!(split_host_port("10.0.0.1:443").unwrap(), ("10.0.0.1", 443));
        assert_eq!(split_host_port(":8080").unwrap(), ("", 8080));
    }

    #[test]
    fn split_bracketed_v6() {
        assert_eq!(split_host_port("[::1]:53").unwrap(), ("::1", 53));
        assert_eq!(
            split_host_port("[fe80::1%eth0]:22").unwrap(),
            ("fe80::1%eth0", 22)
        );
    }

    #[test]
    fn split_rejects_malformed() {
        for bad in ["example.com", "::1:53", "[::1]53", "[::1", "host:port", "host:70000"] {
            let err = split_host_port(bad).unwrap_err();
            assert!(err.is_config(), "{bad} should be a config error");
        }
    }

    #[test]
    fn service_name_port_is_rejected() {
        match split_host_port("example.com:http") {
            Err(DialError::InvalidAddress { addr, .. }) => assert_eq!(addr, "example.com:http"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn future_timeout_maps_to_deadline() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), std::io::Error>(())
        };
        let err = dial_with_timeout_future(slow, 1).await.unwrap_err();
        assert!(matches!(err, DialError::DeadlineExceeded));
    }
}
