//! # Cancellation-safe dialing / 可取消的安全拨号
//!
//! [`dial_safely`] is the single entry point every adapter and caller uses
//! instead of calling a dialer directly:
//!
//! - A dialer exposing [`ContextDialer`](crate::ContextDialer) is delegated to; cancellation,
//!   deadline and error propagation are native.
//! - Otherwise the blocking [`Dialer::dial`] runs on the blocking pool and
//!   is raced against the context. If the context wins, the caller gets the
//!   context error at once. The blocking dial cannot be aborted, so a
//!   supervising task waits for it and closes any connection that arrives
//!   late; the supervisor exits as soon as the blocking call returns.
//!
//! The caller always receives exactly one of a connection or an error.

use crate::context::DialContext;
use crate::dialer::{DialError, Dialer, IoStream, Network};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Dial `addr` through `dialer`, honouring `ctx` even when the dialer only
/// offers the blocking capability.
pub async fn dial_safely<D>(
    ctx: &DialContext,
    dialer: &Arc<D>,
    network: Network,
    addr: &str,
) -> Result<IoStream, DialError>
where
    D: Dialer + ?Sized + 'static,
{
    if let Some(cd) = dialer.as_context_dialer() {
        return cd.dial_context(ctx, network, addr).await;
    }

    // Nothing to race: do not start a blocking dial nobody will wait for.
    if let Some(e) = ctx.err() {
        return Err(e);
    }

    let d = Arc::clone(dialer);
    let target = addr.to_owned();
    let mut task = tokio::task::spawn_blocking(move || d.dial(network, &target));

    tokio::select! {
        biased;
        out = &mut task => flatten(out),
        reason = ctx.done() => {
            debug!(%network, addr, error = %reason, "dial abandoned by context; supervising blocking dial");
            #[cfg(feature = "metrics")]
            metrics::counter!("dial_safely_cancelled_total").increment(1);
            supervise(task, network, addr.to_owned());
            Err(reason)
        }
    }
}

/// Close whatever the abandoned blocking dial eventually produces.
fn supervise(
    task: JoinHandle<Result<IoStream, DialError>>,
    network: Network,
    addr: String,
) {
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(conn)) => {
                drop(conn);
                debug!(%network, %addr, "closed connection that arrived after cancellation");
                #[cfg(feature = "metrics")]
                metrics::counter!("dial_safely_late_conn_closed_total").increment(1);
            }
            Ok(Err(e)) => {
                debug!(%network, %addr, error = %e, "abandoned blocking dial failed");
            }
            Err(e) => {
                debug!(%network, %addr, error = %e, "abandoned blocking dial did not complete");
            }
        }
    });
}

fn flatten(
    out: Result<Result<IoStream, DialError>, tokio::task::JoinError>,
) -> Result<IoStream, DialError> {
    match out {
        Ok(r) => r,
        Err(e) => Err(DialError::Other(format!("blocking dial task failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::FnDialer;
    use crate::mem::PipeDialer;

    #[tokio::test]
    async fn blocking_error_is_returned_verbatim() {
        let d = Arc::new(FnDialer::new(
            |_n: Network, _a: &str| -> Result<IoStream, DialError> { Err(DialError::NotSupported) },
        ));
        let err = dial_safely(&DialContext::background(), &d, Network::Tcp, "x:1")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DialError::NotSupported));
    }

    #[tokio::test]
    async fn context_dialer_is_preferred() {
        let (pipe, mut servers) = PipeDialer::new_pair();
        let d = Arc::new(pipe);
        let _conn = dial_safely(&DialContext::background(), &d, Network::Tcp, "x:1")
            .await
            .unwrap();
        assert_eq!(servers.recv().await.unwrap().addr, "x:1");
        assert_eq!(d.context_dials(), 1);
        assert_eq!(d.blocking_dials(), 0);
    }
}
