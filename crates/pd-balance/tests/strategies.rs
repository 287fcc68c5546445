use pd_balance::{BalanceError, StrategyRegistry, FAILOVER, RANDOM, ROUND_ROBIN};
use pd_transport::mem::{PipeAccept, PipeDialer};
use pd_transport::{dial_safely, DialContext, Dialer, Network, SharedDialer};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

fn pipes(n: usize) -> (Vec<SharedDialer>, Vec<UnboundedReceiver<PipeAccept>>) {
    (0..n)
        .map(|_| {
            let (d, rx) = PipeDialer::new_pair();
            (Arc::new(d) as SharedDialer, rx)
        })
        .unzip()
}

/// Index of the single receiver holding a pending accept.
fn who_accepted(accepts: &mut [UnboundedReceiver<PipeAccept>]) -> usize {
    let hits: Vec<usize> = accepts
        .iter_mut()
        .enumerate()
        .filter_map(|(i, rx)| rx.try_recv().ok().map(|_| i))
        .collect();
    assert_eq!(hits.len(), 1, "exactly one candidate should be dialled");
    hits[0]
}

#[tokio::test]
async fn round_robin_visits_in_cyclic_order() {
    let registry = StrategyRegistry::with_builtins();
    let (dialers, mut accepts) = pipes(3);
    let rr = registry.build(ROUND_ROBIN, dialers).unwrap();
    let ctx = DialContext::background();

    let mut order = Vec::new();
    for _ in 0..7 {
        dial_safely(&ctx, &rr, Network::Tcp, "up:80").await.unwrap();
        order.push(who_accepted(&mut accepts));
    }
    assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn round_robin_blocking_path_shares_the_cursor() {
    let registry = StrategyRegistry::with_builtins();
    let (dialers, mut accepts) = pipes(2);
    let rr = registry.build(ROUND_ROBIN, dialers).unwrap();

    let order: Vec<usize> = (0..4)
        .map(|_| {
            rr.dial(Network::Tcp, "up:80").unwrap();
            who_accepted(&mut accepts)
        })
        .collect();
    assert_eq!(order, vec![0, 1, 0, 1]);
}

#[tokio::test]
async fn random_reaches_every_candidate() {
    let registry = StrategyRegistry::with_builtins();
    let (dialers, mut accepts) = pipes(4);
    let random = registry.build(RANDOM, dialers).unwrap();
    let ctx = DialContext::background();

    let mut hits = [0usize; 4];
    for _ in 0..400 {
        dial_safely(&ctx, &random, Network::Tcp, "up:80").await.unwrap();
        hits[who_accepted(&mut accepts)] += 1;
    }
    assert_eq!(hits.iter().sum::<usize>(), 400);
    assert!(hits.iter().all(|&h| h > 0), "{hits:?}");
}

#[tokio::test]
async fn strategies_compose() {
    let registry = StrategyRegistry::with_builtins();
    let (inner, mut accepts) = pipes(2);
    let rr = registry.build(ROUND_ROBIN, inner).unwrap();
    let (spare, _spare_accepts) = pipes(1);
    let mut outer = vec![rr];
    outer.extend(spare);
    let fo = registry.build(FAILOVER, outer).unwrap();
    let ctx = DialContext::background();

    for expected in [0, 1, 0] {
        dial_safely(&ctx, &fo, Network::Tcp, "up:80").await.unwrap();
        assert_eq!(who_accepted(&mut accepts), expected);
    }
}

#[tokio::test]
async fn custom_strategy_is_a_first_class_citizen() {
    let registry = StrategyRegistry::with_builtins();
    registry.register(
        "last",
        |dialers: Vec<SharedDialer>| -> Result<SharedDialer, BalanceError> {
            dialers
                .into_iter()
                .last()
                .ok_or(BalanceError::NoDialers { strategy: "last" })
        },
    );
    assert_eq!(registry.names(), vec!["failover", "last", "random", "roundrobin"]);

    let (dialers, mut accepts) = pipes(3);
    let last = registry.build("last", dialers).unwrap();
    dial_safely(&DialContext::background(), &last, Network::Tcp, "up:80")
        .await
        .unwrap();
    assert_eq!(who_accepted(&mut accepts), 2);
    assert!(registry.build("last", Vec::new()).is_err());
}

#[test]
fn registries_are_isolated() {
    let a = StrategyRegistry::new();
    let b = StrategyRegistry::with_builtins();
    a.register_strategy(RANDOM, b.lookup(RANDOM).unwrap());
    assert_eq!(a.names(), vec!["random"]);
    assert_eq!(b.names().len(), 3);
    assert!(matches!(
        a.build(FAILOVER, Vec::new()).err().unwrap(),
        BalanceError::UnknownStrategy(_)
    ));
}

#[test]
fn concurrent_registration_and_lookup() {
    let registry = Arc::new(StrategyRegistry::with_builtins());
    let writers: Vec<_> = (0..4)
        .map(|t| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    let strategy = registry.lookup(ROUND_ROBIN).unwrap();
                    registry.register_strategy(format!("rr-{t}-{i}"), strategy);
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    assert!(registry.lookup(FAILOVER).is_some());
                    assert!(registry.lookup("missing").is_none());
                }
            })
        })
        .collect();
    for h in writers.into_iter().chain(readers) {
        h.join().unwrap();
    }
    assert_eq!(registry.names().len(), 3 + 4 * 100);
}
