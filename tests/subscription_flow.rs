// Integration tests for the subscription lifecycle

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{StreamExt, future};
use refetch::prelude::*;
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};

async fn wait_settled(subscription: &FetchSubscription<Value>) {
    timeout(Duration::from_secs(1), async {
        while subscription.is_loading() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("fetch should settle");
}

fn delayed_fetcher(value: Value, delay: Duration) -> Fetcher<Value> {
    fetcher_fn(move |_route, _headers| {
        let value = value.clone();
        async move {
            sleep(delay).await;
            Ok(value)
        }
    })
}

#[tokio::test]
async fn test_subscription_serves_initial_value_then_fetched_value() {
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(
            OptionsPatch::new()
                .fetcher(delayed_fetcher(json!({"v": 1}), Duration::from_millis(30)))
                .initial_value(json!(null)),
        )
        .build()
        .expect("no persistence configured");

    let subscription = provider.subscribe("/x", None);
    assert!(subscription.is_loading());
    assert!(!subscription.has_error());
    assert_eq!(subscription.data(), json!(null));

    wait_settled(&subscription).await;
    assert!(!subscription.is_loading());
    assert!(!subscription.has_error());
    assert_eq!(subscription.data(), json!({"v": 1}));
}

#[tokio::test]
async fn test_late_subscriber_sees_warm_cache_immediately() {
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(
            OptionsPatch::new()
                .fetcher(delayed_fetcher(json!({"v": 1}), Duration::from_millis(20)))
                .initial_value(json!(null)),
        )
        .build()
        .expect("no persistence configured");

    let first = provider.subscribe("/x", None);
    wait_settled(&first).await;

    // The warm value is visible before the second controller settles; the
    // new subscription still revalidates on its own.
    let second = provider.subscribe("/x", None);
    assert_eq!(second.data(), json!({"v": 1}));
    assert!(second.is_loading());

    wait_settled(&second).await;
    assert_eq!(second.data(), json!({"v": 1}));
}

#[tokio::test]
async fn test_fetch_error_surfaces_only_as_state() {
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(
            OptionsPatch::new()
                .fetcher(fetcher_fn(|_route, _headers| async {
                    Err(FetchError::Response("500 oops".to_string()))
                }))
                .initial_value(json!("fallback")),
        )
        .build()
        .expect("no persistence configured");

    let subscription = provider.subscribe("/x", None);
    wait_settled(&subscription).await;

    assert!(subscription.has_error());
    assert!(!subscription.is_loading());
    // The cache is never written on failure; data falls back.
    assert_eq!(subscription.data(), json!("fallback"));
    assert_eq!(provider.cache().read("/x"), None);
}

#[tokio::test]
async fn test_dependencies_gate_the_lifecycle() {
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(
            OptionsPatch::new()
                .fetcher(fetcher_fn(|_route, _headers| async { Ok(json!(7)) }))
                .initial_value(json!(null)),
        )
        .build()
        .expect("no persistence configured");

    let subscription = provider.subscribe(
        "/x",
        Some(OptionsPatch::new().dependencies(vec![false, true])),
    );
    assert_eq!(subscription.state(), LifecycleState::Idle);
    assert_eq!(subscription.data(), json!(null));

    subscription.set_dependencies(&[true, true]);
    wait_settled(&subscription).await;
    assert_eq!(subscription.data(), json!(7));

    // A false entry forces Idle; the committed cache value stays readable.
    subscription.set_dependencies(&[true, false]);
    assert_eq!(subscription.state(), LifecycleState::Idle);
    assert_eq!(subscription.data(), json!(7));
}

#[tokio::test]
async fn test_refresh_coalesces_before_settlement() {
    let calls = Arc::new(AtomicUsize::new(0));
    let stalled = {
        let calls = calls.clone();
        fetcher_fn(move |_route, _headers| {
            calls.fetch_add(1, Ordering::SeqCst);
            future::pending::<Result<Value, FetchError>>()
        })
    };
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(OptionsPatch::new().fetcher(stalled))
        .build()
        .expect("no persistence configured");

    let subscription = provider.subscribe("/x", None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for _ in 0..5 {
        subscription.refresh();
    }

    // The initial dispatch plus exactly one refresh-initiated dispatch.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_superseded_dispatch_never_overwrites_newer_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let racing = {
        let calls = calls.clone();
        fetcher_fn(move |_route, _headers| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    sleep(Duration::from_millis(150)).await;
                    Ok(json!("g1"))
                } else {
                    Ok(json!("g2"))
                }
            }
        })
    };
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(OptionsPatch::new().fetcher(racing))
        .build()
        .expect("no persistence configured");

    let subscription = provider.subscribe("/x", None);
    subscription.refresh();

    wait_settled(&subscription).await;
    assert_eq!(subscription.data(), json!("g2"));

    // The slow first generation settles afterwards and must be discarded.
    sleep(Duration::from_millis(250)).await;
    assert_eq!(subscription.data(), json!("g2"));
    assert!(!subscription.has_error());
}

#[tokio::test]
async fn test_set_route_switches_data_source() {
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(OptionsPatch::new().fetcher(fetcher_fn(
            |route: String, _headers| async move {
                Ok(if route == "/a" { json!(1) } else { json!(2) })
            },
        )))
        .build()
        .expect("no persistence configured");

    let subscription = provider.subscribe("/a", None);
    wait_settled(&subscription).await;
    assert_eq!(subscription.data(), json!(1));

    subscription.set_route("/b");
    wait_settled(&subscription).await;
    assert_eq!(subscription.data(), json!(2));
}

#[tokio::test]
async fn test_sibling_commit_wakes_watchers() {
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(
            OptionsPatch::new()
                .fetcher(delayed_fetcher(json!({"v": 1}), Duration::from_millis(20)))
                .initial_value(json!(null)),
        )
        .build()
        .expect("no persistence configured");

    // Gated watcher: never fetches on its own.
    let watcher = provider.subscribe("/x", Some(OptionsPatch::new().dependencies(vec![false])));
    assert_eq!(watcher.state(), LifecycleState::Idle);
    let mut changes = watcher.changes();

    let active = provider.subscribe("/x", None);
    wait_settled(&active).await;

    let snapshot = timeout(Duration::from_secs(1), changes.next())
        .await
        .expect("watcher should be notified of the sibling commit")
        .expect("change stream should stay open");
    assert_eq!(snapshot.data, json!({"v": 1}));
    assert!(!snapshot.is_loading);
    assert!(!snapshot.has_error);
}

#[tokio::test]
async fn test_drop_discards_inflight_result() {
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(
            OptionsPatch::new().fetcher(delayed_fetcher(json!(1), Duration::from_millis(40))),
        )
        .build()
        .expect("no persistence configured");

    let subscription = provider.subscribe("/x", None);
    drop(subscription);

    sleep(Duration::from_millis(120)).await;
    assert_eq!(provider.cache().read("/x"), None);
}

#[tokio::test]
async fn test_snapshot_is_one_consistent_read() {
    let provider: FetchProvider<Value> = FetchProvider::builder()
        .global_options(
            OptionsPatch::new()
                .fetcher(delayed_fetcher(json!(42), Duration::from_millis(20)))
                .initial_value(json!(null)),
        )
        .build()
        .expect("no persistence configured");

    let subscription = provider.subscribe("/x", None);
    let snapshot = subscription.snapshot();
    assert!(snapshot.is_loading);
    assert!(!snapshot.has_error);
    assert_eq!(snapshot.data, json!(null));

    wait_settled(&subscription).await;
    let snapshot = subscription.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.data, json!(42));
}
