use crate::coordinator::NamingCoordinator;
use crate::error::BuildError;
use crate::naming::Namespace;
use crate::naming_client::NamingClient;
use std::collections::HashSet;
use std::net::SocketAddr;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_assignments_over_http_are_idempotent() {
    let running = NamingCoordinator::start(loopback(), "a").await.unwrap();
    let client = NamingClient::new(running.local_addr()).unwrap();

    let first = client
        .assign(Namespace::Class, &symbols(&["btn", "btn", "card"]))
        .await
        .unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first["btn"], "a1");
    assert_eq!(first["card"], "a2");

    let again = client.assign(Namespace::Class, &symbols(&["btn"])).await.unwrap();
    assert_eq!(again["btn"], "a1");

    let prop = client.assign(Namespace::Prop, &symbols(&["btn"])).await.unwrap();
    assert_eq!(prop["btn"], "a1");

    let stats = running.shutdown().await.unwrap();
    assert_eq!(stats.classes, 2);
    assert_eq!(stats.props, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_get_gap_free_ordinals() {
    let running = NamingCoordinator::start(loopback(), "p").await.unwrap();
    let addr = running.local_addr();

    let mut handles = Vec::new();
    for worker in 0..8 {
        handles.push(tokio::spawn(async move {
            let client = NamingClient::new(addr).unwrap();
            let mut names = Vec::new();
            for batch in 0..5 {
                let batch_symbols: Vec<String> = (0..4)
                    .map(|i| format!("s{}", (worker * 7 + batch * 3 + i) % 40))
                    .collect();
                names.push(client.assign(Namespace::Prop, &batch_symbols).await.unwrap());
            }
            names
        }));
    }

    let mut seen = std::collections::HashMap::new();
    for handle in handles {
        for assigned in handle.await.unwrap() {
            for (symbol, short) in assigned {
                let previous = seen.insert(symbol.clone(), short.clone());
                if let Some(previous) = previous {
                    assert_eq!(previous, short, "{symbol} changed its short name");
                }
            }
        }
    }

    let ordinals: HashSet<u32> = seen
        .values()
        .map(|short| short.trim_start_matches('p').parse().unwrap())
        .collect();
    assert_eq!(ordinals.len(), seen.len());
    assert_eq!(ordinals, (1..=seen.len() as u32).collect());

    let stats = running.shutdown().await.unwrap();
    assert_eq!(stats.props, seen.len());
}

#[tokio::test]
async fn test_unroutable_paths_are_not_found() {
    let running = NamingCoordinator::start(loopback(), "a").await.unwrap();
    let base = format!("http://{}", running.local_addr());

    for path in ["/ids/x", "/classes", "/"] {
        let response = reqwest::get(format!("{}{}", base, path)).await.unwrap();
        assert_eq!(response.status().as_u16(), 404, "{path}");
        assert_eq!(response.text().await.unwrap(), "Not found");
    }
    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_requests_after_shutdown_fail_at_transport() {
    let running = NamingCoordinator::start(loopback(), "a").await.unwrap();
    let client = NamingClient::new(running.local_addr()).unwrap();
    running.shutdown().await.unwrap();

    let err = client
        .assign(Namespace::Class, &symbols(&["late"]))
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::CoordinatorUnreachable(_)), "{err:?}");
}

#[tokio::test]
async fn test_run_serves_for_the_task_and_returns_its_result() {
    let mut endpoint = None;
    let value = NamingCoordinator::run(loopback(), "a", |addr| {
        endpoint = Some(addr);
        async move {
            let client = NamingClient::new(addr)?;
            let names = client.assign(Namespace::Class, &symbols(&["x"])).await?;
            Ok(names["x"].clone())
        }
    })
    .await
    .unwrap();
    assert_eq!(value, "a1");

    let client = NamingClient::new(endpoint.unwrap()).unwrap();
    assert!(client.assign(Namespace::Class, &symbols(&["y"])).await.is_err());
}

#[tokio::test]
async fn test_run_closes_after_failed_task() {
    let err = NamingCoordinator::run(loopback(), "a", |_addr| async {
        Err::<(), _>(BuildError::IsolatedExecutionFailure("unit failed".to_string()))
    })
    .await
    .unwrap_err();
    assert!(matches!(err, BuildError::IsolatedExecutionFailure(_)));
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let running = NamingCoordinator::start(loopback(), "a").await.unwrap();
    let err = NamingCoordinator::start(running.local_addr(), "a").await.err().unwrap();
    assert!(matches!(err, BuildError::Bind(_)));
    running.shutdown().await.unwrap();
}
