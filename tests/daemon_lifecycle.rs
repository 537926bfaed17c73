mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{interrupts, is_reachable, start_daemon, test_config, StepRecorder};
use tempfile::TempDir;
use threadsd::config::{load_config_from, ConfigError};
use threadsd::lifecycle::{run_until_interrupt, Daemon, LifecycleState, Outcome};
use threadsd::net::addr::tcp_socket_addr;
use tracing_subscriber::layer::SubscriberExt;

#[tokio::test]
async fn test_startup_binds_every_listener() {
    let repo = TempDir::new().unwrap();
    let daemon = start_daemon(&repo, &[]).await;

    assert!(!daemon.peer_id().to_string().is_empty());
    let addrs = daemon.addrs().clone();
    assert!(!addrs.host.is_empty());

    let host = tcp_socket_addr(&addrs.host[0]).unwrap();
    assert!(is_reachable(host).await);
    assert!(is_reachable(addrs.rpc).await);
    assert!(is_reachable(addrs.bridge).await);
    assert!(is_reachable(addrs.gateway).await);

    daemon.shutdown().await.unwrap();

    assert!(!is_reachable(addrs.rpc).await);
    assert!(!is_reachable(addrs.bridge).await);
    assert!(!is_reachable(addrs.gateway).await);
}

#[tokio::test]
async fn test_identity_persists_across_restarts() {
    let repo = TempDir::new().unwrap();

    let first = start_daemon(&repo, &[]).await;
    let peer_id = first.peer_id();
    first.shutdown().await.unwrap();

    let second = start_daemon(&repo, &[]).await;
    assert_eq!(second.peer_id(), peer_id);
    second.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_mongo_uri_without_database_is_rejected() {
    let result = load_config_from([
        "threadsd",
        "--mongoUri=mongodb://127.0.0.1:27017",
        "--gatewayAddr=127.0.0.1:0",
    ]);
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[tokio::test]
async fn test_occupied_port_fails_startup_and_releases_the_rest() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let gateway = format!("--gatewayAddr=127.0.0.1:{port}");

    let repo = TempDir::new().unwrap();
    let config = test_config(&repo, &[gateway.as_str()]);
    assert!(Daemon::start(&config).await.is_err());

    // The datastore was closed on rollback, so a fresh daemon can reopen it.
    drop(taken);
    let daemon = start_daemon(&repo, &[]).await;
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_interrupt_runs_orderly_shutdown() {
    let repo = TempDir::new().unwrap();
    let daemon = start_daemon(&repo, &[]).await;
    let addrs = daemon.addrs().clone();
    let mut state = daemon.state();

    let (tx, mut signals) = interrupts();
    let forced = Arc::new(AtomicBool::new(false));
    let flag = forced.clone();
    let run = tokio::spawn(async move {
        run_until_interrupt(daemon, &mut signals, move || flag.store(true, Ordering::SeqCst)).await
    });

    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == LifecycleState::Stopping))
        .await
        .unwrap()
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), run).await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::Stopped));
    assert!(!forced.load(Ordering::SeqCst));

    assert!(!is_reachable(addrs.rpc).await);
    assert!(!is_reachable(addrs.bridge).await);
    assert!(!is_reachable(addrs.gateway).await);
}

#[tokio::test]
async fn test_second_interrupt_forces_exit() {
    let repo = TempDir::new().unwrap();
    let daemon = start_daemon(&repo, &[]).await;

    let (tx, mut signals) = interrupts();
    tx.send(()).unwrap();
    tx.send(()).unwrap();

    let forced = Arc::new(AtomicBool::new(false));
    let flag = forced.clone();
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        run_until_interrupt(daemon, &mut signals, move || flag.store(true, Ordering::SeqCst)),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, Outcome::Forced));
    assert!(forced.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_shutdown_closes_components_in_order() {
    let recorder = StepRecorder::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder.clone()));

    let repo = TempDir::new().unwrap();
    let daemon = start_daemon(&repo, &[]).await;
    daemon.shutdown().await.unwrap();

    assert_eq!(
        recorder.steps(),
        vec![
            "gateway:start", "gateway:end", "bridge:start", "bridge:end",
            "rpc:start", "rpc:end", "host:start", "host:end",
        ]
    );
}
